// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable persistence sinks for agents and results.
//!
//! The controller hands writes to a [`PersistWorker`] and never waits on
//! them; the in-memory stores stay authoritative whether or not a write
//! succeeds.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::StorageError;
use crate::model::{Agent, TaskResult};

/// Destination for durable copies of registry and result-store writes.
pub trait Persistence: Send + Sync + 'static {
    fn save_agent(&self, agent: &Agent) -> Result<(), StorageError>;
    fn save_result(&self, result: &TaskResult) -> Result<(), StorageError>;
}

/// Discards everything. Used when no state directory is configured.
#[derive(Debug, Default)]
pub struct NullSink;

impl Persistence for NullSink {
    fn save_agent(&self, _agent: &Agent) -> Result<(), StorageError> {
        Ok(())
    }

    fn save_result(&self, _result: &TaskResult) -> Result<(), StorageError> {
        Ok(())
    }
}

/// JSON files under a state directory.
///
/// Layout:
/// - `agents/<id>.json`: latest record per agent, replaced atomically.
/// - `results.jsonl`: one result per line, append-only.
pub struct JsonFileSink {
    root: PathBuf,
    results_lock: Mutex<()>,
}

impl JsonFileSink {
    /// Create the directory layout under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("agents"))?;
        Ok(Self { root, results_lock: Mutex::new(()) })
    }

    pub fn agent_path(&self, id: &str) -> PathBuf {
        self.root.join("agents").join(format!("{}.json", file_stem(id)))
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join("results.jsonl")
    }
}

impl Persistence for JsonFileSink {
    fn save_agent(&self, agent: &Agent) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(agent)?;
        write_atomic(&self.agent_path(&agent.id), json.as_bytes())
    }

    fn save_result(&self, result: &TaskResult) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');

        let _guard = self.results_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(self.results_path())?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// A write queued for the sink.
enum Record {
    Agent(Agent),
    Result(TaskResult),
}

impl Record {
    fn write_to(self, sink: &dyn Persistence) {
        match self {
            Self::Agent(agent) => {
                if let Err(e) = sink.save_agent(&agent) {
                    tracing::warn!(agent_id = %agent.id, err = %e, "failed to persist agent");
                }
            }
            Self::Result(result) => {
                if let Err(e) = sink.save_result(&result) {
                    tracing::warn!(task_id = %result.task_id, err = %e, "failed to persist result");
                }
            }
        }
    }
}

/// Single background writer in front of a [`Persistence`] sink.
///
/// Writes reach the sink one at a time in submission order, so the last
/// registration of an agent is also the last one on disk.
pub struct PersistWorker {
    tx: mpsc::UnboundedSender<Record>,
}

impl PersistWorker {
    /// Start the writer task. Must be called from within a Tokio runtime.
    ///
    /// The task exits once the worker is dropped and the backlog is drained.
    pub fn spawn(sink: Arc<dyn Persistence>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Record>();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let sink = Arc::clone(&sink);
                if let Err(e) = tokio::task::spawn_blocking(move || record.write_to(&*sink)).await
                {
                    tracing::warn!(err = %e, "persistence write aborted");
                }
            }
        });
        Self { tx }
    }

    pub fn save_agent(&self, agent: Agent) {
        self.submit(Record::Agent(agent));
    }

    pub fn save_result(&self, result: TaskResult) {
        self.submit(Record::Result(result));
    }

    fn submit(&self, record: Record) {
        if self.tx.send(record).is_err() {
            tracing::warn!("persistence worker stopped, write dropped");
        }
    }
}

/// Read back every persisted result, skipping lines that fail to parse.
pub fn load_results(path: &Path) -> Result<Vec<TaskResult>, StorageError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.lines().filter_map(|line| serde_json::from_str(line).ok()).collect())
}

/// Write tmp + rename so readers never see a partial file.
///
/// Uses a unique temp filename (PID + counter) so concurrent saves of the
/// same agent never share a `.tmp` file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Agent ids are agent-supplied; anything outside `[A-Za-z0-9_-]` is
/// hex-encoded so an id can never escape the agents directory.
fn file_stem(id: &str) -> String {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return id.to_owned();
    }
    format!("x{}", hex::encode(id))
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
