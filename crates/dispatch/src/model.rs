// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire and in-memory types shared by the registry, queue, and result store.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::new_id;

/// Closed set of task kinds the controller knows how to hand out.
///
/// The controller never executes a task; the kind only selects which agent
/// capability is expected to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Empty-queue placeholder. Never enqueued.
    Noop,
    Shell,
    Upload,
    Download,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [Self::Noop, Self::Shell, Self::Upload, Self::Download];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Shell => "shell",
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }

    /// Whether an operator may put this kind on a queue.
    pub fn is_enqueueable(&self) -> bool {
        !matches!(self, Self::Noop)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "noop" => Ok(Self::Noop),
            "shell" => Ok(Self::Shell),
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            other => anyhow::bail!("unknown task type: {other}"),
        }
    }
}

/// A remote worker as observed by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    /// Free-form host description reported by the agent. Opaque here.
    #[serde(default)]
    pub system_info: serde_json::Value,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub version: String,
    /// Task kinds the agent claims to support, as reported.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Epoch millis of first registration.
    pub first_seen: u64,
    /// Epoch millis of the last beacon, poll, or registration.
    pub last_seen: u64,
    pub online: bool,
}

impl Agent {
    pub fn supports(&self, kind: TaskKind) -> bool {
        self.capabilities.is_empty() || self.capabilities.contains(kind.as_str())
    }
}

/// One unit of work destined for exactly one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub target_agent_id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub args: HashMap<String, String>,
    /// Seconds the agent should allow the task to run.
    #[serde(rename = "timeout", default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Epoch millis; `0` until the task is enqueued.
    #[serde(default)]
    pub create_time: u64,
}

impl Task {
    /// Build a new task with a fresh id. `create_time` is stamped on enqueue.
    pub fn new(target_agent_id: impl Into<String>, kind: TaskKind, command: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            target_agent_id: target_agent_id.into(),
            kind,
            command: command.into(),
            args: HashMap::new(),
            timeout_secs: None,
            create_time: 0,
        }
    }

    /// Sentinel handed to an agent whose queue is empty.
    pub fn placeholder(agent_id: impl Into<String>) -> Self {
        let mut task = Self::new(agent_id, TaskKind::Noop, "");
        task.create_time = epoch_ms();
        task
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == TaskKind::Noop
    }
}

/// Outcome of one executed task, as reported by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub start_time: u64,
    #[serde(default)]
    pub finish_time: u64,
    /// Non-text output, base64 on the wire.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded.map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom)).transpose()
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
