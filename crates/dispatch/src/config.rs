// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::model::TaskKind;

/// Work-dispatch controller for remote agents.
#[derive(Debug, Clone, Parser)]
#[command(name = "coopdispatch", version, about)]
pub struct Config {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "COOP_DISPATCH_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9900, env = "COOP_DISPATCH_PORT")]
    pub port: u16,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "COOP_DISPATCH_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive.
    #[arg(long, default_value = "info", env = "COOP_DISPATCH_LOG_LEVEL")]
    pub log_level: String,

    /// Display name reported by the settings endpoint.
    #[arg(long, default_value = "coopdispatch", env = "COOP_DISPATCH_SERVER_NAME")]
    pub server_name: String,

    /// Beacon interval advertised to agents at registration, in seconds.
    #[arg(long, default_value_t = 60, env = "COOP_DISPATCH_BEACON_INTERVAL_SECS")]
    pub beacon_interval_secs: u64,

    /// Maximum number of distinct agents (0 = unlimited).
    #[arg(long, default_value_t = 0, env = "COOP_DISPATCH_MAX_AGENTS")]
    pub max_agents: usize,

    /// Task types operators may enqueue.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "shell,upload,download",
        env = "COOP_DISPATCH_TASK_TYPES"
    )]
    pub task_types: Vec<String>,

    /// Directory for durable agent/result copies. Unset disables persistence.
    #[arg(long, env = "COOP_DISPATCH_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Mark agents offline after this many seconds of silence. Unset disables
    /// the liveness sweeper.
    #[arg(long, env = "COOP_DISPATCH_OFFLINE_AFTER_SECS")]
    pub offline_after_secs: Option<u64>,

    /// Liveness sweep interval in milliseconds.
    #[arg(long, default_value_t = 5000, env = "COOP_DISPATCH_SWEEP_INTERVAL_MS")]
    pub sweep_interval_ms: u64,

    /// Reject results posted by an agent other than the one the task was
    /// issued to.
    #[arg(long, env = "COOP_DISPATCH_STRICT_RESULTS")]
    pub strict_results: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.task_kinds()?;

        if self.sweep_interval_ms == 0 {
            anyhow::bail!("--sweep-interval-ms must be greater than zero");
        }
        if self.offline_after_secs == Some(0) {
            anyhow::bail!("--offline-after-secs must be greater than zero");
        }
        Ok(())
    }

    /// Parse the enabled task types.
    pub fn task_kinds(&self) -> anyhow::Result<BTreeSet<TaskKind>> {
        let mut kinds = BTreeSet::new();
        for name in self.task_types.iter().filter(|s| !s.trim().is_empty()) {
            let kind: TaskKind = name.parse()?;
            if !kind.is_enqueueable() {
                anyhow::bail!("task type {kind} is reserved and cannot be enabled");
            }
            kinds.insert(kind);
        }
        if kinds.is_empty() {
            anyhow::bail!("at least one task type must be enabled");
        }
        Ok(kinds)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn offline_after(&self) -> Option<Duration> {
        self.offline_after_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
