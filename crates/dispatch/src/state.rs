// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::persist::{JsonFileSink, NullSink, Persistence};
use crate::protocol::{Controller, DispatchPolicy};
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use crate::results::ResultStore;

/// Shared controller state handed to every request handler.
pub struct DispatchState {
    pub controller: Controller,
    pub config: Config,
    pub started_at: Instant,
    pub shutdown: CancellationToken,
}

impl DispatchState {
    /// Build stores, policy, and persistence from validated config.
    pub fn new(config: Config, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let sink: Arc<dyn Persistence> = match config.state_dir {
            Some(ref dir) => {
                tracing::info!(dir = %dir.display(), "persisting agents and results");
                Arc::new(JsonFileSink::open(dir)?)
            }
            None => Arc::new(NullSink),
        };
        let policy = DispatchPolicy {
            task_kinds: config.task_kinds()?,
            strict_results: config.strict_results,
        };
        let controller = Controller::new(
            Arc::new(AgentRegistry::new(config.max_agents)),
            Arc::new(TaskQueue::new()),
            Arc::new(ResultStore::new()),
            sink,
            policy,
        );
        Ok(Self::with_controller(config, controller, shutdown))
    }

    pub fn with_controller(
        config: Config,
        controller: Controller,
        shutdown: CancellationToken,
    ) -> Self {
        Self { controller, config, started_at: Instant::now(), shutdown }
    }
}
