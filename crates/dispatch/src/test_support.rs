// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for unit and integration tests.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::StorageError;
use crate::model::{Agent, TaskResult};
use crate::persist::Persistence;
use crate::protocol::{Controller, DispatchPolicy};
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use crate::results::ResultStore;
use crate::state::DispatchState;

/// Default config with persistence and the sweeper disabled.
pub fn test_config() -> Config {
    Config::parse_from(["coopdispatch", "--port", "0"])
}

/// Build a state from `config` backed by `sink`.
pub fn test_state_with_sink(config: Config, sink: Arc<dyn Persistence>) -> Arc<DispatchState> {
    let controller = controller_with(sink, policy_for(&config), config.max_agents);
    Arc::new(DispatchState::with_controller(config, controller, CancellationToken::new()))
}

pub fn test_state() -> Arc<DispatchState> {
    test_state_with_sink(test_config(), Arc::new(RecordingSink::default()))
}

/// Controller over fresh, empty stores.
pub fn controller_with(
    sink: Arc<dyn Persistence>,
    policy: DispatchPolicy,
    max_agents: usize,
) -> Controller {
    Controller::new(
        Arc::new(AgentRegistry::new(max_agents)),
        Arc::new(TaskQueue::new()),
        Arc::new(ResultStore::new()),
        sink,
        policy,
    )
}

fn policy_for(config: &Config) -> DispatchPolicy {
    DispatchPolicy {
        task_kinds: config.task_kinds().unwrap_or_default(),
        strict_results: config.strict_results,
    }
}

/// Spawn the HTTP router on a random local port.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_http_server(
    state: Arc<DispatchState>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = crate::serve(listener, state).await;
    });
    Ok((addr, handle))
}

/// Persistence sink that records every write in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub agents: Mutex<Vec<Agent>>,
    pub results: Mutex<Vec<TaskResult>>,
}

impl Persistence for RecordingSink {
    fn save_agent(&self, agent: &Agent) -> Result<(), StorageError> {
        self.agents.lock().push(agent.clone());
        Ok(())
    }

    fn save_result(&self, result: &TaskResult) -> Result<(), StorageError> {
        self.results.lock().push(result.clone());
        Ok(())
    }
}

/// Persistence sink whose writes always fail.
#[derive(Default)]
pub struct FailingSink;

impl Persistence for FailingSink {
    fn save_agent(&self, _agent: &Agent) -> Result<(), StorageError> {
        Err(std::io::Error::other("disk unavailable").into())
    }

    fn save_result(&self, _result: &TaskResult) -> Result<(), StorageError> {
        Err(std::io::Error::other("disk unavailable").into())
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
