// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request handling for the agent protocol.
//!
//! [`Controller`] holds no state of its own beyond policy; every operation is
//! a short sequence of independent critical sections against the injected
//! registry, queue, and result store. A poll touches the registry and then
//! dequeues as two separate steps, so `last_seen` may advance without a task
//! being delivered if the second step is never reached.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::inflight::InFlight;
use crate::model::{Agent, Task, TaskKind, TaskResult};
use crate::persist::{PersistWorker, Persistence};
use crate::queue::TaskQueue;
use crate::registry::{AgentRegistration, AgentRegistry};
use crate::results::ResultStore;

/// Operator request to queue work for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: HashMap<String, String>,
    #[serde(rename = "timeout", default)]
    pub timeout_secs: Option<u64>,
}

/// Correlation status for a task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { agent_id: String, result: TaskResult },
    /// No result recorded: either still running or never issued.
    Pending,
}

/// Controller-wide policy fixed at startup.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Kinds operators may enqueue. Never contains [`TaskKind::Noop`].
    pub task_kinds: BTreeSet<TaskKind>,
    /// Refuse results from agents other than the one a task was issued to.
    pub strict_results: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            task_kinds: TaskKind::ALL.into_iter().filter(TaskKind::is_enqueueable).collect(),
            strict_results: false,
        }
    }
}

/// Glues the registry, queue, and result store into the agent protocol.
pub struct Controller {
    registry: Arc<AgentRegistry>,
    queue: Arc<TaskQueue>,
    results: Arc<ResultStore>,
    persist: PersistWorker,
    policy: DispatchPolicy,
    inflight: Option<InFlight>,
}

impl Controller {
    /// Build a controller. Spawns the persistence writer, so this must run
    /// inside a Tokio runtime.
    pub fn new(
        registry: Arc<AgentRegistry>,
        queue: Arc<TaskQueue>,
        results: Arc<ResultStore>,
        sink: Arc<dyn Persistence>,
        policy: DispatchPolicy,
    ) -> Self {
        let inflight = policy.strict_results.then(InFlight::new);
        let persist = PersistWorker::spawn(sink);
        Self { registry, queue, results, persist, policy, inflight }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Register (or re-register) an agent and return its effective id.
    pub async fn register(&self, reg: AgentRegistration) -> Result<String, ControlError> {
        let agent = self.registry.register(reg).await?;
        tracing::info!(
            agent_id = %agent.id,
            ip = %agent.ip,
            version = %agent.version,
            "agent registered"
        );
        let id = agent.id.clone();
        self.persist.save_agent(agent);
        Ok(id)
    }

    /// Liveness beacon. Returns false for an unknown agent; nothing is created.
    pub async fn beacon(&self, agent_id: &str) -> bool {
        let known = self.registry.touch(agent_id).await;
        if !known {
            tracing::debug!(agent_id = %agent_id, "beacon from unknown agent");
        }
        known
    }

    /// Hand the agent its next task, or a `noop` placeholder if none is queued.
    pub async fn poll_task(&self, agent_id: &str) -> Task {
        if !self.registry.touch(agent_id).await {
            tracing::debug!(agent_id = %agent_id, "poll from unknown agent");
        }

        match self.queue.dequeue(agent_id).await {
            Some(task) => {
                if let Some(ref inflight) = self.inflight {
                    inflight.issue(&task.id, agent_id).await;
                }
                tracing::info!(
                    agent_id = %agent_id,
                    task_id = %task.id,
                    kind = %task.kind,
                    "task dispatched"
                );
                task
            }
            None => Task::placeholder(agent_id),
        }
    }

    /// Record a result reported by an agent.
    pub async fn post_result(&self, result: TaskResult) -> Result<(), ControlError> {
        if result.task_id.trim().is_empty() {
            return Err(ControlError::MissingField("task_id"));
        }
        if result.agent_id.trim().is_empty() {
            return Err(ControlError::MissingField("agent_id"));
        }
        if let Some(ref inflight) = self.inflight {
            inflight.settle(&result.task_id, &result.agent_id).await?;
        }

        self.results.append(&result.agent_id, result.clone()).await;
        tracing::info!(
            agent_id = %result.agent_id,
            task_id = %result.task_id,
            exit_code = result.exit_code,
            "result received"
        );
        self.persist.save_result(result);
        Ok(())
    }

    /// Queue a task for an agent. The agent need not be registered yet.
    pub async fn enqueue_task(&self, agent_id: &str, req: NewTask) -> Result<Task, ControlError> {
        if agent_id.trim().is_empty() {
            return Err(ControlError::MissingField("agent_id"));
        }
        if !req.kind.is_enqueueable() {
            return Err(ControlError::ReservedTaskKind);
        }
        if !self.policy.task_kinds.contains(&req.kind) {
            return Err(ControlError::UnsupportedTaskKind(req.kind));
        }

        if let Some(agent) = self.registry.get(agent_id).await {
            if !agent.supports(req.kind) {
                tracing::warn!(
                    agent_id = %agent_id,
                    kind = %req.kind,
                    "agent did not advertise this capability; queueing anyway"
                );
            }
        }

        let mut task = Task::new(agent_id, req.kind, req.command);
        task.args = req.args;
        task.timeout_secs = req.timeout_secs;
        let task = self.queue.enqueue(agent_id, task).await;
        tracing::info!(agent_id = %agent_id, task_id = %task.id, kind = %task.kind, "task queued");
        Ok(task)
    }

    /// Stop tracking tasks issued to agents that went offline.
    ///
    /// No-op unless strict result correlation is on.
    pub async fn release_agents(&self, agent_ids: &[String]) -> usize {
        let Some(ref inflight) = self.inflight else {
            return 0;
        };
        let mut released = 0;
        for id in agent_ids {
            released += inflight.forget_agent(id).await;
        }
        if released > 0 {
            tracing::debug!(agents = agent_ids.len(), released, "released in-flight tasks");
        }
        released
    }

    /// Tasks issued under strict correlation that have not been settled.
    pub async fn outstanding(&self) -> usize {
        match self.inflight {
            Some(ref inflight) => inflight.outstanding().await,
            None => 0,
        }
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        self.registry.list().await
    }

    /// Pending tasks for one agent, or for all agents when `agent_id` is `None`.
    pub async fn list_tasks(&self, agent_id: Option<&str>) -> Vec<Task> {
        match agent_id {
            Some(id) => self.queue.peek(id).await,
            None => self.queue.peek_all().await,
        }
    }

    pub async fn result_for_task(&self, task_id: &str) -> TaskOutcome {
        match self.results.find_by_task_id(task_id).await {
            Some((agent_id, result)) => TaskOutcome::Completed { agent_id, result },
            None => TaskOutcome::Pending,
        }
    }

    pub async fn results_for_agent(&self, agent_id: &str) -> Vec<TaskResult> {
        self.results.for_agent(agent_id).await
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
