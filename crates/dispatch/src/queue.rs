// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent FIFO task queues.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use crate::model::{epoch_ms, Task};

/// Pending work, one FIFO per target agent.
///
/// Each task is handed out at most once: `dequeue` takes the head under the
/// same write guard that removes it.
#[derive(Default)]
pub struct TaskQueue {
    queues: RwLock<HashMap<String, VecDeque<Task>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the back of `agent_id`'s queue.
    ///
    /// Overwrites `target_agent_id` and stamps `create_time` if unset.
    /// Returns a copy of the queued task.
    pub async fn enqueue(&self, agent_id: &str, mut task: Task) -> Task {
        task.target_agent_id = agent_id.to_owned();
        if task.create_time == 0 {
            task.create_time = epoch_ms();
        }

        let queued = task.clone();
        self.queues.write().await.entry(agent_id.to_owned()).or_default().push_back(task);
        queued
    }

    /// Remove and return the head of `agent_id`'s queue.
    pub async fn dequeue(&self, agent_id: &str) -> Option<Task> {
        let mut queues = self.queues.write().await;
        let queue = queues.get_mut(agent_id)?;
        let task = queue.pop_front();
        if queue.is_empty() {
            queues.remove(agent_id);
        }
        task
    }

    /// Pending tasks for one agent, in delivery order.
    pub async fn peek(&self, agent_id: &str) -> Vec<Task> {
        self.queues
            .read()
            .await
            .get(agent_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pending tasks for every agent, grouped by agent id, each group in
    /// delivery order.
    pub async fn peek_all(&self) -> Vec<Task> {
        let queues = self.queues.read().await;
        let mut entries: Vec<_> = queues.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().flat_map(|(_, q)| q.iter().cloned()).collect()
    }

    /// Total number of pending tasks across all agents.
    pub async fn len(&self) -> usize {
        self.queues.read().await.values().map(VecDeque::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
