// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task results, kept per reporting agent.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::model::TaskResult;

/// Append-only store of results reported by agents.
///
/// Results are never deduplicated: a task executed twice yields two entries.
#[derive(Default)]
pub struct ResultStore {
    results: RwLock<HashMap<String, Vec<TaskResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, agent_id: &str, result: TaskResult) {
        self.results.write().await.entry(agent_id.to_owned()).or_default().push(result);
    }

    /// Find a result for `task_id` across all agents.
    ///
    /// If the task was reported more than once, which copy is returned is
    /// unspecified.
    pub async fn find_by_task_id(&self, task_id: &str) -> Option<(String, TaskResult)> {
        let results = self.results.read().await;
        results.iter().find_map(|(agent_id, list)| {
            list.iter().find(|r| r.task_id == task_id).map(|r| (agent_id.clone(), r.clone()))
        })
    }

    /// Results reported by one agent, in arrival order.
    pub async fn for_agent(&self, agent_id: &str) -> Vec<TaskResult> {
        self.results.read().await.get(agent_id).cloned().unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod tests;
