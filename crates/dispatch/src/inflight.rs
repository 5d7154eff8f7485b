// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outstanding-task tracking for strict result correlation.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::ControlError;

/// Remembers which agent each dequeued task was issued to, so a result
/// posted by a different agent can be refused.
///
/// An entry leaves the map when its owner reports a result or when the
/// liveness sweeper marks the owner offline. Without a sweeper, tasks whose
/// agents never report stay tracked for the life of the process.
#[derive(Default)]
pub struct InFlight {
    issued: RwLock<HashMap<String, String>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, task_id: &str, agent_id: &str) {
        self.issued.write().await.insert(task_id.to_owned(), agent_id.to_owned());
    }

    /// Check a reported result against the issuing agent and clear it.
    ///
    /// Task ids that were never issued (or already settled) are accepted.
    pub async fn settle(&self, task_id: &str, agent_id: &str) -> Result<(), ControlError> {
        let mut issued = self.issued.write().await;
        match issued.get(task_id) {
            Some(owner) if owner != agent_id => Err(ControlError::ResultMismatch {
                task_id: task_id.to_owned(),
                issued_to: owner.clone(),
                reported_by: agent_id.to_owned(),
            }),
            Some(_) => {
                issued.remove(task_id);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Drop every task issued to `agent_id`. Returns how many were dropped.
    ///
    /// A late result for a dropped task is then accepted from any agent.
    pub async fn forget_agent(&self, agent_id: &str) -> usize {
        let mut issued = self.issued.write().await;
        let before = issued.len();
        issued.retain(|_, owner| owner != agent_id);
        before - issued.len()
    }

    pub async fn outstanding(&self) -> usize {
        self.issued.read().await.len()
    }
}
