// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry.
//!
//! Agents register on startup and then beacon or poll periodically. The
//! registry never removes an agent; the optional liveness sweeper only
//! flips `online` off.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ControlError;
use crate::id::new_id;
use crate::model::{epoch_ms, Agent};

/// Request body for agent registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistration {
    /// Agent-chosen id. Empty or absent means the controller mints one.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub system_info: serde_json::Value,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

/// Tracks every agent the controller has heard from.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Agent>>,
    /// Cap on distinct agents; `0` disables the cap.
    max_agents: usize,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(0)
    }
}

impl AgentRegistry {
    pub fn new(max_agents: usize) -> Self {
        Self { agents: RwLock::new(HashMap::new()), max_agents }
    }

    /// Register or re-register an agent.
    ///
    /// A re-registration replaces the prior record wholesale, `first_seen`
    /// included. Returns a copy of the stored record.
    pub async fn register(&self, reg: AgentRegistration) -> Result<Agent, ControlError> {
        let id = match reg.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => new_id(),
        };

        let mut agents = self.agents.write().await;
        if self.max_agents > 0 && !agents.contains_key(&id) && agents.len() >= self.max_agents {
            return Err(ControlError::AgentLimit(self.max_agents));
        }

        let now = epoch_ms();
        let agent = Agent {
            id: id.clone(),
            system_info: reg.system_info,
            ip: reg.ip,
            version: reg.version,
            capabilities: reg.capabilities,
            first_seen: now,
            last_seen: now,
            online: true,
        };
        agents.insert(id, agent.clone());
        Ok(agent)
    }

    /// Record contact from an agent. Returns false if the id is unknown.
    pub async fn touch(&self, id: &str) -> bool {
        let mut agents = self.agents.write().await;
        match agents.get_mut(id) {
            Some(agent) => {
                agent.last_seen = epoch_ms();
                agent.online = true;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, id: &str) -> Option<Agent> {
        self.agents.read().await.get(id).cloned()
    }

    /// Snapshot of all agents, oldest registration first.
    pub async fn list(&self) -> Vec<Agent> {
        let mut list: Vec<Agent> = self.agents.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Mark agents silent since before `cutoff_ms` as offline.
    ///
    /// Returns the ids that transitioned. Agents already offline are skipped.
    pub async fn mark_stale(&self, cutoff_ms: u64) -> Vec<String> {
        let mut agents = self.agents.write().await;
        let mut flipped = Vec::new();
        for agent in agents.values_mut() {
            if agent.online && agent.last_seen < cutoff_ms {
                agent.online = false;
                flipped.push(agent.id.clone());
            }
        }
        flipped
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
