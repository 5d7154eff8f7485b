// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background liveness sweeper.

use std::sync::Arc;
use std::time::Duration;

use crate::model::epoch_ms;
use crate::state::DispatchState;

/// Spawn the sweeper if an offline threshold is configured.
///
/// Agents silent for longer than the threshold are marked offline. Records
/// are never removed, and the next beacon or poll brings an agent back.
pub fn spawn_liveness_sweeper(state: Arc<DispatchState>) -> Option<tokio::task::JoinHandle<()>> {
    let threshold = state.config.offline_after()?;
    let interval = state.config.sweep_interval();

    Some(tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            sweep_once(&state, threshold).await;
        }
    }))
}

/// Run a single sweep. Returns the ids marked offline.
///
/// Tasks still outstanding for those agents are released from strict
/// correlation tracking.
pub async fn sweep_once(state: &DispatchState, threshold: Duration) -> Vec<String> {
    let cutoff = epoch_ms().saturating_sub(threshold.as_millis() as u64);
    let flipped = state.controller.registry().mark_stale(cutoff).await;
    for id in &flipped {
        tracing::warn!(
            agent_id = %id,
            threshold_secs = threshold.as_secs(),
            "agent marked offline after missed beacons"
        );
    }
    state.controller.release_agents(&flipped).await;
    flipped
}
