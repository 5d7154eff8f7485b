// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coopdispatch: work-dispatch controller for remote agents.

pub mod config;
pub mod error;
pub mod id;
pub mod inflight;
pub mod model;
pub mod persist;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod results;
pub mod state;
pub mod sweeper;
pub mod test_support;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::DispatchState;
use crate::sweeper::spawn_liveness_sweeper;
use crate::transport::build_router;

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the dispatch controller until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let addr = config.addr();
    let shutdown = CancellationToken::new();
    let state = Arc::new(DispatchState::new(config, shutdown.clone())?);

    if spawn_liveness_sweeper(Arc::clone(&state)).is_some() {
        tracing::info!(
            offline_after_secs = ?state.config.offline_after_secs,
            "liveness sweeper enabled"
        );
    }

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        task_types = ?state.controller.policy().task_kinds,
        strict_results = state.config.strict_results,
        "coopdispatch listening on {addr}"
    );
    serve(listener, state).await
}

/// Serve the HTTP API on `listener` until the state's shutdown token fires.
pub async fn serve(listener: TcpListener, state: Arc<DispatchState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    Ok(())
}
