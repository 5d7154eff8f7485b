// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the dispatch controller.

pub mod http;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::DispatchState;

/// Build the axum `Router` with all dispatch routes.
pub fn build_router(state: Arc<DispatchState>) -> Router {
    Router::new()
        // Status
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/settings", get(http::settings))
        // Agent-facing
        .route("/api/v1/agents", post(http::register_agent).get(http::list_agents))
        .route("/api/v1/agents/{id}/beacon", post(http::beacon))
        .route("/api/v1/agents/{id}/task", get(http::poll_task))
        .route("/api/v1/results", post(http::post_result))
        // Operator-facing
        .route("/api/v1/agents/{id}/tasks", post(http::enqueue_task))
        .route("/api/v1/agents/{id}/results", get(http::agent_results))
        .route("/api/v1/tasks", get(http::list_tasks))
        .route("/api/v1/tasks/{id}/result", get(http::task_result))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
