// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the dispatch API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::model::{Agent, Task, TaskResult};
use crate::protocol::{NewTask, TaskOutcome};
use crate::registry::AgentRegistration;
use crate::state::DispatchState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub agent_count: usize,
    pub queued_tasks: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub server_name: String,
    pub beacon_interval_secs: u64,
    pub max_agents: usize,
    pub task_types: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub agent_id: String,
    pub beacon_interval_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BeaconResponse {
    pub agent_id: String,
    pub ack: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub task_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultAck {
    pub task_id: String,
    pub accepted: bool,
}

/// Correlation lookup. Result fields sit beside `status`; a pending task
/// reports empty `output` and `error`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResultResponse {
    pub task_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<u64>,
    /// Base64 of the result's binary data, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl TaskResultResponse {
    fn pending(task_id: String) -> Self {
        Self {
            task_id,
            status: "pending".to_owned(),
            agent_id: None,
            output: String::new(),
            error: String::new(),
            exit_code: None,
            start_time: None,
            finish_time: None,
            data: None,
        }
    }

    fn completed(agent_id: String, result: TaskResult) -> Self {
        Self {
            task_id: result.task_id,
            status: "completed".to_owned(),
            agent_id: Some(agent_id),
            output: result.output,
            error: result.error.unwrap_or_default(),
            exit_code: Some(result.exit_code),
            start_time: Some(result.start_time),
            finish_time: Some(result.finish_time),
            data: result.data.map(|bytes| BASE64.encode(bytes)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub agent_id: Option<String>,
}

fn bad_json(rejection: JsonRejection) -> Response {
    DispatchError::BadRequest.to_http_response(rejection.body_text()).into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<DispatchState>>) -> impl IntoResponse {
    let controller = &s.controller;
    Json(HealthResponse {
        status: "running".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        uptime_secs: s.started_at.elapsed().as_secs(),
        agent_count: controller.registry().len().await,
        queued_tasks: controller.queue().len().await,
    })
}

/// `GET /api/v1/settings`
pub async fn settings(State(s): State<Arc<DispatchState>>) -> impl IntoResponse {
    let task_types =
        s.controller.policy().task_kinds.iter().map(|k| k.as_str().to_owned()).collect();
    Json(SettingsResponse {
        server_name: s.config.server_name.clone(),
        beacon_interval_secs: s.config.beacon_interval_secs,
        max_agents: s.config.max_agents,
        task_types,
    })
}

/// `POST /api/v1/agents`
pub async fn register_agent(
    State(s): State<Arc<DispatchState>>,
    body: Result<Json<AgentRegistration>, JsonRejection>,
) -> Response {
    let Json(reg) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_json(rejection),
    };
    match s.controller.register(reg).await {
        Ok(agent_id) => Json(RegisterResponse {
            agent_id,
            beacon_interval_secs: s.config.beacon_interval_secs,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/v1/agents`
pub async fn list_agents(State(s): State<Arc<DispatchState>>) -> Json<Vec<Agent>> {
    Json(s.controller.list_agents().await)
}

/// `POST /api/v1/agents/{id}/beacon`
pub async fn beacon(State(s): State<Arc<DispatchState>>, Path(id): Path<String>) -> Response {
    if s.controller.beacon(&id).await {
        Json(BeaconResponse { agent_id: id, ack: true }).into_response()
    } else {
        DispatchError::AgentNotFound
            .to_http_response(format!("agent {id} is not registered"))
            .into_response()
    }
}

/// `GET /api/v1/agents/{id}/task`
pub async fn poll_task(State(s): State<Arc<DispatchState>>, Path(id): Path<String>) -> Json<Task> {
    Json(s.controller.poll_task(&id).await)
}

/// `POST /api/v1/agents/{id}/tasks`
pub async fn enqueue_task(
    State(s): State<Arc<DispatchState>>,
    Path(id): Path<String>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_json(rejection),
    };
    match s.controller.enqueue_task(&id, req).await {
        Ok(task) => Json(EnqueueResponse { task_id: task.id }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/v1/agents/{id}/results`
pub async fn agent_results(
    State(s): State<Arc<DispatchState>>,
    Path(id): Path<String>,
) -> Json<Vec<TaskResult>> {
    Json(s.controller.results_for_agent(&id).await)
}

/// `POST /api/v1/results`
pub async fn post_result(
    State(s): State<Arc<DispatchState>>,
    body: Result<Json<TaskResult>, JsonRejection>,
) -> Response {
    let Json(result) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_json(rejection),
    };
    let task_id = result.task_id.clone();
    match s.controller.post_result(result).await {
        Ok(()) => Json(ResultAck { task_id, accepted: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/v1/tasks[?agent_id=]`
pub async fn list_tasks(
    State(s): State<Arc<DispatchState>>,
    Query(filter): Query<TaskFilter>,
) -> Json<Vec<Task>> {
    let agent_id = filter.agent_id.as_deref().filter(|id| !id.is_empty());
    Json(s.controller.list_tasks(agent_id).await)
}

/// `GET /api/v1/tasks/{id}/result`
pub async fn task_result(
    State(s): State<Arc<DispatchState>>,
    Path(task_id): Path<String>,
) -> Json<TaskResultResponse> {
    let resp = match s.controller.result_for_task(&task_id).await {
        TaskOutcome::Completed { agent_id, result } => {
            TaskResultResponse::completed(agent_id, result)
        }
        TaskOutcome::Pending => TaskResultResponse::pending(task_id),
    };
    Json(resp)
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
