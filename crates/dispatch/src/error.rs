// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::model::TaskKind;

/// Error codes for the dispatch API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    BadRequest,
    AgentNotFound,
    Conflict,
    Internal,
}

impl DispatchError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::AgentNotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }

    /// `{"error": {"code", "message"}}` with the matching status.
    pub fn to_http_response(self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let error = ErrorBody { code: self.as_str(), message: message.into() };
        (self.status(), Json(ErrorResponse { error }))
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Request-level failures raised by the protocol handler.
///
/// None of these mutate state: every check runs before the store is touched.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("task type {0} is not enabled on this controller")]
    UnsupportedTaskKind(TaskKind),

    #[error("task type noop is reserved for the empty-queue placeholder")]
    ReservedTaskKind,

    #[error("agent limit of {0} reached")]
    AgentLimit(usize),

    #[error("task {task_id} was issued to agent {issued_to}, not {reported_by}")]
    ResultMismatch { task_id: String, issued_to: String, reported_by: String },
}

impl ControlError {
    pub fn code(&self) -> DispatchError {
        match self {
            Self::MissingField(_) | Self::UnsupportedTaskKind(_) | Self::ReservedTaskKind => {
                DispatchError::BadRequest
            }
            Self::AgentLimit(_) | Self::ResultMismatch { .. } => DispatchError::Conflict,
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        self.code().to_http_response(self.to_string()).into_response()
    }
}

/// Failure reported by a persistence sink. Logged, never surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
