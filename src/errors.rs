use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        })
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("method not found: {method}")]
    MethodNotFound { method: String },
    #[error("{kind} not found: {name}")]
    CapabilityNotFound { kind: CapabilityKind, name: String },
    #[error("invalid params: {message}")]
    InvalidParams { message: String },
    #[error("{message}")]
    Handler { message: String },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    pub fn not_found(kind: CapabilityKind, name: impl Into<String>) -> Self {
        Self::CapabilityNotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

/// Only protocol-level rejections reach the HTTP layer as `AppError`; everything else is
/// answered inside an envelope. Anything that does escape is treated as internal.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                internal_failure(code)
            }
            other => {
                tracing::error!(error = %other, "dispatch error reached the http layer");
                internal_failure("internal_error")
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

fn internal_failure(code: &'static str) -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        code,
        "internal server error".to_string(),
    )
}
