//! JSON-RPC envelope representations shared by the server bindings and the client transports
//!
//! Provides the request/response records, the structured error, id generation, and the
//! mapping of internal `AppError`s onto wire error codes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const HANDLER_ERROR: i64 = -32000;

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::BadRequest { message, .. } => Self::new(PARSE_ERROR, message),
            AppError::MethodNotFound { .. } | AppError::CapabilityNotFound { .. } => {
                Self::new(METHOD_NOT_FOUND, err.to_string())
            }
            AppError::InvalidParams { .. } => Self::new(INVALID_PARAMS, err.to_string()),
            AppError::Handler { message } => Self::new(HANDLER_ERROR, message),
            AppError::Internal { message, .. } => {
                tracing::error!(error = %message, "dispatch failed with internal error");
                Self::new(INTERNAL_ERROR, "Internal error")
            }
        }
    }
}

/// The single outcome carried by a response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

/// Response envelope. Holding an [`Outcome`] rather than two optional fields makes
/// "both" and "neither" unrepresentable; decoding rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponse", into = "RawResponse")]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    pub outcome: Outcome,
}

impl RpcResponse {
    pub fn result(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn error(id: u64, error: RpcError) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    pub fn from_outcome(id: u64, outcome: Result<Value, AppError>) -> Self {
        match outcome {
            Ok(value) => Self::result(id, value),
            Err(err) => Self::error(id, err.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(err) => Err(err),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawResponse {
    #[serde(default = "default_version")]
    jsonrpc: String,
    id: u64,
    // `Value::Null` is a legal result, so presence is tracked separately from the value.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<RawResponse> for RpcResponse {
    type Error = String;

    fn try_from(raw: RawResponse) -> Result<Self, Self::Error> {
        let outcome = match (raw.result, raw.error) {
            (Some(value), None) => Outcome::Result(value),
            (None, Some(err)) => Outcome::Error(err),
            (Some(_), Some(_)) => {
                return Err("response carries both result and error".to_string())
            }
            (None, None) => return Err("response carries neither result nor error".to_string()),
        };

        Ok(Self {
            jsonrpc: raw.jsonrpc,
            id: raw.id,
            outcome,
        })
    }
}

impl From<RpcResponse> for RawResponse {
    fn from(response: RpcResponse) -> Self {
        let (result, error) = match response.outcome {
            Outcome::Result(value) => (Some(value), None),
            Outcome::Error(err) => (None, Some(err)),
        };

        Self {
            jsonrpc: response.jsonrpc,
            id: response.id,
            result,
            error,
        }
    }
}

/// Correlation id source for one client transport. Starts at 1.
#[derive(Debug, Default)]
pub struct RequestIds {
    counter: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}
