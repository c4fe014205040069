use std::{fmt, time::Duration};

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::mcp::rpc::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    WebSocket,
    Sse,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::WebSocket => "websocket",
            Self::Sse => "sse",
        })
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("mcp error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("{transport} transport does not support {operation}")]
    Unsupported {
        transport: TransportKind,
        operation: &'static str,
    },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected request with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("connection closed")]
    ConnectionClosed,
}

impl ClientError {
    pub fn unsupported(transport: TransportKind, operation: &'static str) -> Self {
        Self::Unsupported {
            transport,
            operation,
        }
    }

    /// The structured error code, when the server answered with one.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        Self::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::ConnectionClosed
            }
            other => Self::WebSocket(Box::new(other)),
        }
    }
}
