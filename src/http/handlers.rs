//! Axum HTTP handlers for the web server
//!
//! Provides the unary JSON-RPC endpoint and the general metadata endpoints.

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::mcp::rpc::{RpcRequest, RpcResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
    pub websocket_endpoint: &'static str,
    pub events_endpoint: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: "/mcp",
        websocket_endpoint: "/ws",
        events_endpoint: "/sse",
    })
}

/// One envelope in, one envelope out. A body that is not an envelope is rejected with
/// 400 before it reaches the dispatcher.
pub async fn mcp_endpoint(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RpcResponse>, AppError> {
    let request: RpcRequest = serde_json::from_slice(&body).map_err(|err| {
        AppError::bad_request("parse_error", format!("malformed request envelope: {err}"))
    })?;

    Ok(Json(state.dispatcher.handle(request).await))
}
