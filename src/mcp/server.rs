//! The central dispatch engine
//!
//! Resolves a method name against the enable/disable table, decodes its parameters,
//! routes it to a built-in or to the capability registry, and audits the outcome.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::mcp::methods::{self, MethodTable};
use crate::mcp::rpc::{RpcRequest, RpcResponse, JSONRPC_VERSION};
use crate::registry::Registry;

pub const SERVER_DESCRIPTION: &str = "JSON-RPC capability server over HTTP, WebSocket and SSE";

#[derive(Debug, Deserialize)]
pub struct ToolRunParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
pub struct NameParams {
    pub name: String,
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    methods: MethodTable,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            methods: MethodTable::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Dispatches one request and wraps the outcome in a response echoing its id.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let audit_params = redact_audit_params(Some(&request.params));
        let outcome = self.dispatch(&request.method, request.params).await;
        let response = RpcResponse::from_outcome(request.id, outcome);

        info!(
            id = request.id,
            method = %request.method,
            params = %audit_params,
            outcome = if response.is_error() { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, AppError> {
        if !self.methods.is_enabled(method) {
            return Err(AppError::method_not_found(method));
        }

        match method {
            methods::TOOLS_RUN => {
                let params: ToolRunParams = decode_params(params)?;
                let tool = self.registry.tools.get(&params.name)?;
                tool.invoke(params.arguments).await
            }
            methods::TOOLS_LIST => Ok(json!({ "tools": self.registry.tool_summaries() })),
            methods::RESOURCES_GET => {
                let params: NameParams = decode_params(params)?;
                let resource = self.registry.resources.get(&params.name)?;
                to_value(resource.as_ref())
            }
            methods::RESOURCES_LIST => {
                Ok(json!({ "resources": self.registry.resource_summaries() }))
            }
            methods::PROMPTS_GET => {
                let params: NameParams = decode_params(params)?;
                let prompt = self.registry.prompts.get(&params.name)?;
                to_value(prompt.as_ref())
            }
            methods::PROMPTS_LIST => Ok(json!({ "prompts": self.registry.prompt_names() })),
            methods::SERVER_INFO => Ok(json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "tools": self.registry.tool_summaries(),
            })),
            methods::SYSTEM_DESCRIBE => Ok(json!({
                "description": SERVER_DESCRIPTION,
                "version": env!("CARGO_PKG_VERSION"),
                "methods": self.methods.list_enabled(),
            })),
            methods::SYSTEM_LIST_METHODS => Ok(json!(self.methods.list_enabled())),
            methods::SYSTEM_VERSION => Ok(json!(JSONRPC_VERSION)),
            _ => Err(AppError::method_not_found(method)),
        }
    }
}

/// Decodes request params into the shape a method expects. A mismatch is always an
/// invalid-params error, never a defaulted value.
pub fn decode_params<T: DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params).map_err(|err| AppError::invalid_params(err.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|err| AppError::internal(format!("failed to serialize result: {err}")))
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "credentials" | "credential" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
}
