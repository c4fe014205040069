//! Client side of the three bindings behind one call contract
//!
//! `McpClient` is fixed to one `Transport` at construction. Operations the chosen
//! transport cannot carry fail locally with `ClientError::Unsupported`, before anything
//! touches the network.

pub mod error;
pub mod http;
pub mod sse;
pub mod websocket;

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

pub use error::{ClientError, TransportKind};
pub use http::HttpTransport;
pub use sse::{EventParser, EventRecord, SseTransport};
pub use websocket::WebSocketTransport;

use crate::mcp::methods;
use crate::registry::ToolSummary;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// Upper bound on waiting for one response, for HTTP and WebSocket calls.
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub tools: Vec<ToolSummary>,
}

#[derive(Debug, Deserialize)]
struct ToolList {
    tools: Vec<ToolSummary>,
}

pub enum Transport {
    Http(HttpTransport),
    WebSocket(WebSocketTransport),
    Sse(SseTransport),
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Http(_) => TransportKind::Http,
            Self::WebSocket(_) => TransportKind::WebSocket,
            Self::Sse(_) => TransportKind::Sse,
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        match self {
            Self::Http(transport) => transport.call(method, params).await,
            Self::WebSocket(transport) => transport.call(method, params).await,
            Self::Sse(_) => Err(ClientError::unsupported(self.kind(), "rpc calls")),
        }
    }

    pub async fn subscribe<F>(&self, handler: F) -> Result<(), ClientError>
    where
        F: FnMut(EventRecord) + Send,
    {
        match self {
            Self::Sse(transport) => transport.subscribe(handler).await,
            Self::Http(_) | Self::WebSocket(_) => {
                Err(ClientError::unsupported(self.kind(), "event subscriptions"))
            }
        }
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        match self {
            Self::Http(_) => Ok(()),
            Self::WebSocket(transport) => transport.close().await,
            Self::Sse(transport) => {
                transport.close();
                Ok(())
            }
        }
    }
}

pub struct McpClient {
    transport: Transport,
}

impl McpClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn http(url: impl Into<String>) -> Result<Self, ClientError> {
        Self::http_with_options(url, &ClientOptions::default())
    }

    pub fn http_with_options(
        url: impl Into<String>,
        options: &ClientOptions,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(Transport::Http(HttpTransport::new(url, options)?)))
    }

    pub async fn websocket(url: &str) -> Result<Self, ClientError> {
        Self::websocket_with_options(url, &ClientOptions::default()).await
    }

    pub async fn websocket_with_options(
        url: &str,
        options: &ClientOptions,
    ) -> Result<Self, ClientError> {
        let transport = WebSocketTransport::connect(url, options).await?;
        Ok(Self::new(Transport::WebSocket(transport)))
    }

    pub fn sse(url: impl Into<String>) -> Result<Self, ClientError> {
        Self::sse_with_options(url, &ClientOptions::default())
    }

    pub fn sse_with_options(
        url: impl Into<String>,
        options: &ClientOptions,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(Transport::Sse(SseTransport::new(url, options)?)))
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params).map_err(ClientError::Encode)?;
        let result = self.transport.call(method, params).await?;
        serde_json::from_value(result).map_err(ClientError::Decode)
    }

    /// Runs a registered tool through `tools.run`.
    pub async fn call_tool<A, R>(&self, name: &str, arguments: A) -> Result<R, ClientError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let arguments = serde_json::to_value(arguments).map_err(ClientError::Encode)?;
        self.call(methods::TOOLS_RUN, json!({ "name": name, "arguments": arguments }))
            .await
    }

    pub async fn server_info(&self) -> Result<ServerInfo, ClientError> {
        self.call(methods::SERVER_INFO, json!({})).await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolSummary>, ClientError> {
        let list: ToolList = self.call(methods::TOOLS_LIST, json!({})).await?;
        Ok(list.tools)
    }

    pub async fn list_methods(&self) -> Result<Vec<String>, ClientError> {
        self.call(methods::SYSTEM_LIST_METHODS, json!({})).await
    }

    pub async fn subscribe<F>(&self, handler: F) -> Result<(), ClientError>
    where
        F: FnMut(EventRecord) + Send,
    {
        self.transport.subscribe(handler).await
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.transport.close().await
    }
}
