//! Duplex client transport over one persistent WebSocket
//!
//! Calls are strictly sequential. The socket mutex is held across the whole send and
//! receive, and the next data message is taken as the response to the request just sent.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message as WsMessage,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use super::{ClientError, ClientOptions};
use crate::mcp::rpc::{RequestIds, RpcRequest, RpcResponse};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    url: String,
    socket: Mutex<Option<WsStream>>,
    ids: RequestIds,
    request_timeout: Duration,
}

impl WebSocketTransport {
    pub async fn connect(url: &str, options: &ClientOptions) -> Result<Self, ClientError> {
        let (socket, _) = tokio::time::timeout(options.connect_timeout, connect_async(url))
            .await
            .map_err(|_| ClientError::Timeout(options.connect_timeout))??;
        info!(url, "websocket connected");

        Ok(Self {
            url: url.to_string(),
            socket: Mutex::new(Some(socket)),
            ids: RequestIds::new(),
            request_timeout: options.request_timeout,
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let mut guard = self.socket.lock().await;
        let socket = guard.as_mut().ok_or(ClientError::ConnectionClosed)?;

        let request = RpcRequest::new(self.ids.next_id(), method, params);
        let text = serde_json::to_string(&request).map_err(ClientError::Encode)?;
        debug!(id = request.id, method, url = %self.url, "sending websocket request");

        let exchange = async {
            socket
                .send(WsMessage::Text(text.into()))
                .await
                .map_err(ClientError::from)?;
            next_response(socket).await
        };

        let outcome = tokio::time::timeout(self.request_timeout, exchange).await;
        let response = match outcome {
            Ok(response) => response?,
            Err(_) => {
                // A late reply would be read as the answer to the next call.
                warn!(id = request.id, "websocket call timed out, dropping connection");
                *guard = None;
                return Err(ClientError::Timeout(self.request_timeout));
            }
        };

        if response.id != request.id {
            warn!(
                expected = request.id,
                received = response.id,
                "response id does not match request"
            );
        }

        response.into_result().map_err(ClientError::from)
    }

    /// Sends a normal close frame, then releases the socket. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), ClientError> {
        let Some(mut socket) = self.socket.lock().await.take() else {
            return Ok(());
        };

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        let sent = socket.send(WsMessage::Close(Some(frame))).await;
        drop(socket);
        debug!(url = %self.url, "websocket released");

        match sent.map_err(ClientError::from) {
            Ok(()) | Err(ClientError::ConnectionClosed) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

async fn next_response(socket: &mut WsStream) -> Result<RpcResponse, ClientError> {
    while let Some(message) = socket.next().await {
        match message? {
            WsMessage::Text(text) => {
                return serde_json::from_str(text.as_str()).map_err(ClientError::Decode);
            }
            WsMessage::Binary(bytes) => {
                return serde_json::from_slice(&bytes).map_err(ClientError::Decode);
            }
            WsMessage::Close(frame) => {
                debug!(frame = ?frame, "server closed connection");
                return Err(ClientError::ConnectionClosed);
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
        }
    }

    Err(ClientError::ConnectionClosed)
}
