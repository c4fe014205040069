//! WebSocket binding: sequential request/response pairs over one persistent connection
//!
//! Each connection runs a heartbeat task next to the read/dispatch loop. Both watch one
//! `CancellationToken`; whichever side sees the connection end cancels it, and a second
//! cancel is a no-op.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    stream::{SplitSink, SplitStream},
    Sink, SinkExt, StreamExt,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mcp::rpc::RpcRequest;
use crate::AppState;

pub const HEARTBEAT_PAYLOAD: &[u8] = b"ping";

/// Upper bound on delivering the final Close frame to a peer that stopped reading.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

static CONNECTION_IDS: AtomicU64 = AtomicU64::new(0);

pub async fn ws_endpoint(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection = CONNECTION_IDS.fetch_add(1, Ordering::Relaxed) + 1;
    info!(connection, "websocket client connected");

    let (sink, mut stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));
    let cancel = state.shutdown.child_token();

    let heartbeat = tokio::spawn(run_heartbeat(
        Arc::clone(&sink),
        state.heartbeat_interval,
        cancel.clone(),
        connection,
    ));

    let frame = read_loop(&mut stream, &sink, &state, &cancel, connection).await;
    cancel.cancel();
    if let Err(err) = heartbeat.await {
        error!(connection, error = %err, "heartbeat task panicked");
    }

    close_connection(&sink, frame, connection).await;
    info!(connection, "websocket client disconnected");
}

/// Pings the peer every `interval` until `cancel` fires. A ping that fails, or that cannot
/// be written within one interval, cancels the connection.
async fn run_heartbeat<S>(
    sink: Arc<Mutex<S>>,
    interval: Duration,
    cancel: CancellationToken,
    connection: u64,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let ping = async {
                    sink.lock()
                        .await
                        .send(Message::Ping(Bytes::from_static(HEARTBEAT_PAYLOAD)))
                        .await
                };
                let sent = tokio::select! {
                    _ = cancel.cancelled() => return,
                    sent = tokio::time::timeout(interval, ping) => sent,
                };
                match sent {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(connection, error = %err, "heartbeat failed, closing connection");
                        cancel.cancel();
                        return;
                    }
                    Err(_) => {
                        warn!(connection, "heartbeat stalled, closing connection");
                        cancel.cancel();
                        return;
                    }
                }
            }
        }
    }
}

/// Runs until the peer leaves, the heartbeat gives up, or an undecodable message arrives.
/// Returns the close frame to send on the way out.
async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    sink: &SharedSink,
    state: &AppState,
    cancel: &CancellationToken,
    connection: u64,
) -> CloseFrame {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return normal_close(),
            message = stream.next() => message,
        };

        let message = match message {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                warn!(connection, error = %err, "websocket read error");
                return normal_close();
            }
            None => {
                debug!(connection, "websocket stream ended");
                return normal_close();
            }
        };

        let request: Result<RpcRequest, serde_json::Error> = match message {
            Message::Text(text) => serde_json::from_str(text.as_str()),
            Message::Binary(bytes) => serde_json::from_slice(&bytes),
            Message::Close(frame) => {
                debug!(
                    connection,
                    code = frame.as_ref().map(|frame| frame.code),
                    "client closed connection"
                );
                return normal_close();
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let request = match request {
            Ok(request) => request,
            Err(err) => {
                warn!(connection, error = %err, "malformed request envelope");
                return CloseFrame {
                    code: close_code::INVALID,
                    reason: Utf8Bytes::from_static("malformed request envelope"),
                };
            }
        };

        let response = state.dispatcher.handle(request).await;
        let text = match serde_json::to_string(&response) {
            Ok(text) => text,
            Err(err) => {
                error!(connection, error = %err, "failed to serialize response");
                return CloseFrame {
                    code: close_code::ERROR,
                    reason: Utf8Bytes::from_static("internal error"),
                };
            }
        };

        let sent = tokio::select! {
            _ = cancel.cancelled() => return normal_close(),
            sent = async { sink.lock().await.send(Message::Text(text.into())).await } => sent,
        };
        if let Err(err) = sent {
            warn!(connection, error = %err, "websocket write error");
            return normal_close();
        }
    }
}

fn normal_close() -> CloseFrame {
    CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static("bye"),
    }
}

/// Close frame first so the peer can finish its own read loop, then release the socket.
async fn close_connection(sink: &SharedSink, frame: CloseFrame, connection: u64) {
    let release = async {
        let mut sink = sink.lock().await;
        if let Err(err) = sink.send(Message::Close(Some(frame))).await {
            debug!(connection, error = %err, "close frame not delivered");
        }
        if let Err(err) = sink.close().await {
            debug!(connection, error = %err, "websocket release failed");
        }
    };

    if tokio::time::timeout(CLOSE_GRACE, release).await.is_err() {
        warn!(connection, "peer did not accept close frame, dropping connection");
    }
}
