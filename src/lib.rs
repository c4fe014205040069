use std::{sync::Arc, time::Duration};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;

pub mod client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod registry;

use events::EventHub;
use mcp::server::Dispatcher;
use registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub events: Arc<EventHub>,
    pub heartbeat_interval: Duration,
    /// Server-wide shutdown. Connection tokens are children of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, heartbeat_interval: Duration) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(registry)),
            events: Arc::new(EventHub::new()),
            heartbeat_interval,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route("/ws", get(http::ws::ws_endpoint))
        .route("/sse", get(http::sse::sse_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use futures::{SinkExt, StreamExt};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio_tungstenite::{
        connect_async,
        tungstenite::{protocol::frame::coding::CloseCode, Message as WsMessage},
    };
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::client::{ClientError, ClientOptions, McpClient};
    use crate::events::spawn_event_ticker;
    use crate::mcp::rpc::{INVALID_PARAMS, METHOD_NOT_FOUND};

    use super::*;

    fn state_with_heartbeat(heartbeat_interval: Duration) -> AppState {
        let registry = Registry::new();
        domain::register_demo_capabilities(&registry);
        AppState::new(Arc::new(registry), heartbeat_interval)
    }

    fn state() -> AppState {
        state_with_heartbeat(Duration::from_secs(30))
    }

    fn app() -> Router {
        build_app(state())
    }

    async fn spawn_server(state: AppState) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = build_app(state);
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .await
                .expect("serve");
        });
        addr
    }

    fn rpc_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request build")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&body).expect("valid json response")
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert_eq!(body, "{\"status\":\"ok\"}");
    }

    #[tokio::test]
    async fn discovery_names_all_bindings() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/.well-known/mcp")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        assert_eq!(body_json["mcp_endpoint"], "/mcp");
        assert_eq!(body_json["websocket_endpoint"], "/ws");
        assert_eq!(body_json["events_endpoint"], "/sse");
    }

    #[tokio::test]
    async fn root_get_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mcp_unknown_method_returns_method_not_found() {
        let response = app()
            .oneshot(rpc_request(
                r#"{"jsonrpc":"2.0","id":1,"method":"foo.bar"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert_eq!(
            body,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32601,\"message\":\"method not found: foo.bar\"}}"
        );
    }

    #[tokio::test]
    async fn mcp_echo_returns_arguments() {
        let response = app()
            .oneshot(rpc_request(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools.run","params":{"name":"echo","arguments":{"x":1}}}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        assert_eq!(body_json["id"], 2);
        assert_eq!(body_json["result"], json!({"x": 1}));
        assert!(body_json.get("error").is_none());
    }

    #[tokio::test]
    async fn mcp_malformed_body_is_rejected_before_dispatch() {
        let response = app()
            .oneshot(rpc_request(r#"{"jsonrpc":"2.0","id":"#))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = body_json(response).await;
        assert_eq!(body_json["code"], "parse_error");
    }

    #[tokio::test]
    async fn mcp_disabled_method_matches_unknown_method() {
        let state = state();
        state.dispatcher.methods().set_enabled("tools.list", false);
        let app = build_app(state);

        let response = app
            .clone()
            .oneshot(rpc_request(r#"{"id":3,"method":"tools.list"}"#))
            .await
            .expect("request execution");
        let disabled = body_json(response).await;

        let response = app
            .oneshot(rpc_request(r#"{"id":3,"method":"tools.lists"}"#))
            .await
            .expect("request execution");
        let unknown = body_json(response).await;

        assert_eq!(disabled["error"]["code"], unknown["error"]["code"]);
        assert_eq!(disabled["error"]["code"], METHOD_NOT_FOUND);
        assert!(disabled.get("result").is_none());
    }

    #[tokio::test]
    async fn mcp_resource_list_has_names_and_types() {
        let response = app()
            .oneshot(rpc_request(r#"{"id":4,"method":"resources.list"}"#))
            .await
            .expect("request execution");

        let body_json = body_json(response).await;
        assert_eq!(
            body_json["result"]["resources"],
            json!([{"name": "test1", "type": "string"}, {"name": "test2", "type": "int"}])
        );
    }

    #[tokio::test]
    async fn http_client_runs_tools_end_to_end() {
        let addr = spawn_server(state()).await;
        let client = McpClient::http(format!("http://{addr}/mcp")).expect("client");

        let echoed: Value = client
            .call_tool("echo", json!({"x": 1}))
            .await
            .expect("echo");
        assert_eq!(echoed, json!({"x": 1}));

        let info = client.server_info().await.expect("server info");
        assert_eq!(info.name, env!("CARGO_PKG_NAME"));
        assert!(info.tools.iter().any(|tool| tool.name == "geocode"));

        let tools = client.list_tools().await.expect("tools");
        assert_eq!(tools.len(), 4);

        let err = client
            .call_tool::<_, Value>("teleport", json!({}))
            .await
            .expect_err("unregistered tool");
        assert_eq!(err.rpc_code(), Some(METHOD_NOT_FOUND));
        assert!(err.to_string().contains("teleport"));
    }

    #[tokio::test]
    async fn websocket_sequential_calls_get_their_own_results() {
        let addr = spawn_server(state()).await;
        let client = McpClient::websocket(&format!("ws://{addr}/ws"))
            .await
            .expect("connect");

        let first: Value = client
            .call_tool("echo", json!({"call": 1}))
            .await
            .expect("first");
        let second: Value = client
            .call_tool("echo", json!({"call": 2}))
            .await
            .expect("second");
        assert_eq!(first, json!({"call": 1}));
        assert_eq!(second, json!({"call": 2}));

        let version: String = client
            .call("system.version", json!({}))
            .await
            .expect("version");
        assert_eq!(version, "2.0");

        let err = client
            .call::<_, Value>("foo.bar", json!({}))
            .await
            .expect_err("unknown method");
        assert_eq!(err.rpc_code(), Some(METHOD_NOT_FOUND));
        assert!(err.to_string().contains("not found"));

        client.close().await.expect("close");
        let err = client
            .call::<_, Value>("system.version", json!({}))
            .await
            .expect_err("closed");
        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn websocket_tools_run_with_bad_params_is_invalid_params() {
        // Guards against running the tool with a defaulted payload.
        let addr = spawn_server(state()).await;
        let client = McpClient::websocket(&format!("ws://{addr}/ws"))
            .await
            .expect("connect");

        for params in [json!("oops"), json!({"arguments": {}}), json!({"name": 7})] {
            let err = client
                .call::<_, Value>("tools.run", params)
                .await
                .expect_err("bad params");
            assert_eq!(err.rpc_code(), Some(INVALID_PARAMS));
        }

        let ok: Value = client
            .call_tool("echo", json!("still usable"))
            .await
            .expect("connection survives param errors");
        assert_eq!(ok, json!("still usable"));
    }

    #[tokio::test]
    async fn websocket_concurrent_callers_do_not_cross_talk() {
        let addr = spawn_server(state()).await;
        let client = Arc::new(
            McpClient::websocket(&format!("ws://{addr}/ws"))
                .await
                .expect("connect"),
        );

        let callers: Vec<_> = (0..8)
            .map(|caller| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    for round in 0..10 {
                        let sent = json!({"caller": caller, "round": round});
                        let received: Value =
                            client.call_tool("echo", sent.clone()).await.expect("echo");
                        assert_eq!(received, sent);
                    }
                })
            })
            .collect();

        for caller in callers {
            caller.await.expect("caller");
        }
    }

    #[tokio::test]
    async fn websocket_server_sends_heartbeat_pings() {
        let addr = spawn_server(state_with_heartbeat(Duration::from_millis(50))).await;
        let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("connect");

        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("ping within deadline")
            .expect("stream open")
            .expect("frame");
        match message {
            WsMessage::Ping(payload) => assert_eq!(&payload[..], b"ping"),
            other => panic!("expected ping, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn websocket_malformed_envelope_closes_with_invalid_payload() {
        let addr = spawn_server(state()).await;
        let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("connect");

        socket
            .send(WsMessage::Text("not json".into()))
            .await
            .expect("send");

        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("reply within deadline")
            .expect("stream open")
            .expect("frame");
        match message {
            WsMessage::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Invalid),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn websocket_client_close_sends_close_frame_then_releases() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake");
            while let Some(message) = socket.next().await {
                match message {
                    Ok(WsMessage::Close(frame)) => {
                        let _ = seen_tx.send(format!("close:{:?}", frame.map(|f| f.code)));
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            let _ = seen_tx.send("released".to_string());
        });

        let client = McpClient::websocket(&format!("ws://{addr}"))
            .await
            .expect("connect");
        client.close().await.expect("close");
        client.close().await.expect("second close is a no-op");

        let first = seen_rx.recv().await.expect("first observation");
        let second = seen_rx.recv().await.expect("second observation");
        assert_eq!(first, format!("close:{:?}", Some(CloseCode::Normal)));
        assert_eq!(second, "released");
    }

    #[tokio::test]
    async fn websocket_call_times_out_and_drops_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake");
            // Read requests, never answer.
            while let Some(Ok(_)) = socket.next().await {}
        });

        let options = ClientOptions {
            request_timeout: Duration::from_millis(100),
            ..ClientOptions::default()
        };
        let client = McpClient::websocket_with_options(&format!("ws://{addr}"), &options)
            .await
            .expect("connect");

        let err = client
            .call::<_, Value>("system.version", json!({}))
            .await
            .expect_err("no answer");
        assert!(matches!(err, ClientError::Timeout(_)));

        let err = client
            .call::<_, Value>("system.version", json!({}))
            .await
            .expect_err("connection dropped");
        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn sse_client_receives_labeled_updates() {
        let state = state();
        let hub = Arc::clone(&state.events);
        let shutdown = CancellationToken::new();
        let ticker = spawn_event_ticker(
            Arc::clone(&hub),
            Duration::from_millis(20),
            shutdown.clone(),
        );
        let addr = spawn_server(state).await;

        let client = Arc::new(McpClient::sse(format!("http://{addr}/sse")).expect("client"));
        let (records_tx, mut records_rx) = mpsc::unbounded_channel();
        let subscriber = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .subscribe(move |record| {
                        let _ = records_tx.send(record);
                    })
                    .await
            })
        };

        let first = records_rx.recv().await.expect("first record");
        let second = records_rx.recv().await.expect("second record");
        assert_eq!(first.label, "update");
        assert_eq!(second.label, "update");
        assert!(first.json().expect("json")["message"]
            .as_str()
            .expect("message")
            .starts_with("Event #"));

        client.close().await.expect("close");
        subscriber
            .await
            .expect("subscriber task")
            .expect("subscription ends cleanly");

        let mut remaining = hub.subscriber_count();
        for _ in 0..100 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            remaining = hub.subscriber_count();
        }
        assert_eq!(remaining, 0);

        shutdown.cancel();
        ticker.await.expect("ticker join");
    }

    #[tokio::test]
    async fn rpc_only_clients_cannot_subscribe() {
        let addr = spawn_server(state()).await;
        let client = McpClient::websocket(&format!("ws://{addr}/ws"))
            .await
            .expect("connect");

        let err = client.subscribe(|_| {}).await.expect_err("unsupported");
        assert!(matches!(err, ClientError::Unsupported { .. }));
        client.close().await.expect("close");
    }
}
