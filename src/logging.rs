use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Logs one summary line per HTTP exchange. For `/ws` and `/sse` this fires when the
/// upgrade or stream response is produced, not when the connection ends.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = elapsed_ms,
        "request summary"
    );

    if status.is_client_error() && status.as_u16() != 404 {
        warn!(method = %method, path = %path, status = status.as_u16(), "request rejected");
    }

    response
}
