use std::sync::Arc;

use mcp_transports::{
    build_app, config::Config, domain, events::spawn_event_ticker, logging, registry::Registry,
    AppState,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let bind_socket = config.bind_socket()?;

    let registry = Arc::new(Registry::new());
    domain::register_demo_capabilities(&registry);
    info!(
        tools = registry.tools.len(),
        resources = registry.resources.len(),
        prompts = registry.prompts.len(),
        "capabilities registered"
    );
    if registry.tools.is_empty() {
        warn!("no tools registered, every tools.run call will be rejected");
    }

    let state = AppState::new(registry, config.heartbeat_interval);
    for method in &config.disabled_methods {
        state.dispatcher.methods().set_enabled(method, false);
        info!(method = %method, "method disabled by configuration");
    }

    let shutdown = state.shutdown.clone();
    let ticker = spawn_event_ticker(
        Arc::clone(&state.events),
        config.event_interval,
        shutdown.clone(),
    );

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        event_interval_secs = config.event_interval.as_secs(),
        "server starting"
    );

    let signal = shutdown.clone();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    ticker.await?;
    Ok(())
}
