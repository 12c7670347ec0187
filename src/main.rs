use http::header;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use lanonasis_mcp_gateway::config::{GatewayConfig, GatewayMode};
use lanonasis_mcp_gateway::state::AppState;
use lanonasis_mcp_gateway::{create_router, logging, mcp, warmup};

fn build_app(state: AppState) -> axum::Router {
    // Discovery documents must be reachable from any origin, so CORS is
    // wide open; authorization happens upstream, never here.
    let cors = CorsLayer::permissive();

    create_router(state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            header::HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let (config, warnings) = GatewayConfig::from_env()?;
    logging::init_tracing(&config);
    for warning in &warnings {
        tracing::warn!(component = "config", "{warning}");
    }

    let state = AppState::new(config);
    tracing::info!(
        component = "startup",
        tools = state.registry.tool_count(),
        prompts = state.registry.prompt_count(),
        resources = state.registry.resource_count(),
        api = %state.config.api_base_url,
        functions = %state.config.functions_base_url,
        "gateway initialised"
    );

    let _sweeper = state.caches.clone().spawn_sweeper();
    let _warmup = warmup::spawn(state.clone());

    match state.config.mode {
        GatewayMode::Stdio => mcp::stdio::run(state).await,
        GatewayMode::Http => serve_http(state).await,
    }
}

async fn serve_http(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;
    let summary_state = state.clone();
    let app = build_app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(component = "startup", %addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        component = "shutdown",
        uptime_seconds = summary_state.metrics.uptime().as_secs(),
        total_requests = summary_state.metrics.total_requests(),
        open_sessions = summary_state.sessions.len(),
        "gateway stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
