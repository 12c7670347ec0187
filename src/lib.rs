pub mod breaker;
pub mod cache;
pub mod chunker;
pub mod config;
pub mod discovery;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod mcp;
pub mod metrics;
pub mod sanitize;
pub mod schema;
pub mod state;
pub mod tools;
pub mod upstream;
pub mod warmup;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::{AppState, RequestContext};

// ═══════════════════════════════════════════════════════════════════════
//  Request correlation ID middleware
// ═══════════════════════════════════════════════════════════════════════

/// Per-request correlation: accept the incoming `X-Request-Id` header if
/// present, mint a v4 UUID otherwise. The id is stored in request
/// extensions as [`RequestContext`] for handlers and echoed on the
/// response. Total-request accounting happens here too, once per request.
async fn request_id_middleware(
    State(state): State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut()
        .insert(RequestContext::new(request_id.clone()));
    state.metrics.record_request();
    tracing::debug!(request_id = %request_id, "request correlation ID assigned");

    let mut response = next.run(req).await;

    if let Ok(header_value) = axum::http::HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", header_value);
    }

    response
}

// ── OpenAPI documentation ───────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lanonasis MCP Gateway",
        version = "1.0.0",
        description = "Enterprise MCP gateway — operational API",
        license(name = "MIT")
    ),
    paths(
        handlers::health::health,
        handlers::health::health_full,
        handlers::health::metrics,
        handlers::health::health_metrics,
        handlers::admin::cache_clear,
        handlers::admin::breaker_reset,
    ),
    tags(
        (name = "health", description = "Liveness and dependency health"),
        (name = "metrics", description = "Prometheus and JSON metrics"),
        (name = "admin", description = "Cache and circuit-breaker administration"),
    )
)]
pub struct ApiDoc;

/// Build the application router with the given shared state. Extracted from
/// `main()` so integration tests can drive the app without binding a port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // ── Discovery (public, no auth) ─────────────────────────────────
        .route("/", get(discovery::landing))
        .route("/server-info", get(discovery::server_card))
        .route("/.well-known/mcp.json", get(discovery::server_card))
        .route("/.well-known/mcp-config", get(discovery::mcp_config))
        .route(
            "/.well-known/oauth-protected-resource",
            get(discovery::oauth_protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(discovery::oauth_authorization_server),
        )
        .route("/register", post(discovery::register))
        // ── Health & metrics ────────────────────────────────────────────
        .route("/health", get(handlers::health::health))
        .route("/health/full", get(handlers::health::health_full))
        .route("/health/metrics", get(handlers::health::health_metrics))
        .route("/metrics", get(handlers::health::metrics))
        // ── Admin ───────────────────────────────────────────────────────
        .route("/admin/cache/clear", post(handlers::admin::cache_clear))
        .route(
            "/admin/circuit-breaker/reset",
            post(handlers::admin::breaker_reset),
        )
        // ── MCP transports ──────────────────────────────────────────────
        .route("/mcp", post(mcp::server::mcp_handler))
        .route(
            "/sse",
            get(mcp::sse::open_session).post(mcp::sse::deliver_to_session),
        )
        // Swagger UI over the operational endpoints — no auth required
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // 10 MB body limit — must precede .with_state() for the Json extractor
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        // Correlation id on every request and response
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_id_middleware,
        ))
        .with_state(state)
}
