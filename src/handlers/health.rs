//! Health, dependency probes, and metrics endpoints.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde_json::{Value, json};

use crate::breaker::BreakerState;
use crate::metrics::{SERVER_NAME, SERVER_VERSION};
use crate::state::{AppState, RequestContext};
use crate::upstream::Upstream;

/// Composite view over both upstream probes.
pub struct DependencyReport {
    pub status: &'static str,
    pub healthy: bool,
    pub unhealthy: bool,
    pub dependencies: Value,
}

/// Probe both upstreams concurrently and roll their states up.
///
/// Per dependency: no HTTP response → unhealthy; non-2xx → degraded;
/// 2xx with the breaker not yet CLOSED → degraded (still recovering);
/// otherwise healthy. Rollup: any unhealthy wins, then degraded.
pub async fn dependency_report(state: &AppState, ctx: &RequestContext) -> DependencyReport {
    let (api, functions) = tokio::join!(
        state.upstream.probe(Upstream::Api, "/api/v1/health", ctx),
        state
            .upstream
            .probe(Upstream::EdgeFunctions, "/intelligence-health", ctx),
    );

    let classify = |outcome: &crate::upstream::ProbeOutcome, upstream: Upstream| -> &'static str {
        if outcome.status.is_none() {
            return "unhealthy";
        }
        if !outcome.responded_ok() {
            return "degraded";
        }
        let breaker = state.breakers.get(upstream.breaker_name());
        if breaker.state() == BreakerState::Closed {
            "healthy"
        } else {
            "degraded"
        }
    };

    let api_status = classify(&api, Upstream::Api);
    let functions_status = classify(&functions, Upstream::EdgeFunctions);

    let unhealthy = api_status == "unhealthy" || functions_status == "unhealthy";
    let healthy = api_status == "healthy" && functions_status == "healthy";
    let status = if unhealthy {
        "unhealthy"
    } else if healthy {
        "healthy"
    } else {
        "degraded"
    };

    let dependency = |name: &str, status: &str, outcome: &crate::upstream::ProbeOutcome| {
        json!({
            "name": name,
            "status": status,
            "latencyMs": outcome.latency_ms,
            "httpStatus": outcome.status,
            "error": outcome.error,
        })
    };

    DependencyReport {
        status,
        healthy,
        unhealthy,
        dependencies: json!([
            dependency("primary-api", api_status, &api),
            dependency("edge-functions", functions_status, &functions),
        ]),
    }
}

/// `GET /health` — fast liveness. Always "healthy" while the process runs.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Gateway process is alive"))
)]
pub async fn health(Extension(ctx): Extension<RequestContext>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "server": SERVER_NAME,
        "version": SERVER_VERSION,
        "requestId": ctx.request_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `GET /health/full` — dependency-aware health. 200 for healthy/degraded,
/// 503 when any dependency is unreachable.
#[utoipa::path(
    get,
    path = "/health/full",
    tag = "health",
    responses(
        (status = 200, description = "Dependencies healthy or degraded"),
        (status = 503, description = "At least one dependency is unreachable")
    )
)]
pub async fn health_full(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> impl IntoResponse {
    let report = dependency_report(&state, &ctx).await;
    let status_code = if report.unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (
        status_code,
        Json(json!({
            "status": report.status,
            "server": SERVER_NAME,
            "version": SERVER_VERSION,
            "dependencies": report.dependencies,
            "circuitBreakers": state.breakers.snapshots(),
            "requestId": ctx.request_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// `GET /metrics` — Prometheus text exposition.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    responses((status = 200, description = "Prometheus exposition, text format 0.0.4"))
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let cache_stats: Vec<_> = state.caches.all().iter().map(|c| c.stats()).collect();
    let body = state
        .metrics
        .render_prometheus(&state.breakers.snapshots(), &cache_stats);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

/// `GET /health/metrics` — JSON mirror of the exposition, correlation id
/// echoed.
#[utoipa::path(
    get,
    path = "/health/metrics",
    tag = "metrics",
    responses((status = 200, description = "Runtime metrics as JSON"))
)]
pub async fn health_metrics(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Json<Value> {
    let cache_stats: Vec<_> = state.caches.all().iter().map(|c| c.stats()).collect();
    Json(state.metrics.snapshot_json(
        &state.breakers.snapshots(),
        &cache_stats,
        &ctx.request_id,
    ))
}
