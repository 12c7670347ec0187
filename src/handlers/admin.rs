//! Administrative endpoints: cache clears and breaker resets. Immediate
//! and unconditional.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use crate::state::{AppState, RequestContext};

/// `POST /admin/cache/clear` with body `{cache?: "all"|"memoryList"|"stats"}`.
#[utoipa::path(
    post,
    path = "/admin/cache/clear",
    tag = "admin",
    responses(
        (status = 200, description = "Named cache(s) cleared"),
        (status = 400, description = "Unknown cache name")
    )
)]
pub async fn cache_clear(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Option<Json<Value>>,
) -> impl IntoResponse {
    let target = body
        .as_ref()
        .and_then(|json| json.0.get("cache").and_then(|c| c.as_str()))
        .unwrap_or("all")
        .to_string();

    let mut cleared = serde_json::Map::new();
    match target.as_str() {
        "all" => {
            for cache in state.caches.all() {
                cleared.insert(cache.name().to_string(), json!(cache.clear()));
            }
        }
        "memoryList" => {
            cleared.insert(
                "memoryList".to_string(),
                json!(state.caches.memory_list.clear()),
            );
        }
        "stats" => {
            cleared.insert("stats".to_string(), json!(state.caches.stats.clear()));
        }
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("unknown cache: {other}"),
                    "requestId": ctx.request_id,
                })),
            );
        }
    }

    tracing::info!(
        component = "admin",
        event = "cache_clear",
        request_id = %ctx.request_id,
        cache = %target,
        "cache cleared"
    );
    (
        StatusCode::OK,
        Json(json!({
            "cleared": cleared,
            "requestId": ctx.request_id,
        })),
    )
}

/// `POST /admin/circuit-breaker/reset` — resets every breaker to CLOSED.
#[utoipa::path(
    post,
    path = "/admin/circuit-breaker/reset",
    tag = "admin",
    responses((status = 200, description = "All breakers reset"))
)]
pub async fn breaker_reset(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Json<Value> {
    let count = state.breakers.reset_all();
    tracing::info!(
        component = "admin",
        event = "breaker_reset",
        request_id = %ctx.request_id,
        breakers = count,
        "circuit breakers reset"
    );
    Json(json!({
        "reset": count,
        "breakers": state.breakers.snapshots(),
        "requestId": ctx.request_id,
    }))
}
