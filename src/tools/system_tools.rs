//! System tool handlers: composite health, auth status, platform config.

use serde_json::{Value, json};

use crate::error::{FieldError, GatewayError};
use crate::handlers::health::dependency_report;
use crate::state::{AppState, RequestContext};

/// Composite health document: gateway liveness plus both upstream probes.
/// Always succeeds — degradation is reported in the body, not as an error.
pub async fn get_health_status(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let report = dependency_report(state, ctx).await;
    Ok(json!({
        "status": report.status,
        "server": crate::metrics::SERVER_NAME,
        "version": crate::metrics::SERVER_VERSION,
        "uptimeSeconds": state.metrics.uptime().as_secs(),
        "dependencies": report.dependencies,
        "circuitBreakers": state.breakers.snapshots(),
        "requestId": ctx.request_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn get_auth_status(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    match state.upstream.auth_status(ctx).await {
        Ok(status) => Ok(json!({ "authenticated": true, "details": status })),
        Err(GatewayError::Authentication { message }) => Ok(json!({
            "authenticated": false,
            "reason": message,
        })),
        Err(other) => Err(other),
    }
}

pub async fn get_config(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.get_config(config_key(args)?, ctx).await
}

pub async fn set_config(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let value = args.get("value").cloned().unwrap_or(Value::Null);
    state
        .upstream
        .set_config(config_key(args)?, &value, ctx)
        .await
}

fn config_key(args: &Value) -> Result<&str, GatewayError> {
    args.get("key").and_then(|v| v.as_str()).ok_or_else(|| {
        GatewayError::validation(
            "invalid arguments",
            vec![FieldError::new("key", "is required")],
        )
    })
}
