//! API-key, project, and organization tool handlers. Thin forwards to the
//! upstream adapters; key secrets never transit the gateway logs.

use serde_json::{Value, json};

use crate::error::{FieldError, GatewayError};
use crate::state::{AppState, RequestContext};

pub async fn list_api_keys(state: &AppState, ctx: &RequestContext) -> Result<Value, GatewayError> {
    state.upstream.list_api_keys(ctx).await
}

pub async fn create_api_key(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let payload = json!({
        "name": args.get("name").cloned().unwrap_or(Value::Null),
        "access_level": args
            .get("access_level")
            .and_then(|v| v.as_str())
            .unwrap_or("authenticated"),
        "project_id": args.get("project_id").cloned().unwrap_or(Value::Null),
        "expires_in_days": args.get("expires_in_days").cloned().unwrap_or(Value::Null),
        "risk_level": args.get("risk_level").cloned().unwrap_or(Value::Null),
    });
    state.upstream.create_api_key(&payload, ctx).await
}

pub async fn delete_api_key(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state
        .upstream
        .delete_api_key(key_id(args)?, ctx)
        .await
}

pub async fn rotate_api_key(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state
        .upstream
        .rotate_api_key(key_id(args)?, ctx)
        .await
}

pub async fn revoke_api_key(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state
        .upstream
        .revoke_api_key(key_id(args)?, ctx)
        .await
}

pub async fn list_projects(state: &AppState, ctx: &RequestContext) -> Result<Value, GatewayError> {
    state.upstream.list_projects(ctx).await
}

pub async fn create_project(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.create_project(args, ctx).await
}

pub async fn get_organization_info(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.get_organization(ctx).await
}

fn key_id(args: &Value) -> Result<&str, GatewayError> {
    args.get("key_id").and_then(|v| v.as_str()).ok_or_else(|| {
        GatewayError::validation(
            "invalid arguments",
            vec![FieldError::new("key_id", "is required")],
        )
    })
}
