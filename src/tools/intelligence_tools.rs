//! Intelligence and memory-utility tool handlers (functions domain).

use serde_json::Value;

use crate::cache::cache_key;
use crate::error::{FieldError, GatewayError};
use crate::state::{AppState, RequestContext};

pub async fn health_check(state: &AppState, ctx: &RequestContext) -> Result<Value, GatewayError> {
    state.upstream.intelligence_health(ctx).await
}

pub async fn suggest_tags(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.suggest_tags(args, ctx).await
}

pub async fn find_related(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    if args.get("memory_id").is_none() && args.get("content").is_none() {
        return Err(GatewayError::validation(
            "invalid arguments",
            vec![FieldError::new(
                "memory_id",
                "either memory_id or content must be provided",
            )],
        ));
    }
    state.upstream.find_related(args, ctx).await
}

pub async fn detect_duplicates(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.detect_duplicates(args, ctx).await
}

pub async fn extract_insights(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.extract_insights(args, ctx).await
}

pub async fn analyze_patterns(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.analyze_patterns(args, ctx).await
}

/// Aggregate store statistics, memoized in the stats cache.
pub async fn memory_stats(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let key = cache_key("memory:stats", args);
    state
        .caches
        .stats
        .get_or_fetch(&key, None, || state.upstream.memory_stats(args, ctx))
        .await
}

pub async fn memory_bulk_delete(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    if args.get("confirm").and_then(|v| v.as_bool()) != Some(true) {
        return Err(GatewayError::validation(
            "invalid arguments",
            vec![FieldError::new("confirm", "must be true to bulk delete")],
        ));
    }
    let deleted = state.upstream.bulk_delete_memories(args, ctx).await?;
    state.caches.invalidate_after_write();
    Ok(deleted)
}
