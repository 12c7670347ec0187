//! Memory tool handlers, including the chunked-create composite.

use serde_json::{Value, json};

use crate::cache::cache_key;
use crate::chunker::{self, ChunkOptions};
use crate::error::{FieldError, GatewayError};
use crate::state::{AppState, RequestContext};

pub async fn list_memories(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let key = cache_key("memory:list", args);
    state
        .caches
        .memory_list
        .get_or_fetch(&key, None, || state.upstream.list_memories(args, ctx))
        .await
}

pub async fn create_memory(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let payload = memory_payload(args);
    let created = state.upstream.create_memory(&payload, ctx).await?;
    state.caches.invalidate_after_write();
    Ok(created)
}

/// Composite chunked create. Small content forwards as one create; large
/// content is split and each chunk created sequentially so upstream write
/// order is preserved and per-request upstream pressure stays bounded.
pub async fn create_memory_chunked(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let title = required_str(args, "title")?;
    let content = required_str(args, "content")?;
    let options = chunk_options(args);

    if !chunker::needs_chunking(content, options.max_chunk_size) {
        let created = state
            .upstream
            .create_memory(&memory_payload(args), ctx)
            .await?;
        state.caches.invalidate_after_write();
        return Ok(json!({
            "chunked": false,
            "totalChunks": 1,
            "originalLength": content.len(),
            "result": created,
        }));
    }

    let tags: Vec<String> = args
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let memory_type = args
        .get("memory_type")
        .and_then(|v| v.as_str())
        .unwrap_or("context");
    let metadata = args.get("metadata").cloned().unwrap_or(Value::Null);

    let (payloads, split) = chunker::build_chunked_payloads(
        title,
        content,
        memory_type,
        &tags,
        &metadata,
        &options,
    );
    let total = payloads.len();
    tracing::info!(
        component = "chunker",
        request_id = %ctx.request_id,
        total_chunks = total,
        original_length = content.len(),
        split_method = split.split_method.as_str(),
        "creating chunked memory"
    );

    let mut results = Vec::with_capacity(total);
    let mut errors: Vec<Value> = Vec::new();
    for (i, payload) in payloads.iter().enumerate() {
        match state.upstream.create_memory(payload, ctx).await {
            Ok(created) => results.push(json!({ "chunk": i + 1, "result": created })),
            Err(err) => errors.push(json!({
                "chunk": i + 1,
                "error": err.to_payload(&ctx.request_id)["error"],
            })),
        }
    }
    state.caches.invalidate_after_write();

    let mut summary = json!({
        "chunked": true,
        "totalChunks": total,
        "successful": results.len(),
        "failed": errors.len(),
        "originalLength": content.len(),
        "splitMethod": split.split_method.as_str(),
        "results": results,
    });
    if !errors.is_empty() {
        summary["errors"] = Value::Array(errors);
    }
    Ok(summary)
}

pub async fn get_memory(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let id = required_str(args, "id")?;
    state.upstream.get_memory(id, ctx).await
}

pub async fn update_memory(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let id = required_str(args, "id")?;
    let mut payload = serde_json::Map::new();
    for field in ["title", "content", "memory_type"] {
        if let Some(v) = args.get(field) {
            if !v.is_null() {
                payload.insert(field.to_string(), v.clone());
            }
        }
    }
    for field in ["tags", "metadata"] {
        if let Some(v) = args.get(field) {
            if !v.is_null() {
                payload.insert(field.to_string(), v.clone());
            }
        }
    }
    let updated = state
        .upstream
        .update_memory(id, &Value::Object(payload), ctx)
        .await?;
    state.caches.invalidate_after_write();
    Ok(updated)
}

pub async fn delete_memory(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let id = required_str(args, "id")?;
    let deleted = state.upstream.delete_memory(id, ctx).await?;
    state.caches.invalidate_after_write();
    Ok(deleted)
}

pub async fn search_memories(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.search_memories(args, ctx).await
}

pub async fn search_docs(
    state: &AppState,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    state.upstream.search_docs(args, ctx).await
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Creation payload with the gateway's defaults filled in.
fn memory_payload(args: &Value) -> Value {
    json!({
        "title": args.get("title").cloned().unwrap_or(Value::Null),
        "content": args.get("content").cloned().unwrap_or(Value::Null),
        "memory_type": args
            .get("memory_type")
            .and_then(|v| v.as_str())
            .unwrap_or("context"),
        "tags": args.get("tags").cloned().unwrap_or_else(|| json!([])),
        "metadata": args.get("metadata").cloned().unwrap_or_else(|| json!({})),
    })
}

fn chunk_options(args: &Value) -> ChunkOptions {
    let defaults = ChunkOptions::default();
    let get = |key: &str, fallback: usize| -> usize {
        args.get(key)
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(fallback)
    };
    ChunkOptions {
        max_chunk_size: get("max_chunk_size", defaults.max_chunk_size),
        overlap_size: get("overlap_size", defaults.overlap_size),
        min_chunk_size: get("min_chunk_size", defaults.min_chunk_size),
    }
}

/// Schema validation runs before handlers, so a missing field here is a
/// programming error in the catalog — still surfaced as a normalized error.
fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, GatewayError> {
    args.get(field).and_then(|v| v.as_str()).ok_or_else(|| {
        GatewayError::validation(
            "invalid arguments",
            vec![FieldError::new(field, "is required")],
        )
    })
}
