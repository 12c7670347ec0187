//! JSON-RPC 2.0 envelope handling shared by every transport.
//!
//! Supports:
//! - `initialize` / `notifications/initialized` — handshake
//! - `ping` — liveness
//! - `tools/list` / `tools/call`
//! - `prompts/list` / `prompts/get`
//! - `resources/list` / `resources/read`
//!
//! Tool-level failures ride inside a `tools/call` result with
//! `isError: true` and the normalized error object as the text payload;
//! protocol-level failures use JSON-RPC error codes.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use crate::metrics::{SERVER_NAME, SERVER_VERSION};
use crate::state::{AppState, RequestContext};
use crate::tools::{self, prompts};

pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// Handle one MCP envelope. Returns `None` for notifications (no response
/// is emitted); otherwise exactly one response envelope.
pub async fn handle_envelope(
    state: &AppState,
    ctx: &RequestContext,
    request: &Value,
) -> Option<Value> {
    let method = request.get("method").and_then(|v| v.as_str()).unwrap_or("");
    let id = request.get("id").cloned();
    let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

    tracing::debug!(
        component = "mcp",
        request_id = %ctx.request_id,
        method,
        "envelope received"
    );

    if method.starts_with("notifications/") {
        return None;
    }

    let result = match method {
        "initialize" => Ok(initialize_result()),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": state.registry.list_tools() })),
        "tools/call" => handle_tools_call(state, &params, ctx).await,
        "prompts/list" => Ok(handle_prompts_list(state)),
        "prompts/get" => handle_prompts_get(state, &params),
        "resources/list" => Ok(handle_resources_list(state)),
        "resources/read" => handle_resources_read(state, &params),
        _ => Err(json_rpc_error_body(-32601, "Method not found")),
    };

    // A request without an id is a notification; nothing to send back.
    let id = id?;
    Some(match result {
        Ok(result_value) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result_value,
        }),
        Err(error_value) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error_value,
        }),
    })
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false },
            "prompts": { "listChanged": false },
            "resources": { "subscribe": false, "listChanged": false },
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
        },
    })
}

async fn handle_tools_call(
    state: &AppState,
    params: &Value,
    ctx: &RequestContext,
) -> Result<Value, Value> {
    let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
        return Err(json_rpc_error_body(-32602, "Missing 'name' parameter"));
    };
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    match tools::dispatch(state, name, &arguments, ctx).await {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| "{}".to_string());
            Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "isError": false,
            }))
        }
        Err(err) => {
            err.log(&ctx.request_id);
            let payload = err.to_payload(&ctx.request_id);
            let text = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|_| "{}".to_string());
            Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "isError": true,
            }))
        }
    }
}

fn handle_prompts_list(state: &AppState) -> Value {
    let prompts: Vec<Value> = state
        .registry
        .prompts()
        .iter()
        .map(|p| {
            let arguments: Vec<Value> = p
                .schema
                .fields
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "description": f.doc,
                        "required": f.required,
                    })
                })
                .collect();
            json!({
                "name": p.name,
                "title": p.title,
                "description": p.description,
                "arguments": arguments,
            })
        })
        .collect();
    json!({ "prompts": prompts })
}

fn handle_prompts_get(state: &AppState, params: &Value) -> Result<Value, Value> {
    let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
        return Err(json_rpc_error_body(-32602, "Missing 'name' parameter"));
    };
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let Some(descriptor) = state.registry.prompts().iter().find(|p| p.name == name) else {
        return Err(json_rpc_error_body(
            -32602,
            &format!("Unknown prompt: {name}"),
        ));
    };
    let messages = prompts::render_prompt(name, &arguments)
        .map_err(|e| json_rpc_error_body(-32603, &e.to_string()))?;
    Ok(json!({
        "description": descriptor.description,
        "messages": messages,
    }))
}

fn handle_resources_list(state: &AppState) -> Value {
    let resources: Vec<Value> = state
        .registry
        .resources()
        .iter()
        .map(|r| {
            json!({
                "uri": r.uri,
                "name": r.name,
                "title": r.title,
                "mimeType": r.mime_type,
            })
        })
        .collect();
    json!({ "resources": resources })
}

fn handle_resources_read(state: &AppState, params: &Value) -> Result<Value, Value> {
    let Some(uri) = params.get("uri").and_then(|v| v.as_str()) else {
        return Err(json_rpc_error_body(-32602, "Missing 'uri' parameter"));
    };
    match prompts::read_resource(state, uri) {
        Ok((text, mime_type)) => Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": mime_type,
                "text": text,
            }],
        })),
        Err(_) => Err(json_rpc_error_body(
            -32602,
            &format!("Unknown resource URI: {uri}"),
        )),
    }
}

fn json_rpc_error_body(code: i32, message: &str) -> Value {
    json!({ "code": code, "message": message })
}

// ── Single-shot HTTP transport ──────────────────────────────────────────

/// `POST /mcp` — one envelope in, one envelope out. The transport instance
/// is the request itself; nothing outlives the response.
pub async fn mcp_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    match handle_envelope(&state, &ctx, &request).await {
        Some(response) => (StatusCode::OK, Json(response)),
        None => (StatusCode::OK, Json(json!(null))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new("test-req")
    }

    #[tokio::test]
    async fn initialize_reports_capabilities() {
        let state = AppState::new_test();
        let request = json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}});
        let response = handle_envelope(&state, &ctx(), &request).await.expect("response");
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let state = AppState::new_test();
        let request = json!({"jsonrpc":"2.0","method":"notifications/initialized"});
        assert!(handle_envelope(&state, &ctx(), &request).await.is_none());
    }

    #[tokio::test]
    async fn tools_list_returns_the_catalog() {
        let state = AppState::new_test();
        let request = json!({"jsonrpc":"2.0","id":2,"method":"tools/list"});
        let response = handle_envelope(&state, &ctx(), &request).await.expect("response");
        let tools = response["result"]["tools"].as_array().expect("tools array");
        assert_eq!(tools.len(), 28);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn unknown_method_is_a_json_rpc_error() {
        let state = AppState::new_test();
        let request = json!({"jsonrpc":"2.0","id":3,"method":"bogus/method"});
        let response = handle_envelope(&state, &ctx(), &request).await.expect("response");
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn schema_violation_yields_validation_error_payload() {
        let state = AppState::new_test();
        let request = json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": { "name": "list_memories", "arguments": { "limit": 1000 } },
        });
        let response = handle_envelope(&state, &ctx(), &request).await.expect("response");
        assert_eq!(response["result"]["isError"], true);

        let text = response["result"]["content"][0]["text"].as_str().expect("text");
        let payload: Value = serde_json::from_str(text).expect("error json");
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(payload["error"]["details"][0]["field"], "limit");
        assert!(
            payload["error"]["details"][0]["message"]
                .as_str()
                .unwrap()
                .to_lowercase()
                .contains("most")
        );
        // Schema rejection happens before any upstream adapter runs.
        assert_eq!(state.breakers.get("api").snapshot().total_failures, 0);
    }

    #[tokio::test]
    async fn malicious_input_is_rejected_without_upstream_calls() {
        let state = AppState::new_test();
        let request = json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {
                "name": "create_memory",
                "arguments": { "title": "ok", "content": "'; DROP TABLE users;--" },
            },
        });
        let response = handle_envelope(&state, &ctx(), &request).await.expect("response");
        assert_eq!(response["result"]["isError"], true);

        let text = response["result"]["content"][0]["text"].as_str().expect("text");
        let payload: Value = serde_json::from_str(text).expect("error json");
        assert_eq!(payload["error"]["code"], "INVALID_INPUT");
        // The vague message must not echo the matched pattern.
        assert!(!text.contains("DROP TABLE"));
        assert_eq!(state.breakers.get("api").snapshot().total_failures, 0);
        assert_eq!(state.breakers.get("api").snapshot().total_successes, 0);
    }

    #[tokio::test]
    async fn prompts_get_renders_messages() {
        let state = AppState::new_test();
        let request = json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "prompts/get",
            "params": { "name": "memory-workflow", "arguments": { "topic": "audits" } },
        });
        let response = handle_envelope(&state, &ctx(), &request).await.expect("response");
        let messages = response["result"]["messages"].as_array().expect("messages");
        assert!(
            messages[0]["content"]["text"]
                .as_str()
                .unwrap()
                .contains("audits")
        );
    }

    #[tokio::test]
    async fn resources_read_returns_contents() {
        let state = AppState::new_test();
        let request = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "resources/read",
            "params": { "uri": prompts::API_REFERENCE_URI },
        });
        let response = handle_envelope(&state, &ctx(), &request).await.expect("response");
        let contents = &response["result"]["contents"][0];
        assert_eq!(contents["mimeType"], "text/markdown");
        assert!(contents["text"].as_str().unwrap().contains("list_memories"));
    }
}
