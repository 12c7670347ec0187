//! Prompt and resource catalogs.
//!
//! Prompts are reusable message templates; resources are addressable
//! documents. Both share the tool descriptors' lifecycle: built at startup,
//! immutable afterwards.

use serde_json::{Value, json};

use crate::error::{FieldError, GatewayError};
use crate::logging::redact;
use crate::schema::{ArgSchema, FieldSpec};
use crate::state::AppState;

pub const API_REFERENCE_URI: &str = "lanonasis://docs/api-reference";
pub const CURRENT_CONFIG_URI: &str = "lanonasis://config/current";

#[derive(Debug, Clone)]
pub struct PromptDescriptor {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub schema: ArgSchema,
}

#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub mime_type: &'static str,
}

pub fn prompt_catalog() -> Vec<PromptDescriptor> {
    vec![
        PromptDescriptor {
            name: "memory-workflow",
            title: "Memory workflow",
            description: "How to capture, organize, and retrieve memories effectively.",
            schema: ArgSchema::new(vec![FieldSpec::string(
                "topic",
                "Optional topic to focus the workflow on",
            )
            .max_len(200)]),
        },
        PromptDescriptor {
            name: "api-key-management",
            title: "API key management",
            description: "Safe handling of API keys: creation, rotation, revocation.",
            schema: ArgSchema::none(),
        },
        PromptDescriptor {
            name: "intelligence-guide",
            title: "Intelligence guide",
            description: "Using the analytics tools to keep a memory store healthy.",
            schema: ArgSchema::none(),
        },
    ]
}

pub fn resource_catalog() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor {
            uri: API_REFERENCE_URI,
            name: "api-reference",
            title: "Gateway API reference",
            mime_type: "text/markdown",
        },
        ResourceDescriptor {
            uri: CURRENT_CONFIG_URI,
            name: "current-config",
            title: "Current gateway configuration",
            mime_type: "application/json",
        },
    ]
}

/// Render a prompt into role-tagged messages.
pub fn render_prompt(name: &str, args: &Value) -> Result<Vec<Value>, GatewayError> {
    let message = |role: &str, text: String| {
        json!({ "role": role, "content": { "type": "text", "text": text } })
    };

    match name {
        "memory-workflow" => {
            let topic = args
                .get("topic")
                .and_then(|v| v.as_str())
                .unwrap_or("your current work");
            Ok(vec![message(
                "user",
                format!(
                    "Help me manage memories about {topic}.\n\n\
                     1. Use search_memories before creating — avoid duplicates.\n\
                     2. Pick the right memory_type: context for ambient facts, project for \
                     deliverable-bound notes, knowledge for durable reference.\n\
                     3. Tag consistently; intelligence_suggest_tags can propose tags.\n\
                     4. For long content use create_memory_chunked so each part stays \
                     searchable.\n\
                     5. Review with memory_stats and intelligence_detect_duplicates \
                     periodically."
                ),
            )])
        }
        "api-key-management" => Ok(vec![message(
            "user",
            "Walk me through API key hygiene on this platform:\n\n\
             - list_api_keys shows what exists; secrets are never echoed back.\n\
             - create_api_key with the narrowest access_level that works and an expiry.\n\
             - rotate_api_key on schedule or after any suspected exposure.\n\
             - revoke_api_key keeps the audit trail; delete_api_key removes the record.\n\
             Never paste key material into memory content."
                .to_string(),
        )]),
        "intelligence-guide" => Ok(vec![message(
            "user",
            "Show me how to analyze this memory store:\n\n\
             - intelligence_health_check verifies the analytics domain is up.\n\
             - intelligence_suggest_tags and intelligence_find_related enrich entries.\n\
             - intelligence_detect_duplicates finds candidates for memory_bulk_delete.\n\
             - intelligence_extract_insights and intelligence_analyze_patterns summarize \
             trends; memory_stats gives the raw counts."
                .to_string(),
        )]),
        other => Err(GatewayError::validation(
            format!("unknown prompt: {other}"),
            vec![FieldError::new("name", format!("no prompt named '{other}'"))],
        )),
    }
}

/// Produce the content for a resource URI.
pub fn read_resource(state: &AppState, uri: &str) -> Result<(String, &'static str), GatewayError> {
    match uri {
        API_REFERENCE_URI => Ok((API_REFERENCE.to_string(), "text/markdown")),
        CURRENT_CONFIG_URI => {
            let config = &state.config;
            let doc = json!({
                "mode": match config.mode {
                    crate::config::GatewayMode::Stdio => "stdio",
                    crate::config::GatewayMode::Http => "http",
                },
                "port": config.port,
                "apiBaseUrl": config.api_base_url.as_str(),
                "functionsBaseUrl": config.functions_base_url.as_str(),
                "authBaseUrl": config.auth_base_url.as_str(),
                "resourceUrl": config.resource_url,
                "serverUrl": config.server_url,
                "requestTimeoutMs": config.request_timeout_ms,
                "maxRetries": config.max_retries,
                "retryBaseDelayMs": config.retry_base_delay_ms,
                "warmupIntervalMs": config.warmup_interval_ms,
                "apiKey": config.api_key.as_deref().map(redact),
                "bearerToken": config.bearer_token.as_deref().map(|_| "***"),
            });
            let text = serde_json::to_string_pretty(&doc)
                .map_err(|e| GatewayError::internal(format!("config serialization: {e}")))?;
            Ok((text, "application/json"))
        }
        other => Err(GatewayError::validation(
            format!("unknown resource: {other}"),
            vec![FieldError::new("uri", format!("no resource at '{other}'"))],
        )),
    }
}

const API_REFERENCE: &str = r#"# Lanonasis MCP Gateway

Tool server fronting the Lanonasis memory platform over the Model Context
Protocol.

## Transports

- `POST /mcp` — one JSON-RPC envelope per request.
- `GET /sse` + `POST /sse?sessionId=…` — streaming session.
- stdio — launch with `MCP_MODE=stdio`.

## Tool families

| Family | Tools |
|---|---|
| Memory | list_memories, create_memory, create_memory_chunked, get_memory, update_memory, delete_memory, search_memories, search_lanonasis_docs |
| API keys | list_api_keys, create_api_key, delete_api_key, rotate_api_key, revoke_api_key |
| Projects | list_projects, create_project |
| Organization | get_organization_info |
| System | get_health_status, get_auth_status, get_config, set_config |
| Intelligence | intelligence_health_check, intelligence_suggest_tags, intelligence_find_related, intelligence_detect_duplicates, intelligence_extract_insights, intelligence_analyze_patterns |
| Utilities | memory_stats, memory_bulk_delete |

Every tool advertises a strict JSON schema; unknown fields are rejected with
`VALIDATION_ERROR` and per-field details. Errors carry `{code, message,
requestId, retryable}`.

## Operational endpoints

`/health`, `/health/full`, `/metrics` (Prometheus), `/health/metrics` (JSON),
`/admin/cache/clear`, `/admin/circuit-breaker/reset`, and the discovery
documents under `/.well-known/`.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_prompts_two_resources() {
        assert_eq!(prompt_catalog().len(), 3);
        assert_eq!(resource_catalog().len(), 2);
    }

    #[test]
    fn prompts_render_role_tagged_messages() {
        for prompt in prompt_catalog() {
            let messages = render_prompt(prompt.name, &json!({})).expect(prompt.name);
            assert!(!messages.is_empty());
            for message in &messages {
                assert!(message["role"].is_string());
                assert_eq!(message["content"]["type"], "text");
            }
        }
    }

    #[test]
    fn memory_workflow_interpolates_topic() {
        let messages =
            render_prompt("memory-workflow", &json!({"topic": "release planning"})).expect("render");
        assert!(
            messages[0]["content"]["text"]
                .as_str()
                .unwrap()
                .contains("release planning")
        );
    }

    #[test]
    fn unknown_prompt_is_a_validation_error() {
        let err = render_prompt("nope", &json!({})).expect_err("unknown");
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn config_resource_redacts_secrets() {
        let state = crate::state::AppState::new_test();
        let (text, mime) = read_resource(&state, CURRENT_CONFIG_URI).expect("config resource");
        assert_eq!(mime, "application/json");
        assert!(text.contains("apiBaseUrl"));
        assert!(!text.to_lowercase().contains("secret"));
    }

    #[test]
    fn api_reference_lists_every_tool_family() {
        let state = crate::state::AppState::new_test();
        let (text, _) = read_resource(&state, API_REFERENCE_URI).expect("reference");
        for name in ["create_memory_chunked", "rotate_api_key", "memory_stats"] {
            assert!(text.contains(name), "missing {name}");
        }
    }
}
