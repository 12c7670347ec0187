//! Discovery surface: landing page, MCP capability cards, and the OAuth
//! well-known documents (RFC 8414 / RFC 9728). Everything here is public,
//! unauthenticated, stable JSON — external AI clients use these documents
//! to self-configure.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use crate::mcp::MCP_PROTOCOL_VERSION;
use crate::metrics::{SERVER_NAME, SERVER_VERSION};
use crate::state::{AppState, RequestContext};

const OAUTH_SCOPES: &[&str] = &[
    "memory:read",
    "memory:write",
    "api-keys:manage",
    "projects:read",
    "organization:read",
];

/// `GET /` — landing summary with the endpoint catalog.
pub async fn landing(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "description": "Enterprise MCP gateway for the Lanonasis memory platform",
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "endpoints": {
            "mcp": "/mcp",
            "sse": "/sse",
            "health": "/health",
            "healthFull": "/health/full",
            "metrics": "/metrics",
            "serverInfo": "/server-info",
            "mcpCard": "/.well-known/mcp.json",
            "mcpConfig": "/.well-known/mcp-config",
            "oauthProtectedResource": "/.well-known/oauth-protected-resource",
            "oauthAuthorizationServer": "/.well-known/oauth-authorization-server",
            "register": "/register",
            "swagger": "/swagger-ui",
        },
        "serverUrl": state.config.server_url,
    }))
}

/// `GET /server-info` and `GET /.well-known/mcp.json` — the capability card.
pub async fn server_card(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "description": "Memory management, analytics, and administrative tools over MCP",
        "capabilities": {
            "tools": { "count": state.registry.tool_count() },
            "prompts": { "count": state.registry.prompt_count() },
            "resources": { "count": state.registry.resource_count() },
        },
        "endpoints": {
            "http": format!("{}/mcp", config.server_url),
            "sse": format!("{}/sse", config.server_url),
        },
        "authentication": {
            "type": "oauth2",
            "authorizationServer": config.auth_base_url.as_str(),
            "resource": config.resource_url,
            "scopes": OAUTH_SCOPES,
        },
    }))
}

/// `GET /.well-known/mcp-config` — Smithery-style server card.
pub async fn mcp_config(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "mcpServers": {
            "lanonasis": {
                "type": "http",
                "url": format!("{}/mcp", config.server_url),
            },
            "lanonasis-sse": {
                "type": "sse",
                "url": format!("{}/sse", config.server_url),
            },
        },
        "configSchema": {
            "type": "object",
            "properties": {
                "apiKey": {
                    "type": "string",
                    "description": "Lanonasis API key forwarded to the platform",
                },
            },
            "required": [],
        },
    }))
}

/// `GET /.well-known/oauth-protected-resource` — RFC 9728 metadata.
pub async fn oauth_protected_resource(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "resource": config.resource_url,
        "authorization_servers": [config.auth_base_url.as_str()],
        "bearer_methods_supported": ["header"],
        "scopes_supported": OAUTH_SCOPES,
        "resource_name": SERVER_NAME,
        "resource_documentation": format!("{}/server-info", config.server_url),
    }))
}

/// `GET /.well-known/oauth-authorization-server` — RFC 8414 metadata for
/// the configured authorization server.
pub async fn oauth_authorization_server(State(state): State<AppState>) -> Json<Value> {
    let auth = state.config.auth_base_url.as_str().trim_end_matches('/');
    Json(json!({
        "issuer": state.config.auth_base_url.as_str(),
        "authorization_endpoint": format!("{auth}/oauth/authorize"),
        "token_endpoint": format!("{auth}/oauth/token"),
        "registration_endpoint": format!("{auth}/oauth/register"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["client_secret_basic", "none"],
        "scopes_supported": OAUTH_SCOPES,
    }))
}

/// `POST /register` — dynamic client registration pass-through. The auth
/// server's status and body come back verbatim.
pub async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let auth = state.config.auth_base_url.as_str().trim_end_matches('/');
    let url = format!("{auth}/oauth/register");

    match state.upstream.proxy_post(&url, &body, &ctx).await {
        Ok((status, response)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(response),
        ),
        Err(err) => {
            err.log(&ctx.request_id);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "registration pass-through failed",
                    "requestId": ctx.request_id,
                })),
            )
        }
    }
}
