use serde_json::{Value, json};

use lanonasis_mcp_gateway::mcp::handle_envelope;
use lanonasis_mcp_gateway::state::{AppState, RequestContext};

const EXPECTED_TOOLS: &[&str] = &[
    // Memory
    "list_memories",
    "create_memory",
    "create_memory_chunked",
    "get_memory",
    "update_memory",
    "delete_memory",
    "search_memories",
    "search_lanonasis_docs",
    // API keys
    "list_api_keys",
    "create_api_key",
    "delete_api_key",
    "rotate_api_key",
    "revoke_api_key",
    // Projects & organization
    "list_projects",
    "create_project",
    "get_organization_info",
    // System
    "get_health_status",
    "get_auth_status",
    "get_config",
    "set_config",
    // Intelligence
    "intelligence_health_check",
    "intelligence_suggest_tags",
    "intelligence_find_related",
    "intelligence_detect_duplicates",
    "intelligence_extract_insights",
    "intelligence_analyze_patterns",
    // Memory utilities
    "memory_stats",
    "memory_bulk_delete",
];

fn ctx() -> RequestContext {
    RequestContext::new("tool-test")
}

async fn call(state: &AppState, method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
    handle_envelope(state, &ctx(), &request)
        .await
        .expect("response envelope")
}

#[tokio::test]
async fn the_catalog_is_exactly_the_advertised_surface() {
    let state = AppState::new_test();
    let response = call(&state, "tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().expect("tools");

    let mut names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    let mut expected: Vec<&str> = EXPECTED_TOOLS.to_vec();
    names.sort_unstable();
    expected.sort_unstable();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn every_tool_advertises_schema_docs_and_annotations() {
    let state = AppState::new_test();
    let response = call(&state, "tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().expect("tools");

    for tool in tools {
        let name = tool["name"].as_str().unwrap();
        assert!(
            !tool["description"].as_str().unwrap().is_empty(),
            "{name} has no description"
        );
        assert!(!tool["title"].as_str().unwrap().is_empty());
        assert_eq!(tool["inputSchema"]["type"], "object", "{name}");
        // Strict schemas: unknown fields are rejected.
        assert_eq!(tool["inputSchema"]["additionalProperties"], false, "{name}");
        for hint in [
            "readOnlyHint",
            "destructiveHint",
            "idempotentHint",
            "openWorldHint",
        ] {
            assert!(tool["annotations"][hint].is_boolean(), "{name} missing {hint}");
        }
    }
}

#[tokio::test]
async fn annotation_groups_match_tool_intent() {
    let state = AppState::new_test();
    let response = call(&state, "tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().expect("tools");
    let annotation = |name: &str| {
        tools
            .iter()
            .find(|t| t["name"] == name)
            .unwrap_or_else(|| panic!("{name} missing"))["annotations"]
            .clone()
    };

    for read_only in ["list_memories", "search_memories", "get_health_status"] {
        assert_eq!(annotation(read_only)["readOnlyHint"], true, "{read_only}");
    }
    for destructive in ["delete_memory", "delete_api_key", "memory_bulk_delete"] {
        assert_eq!(
            annotation(destructive)["destructiveHint"],
            true,
            "{destructive}"
        );
    }
    assert_eq!(annotation("update_memory")["idempotentHint"], true);
    assert_eq!(annotation("create_memory")["idempotentHint"], false);
    assert_eq!(annotation("search_lanonasis_docs")["openWorldHint"], true);
}

#[tokio::test]
async fn enum_fields_advertise_their_closed_sets() {
    let state = AppState::new_test();
    let response = call(&state, "tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().expect("tools");
    let list = tools
        .iter()
        .find(|t| t["name"] == "list_memories")
        .expect("list_memories");

    let schema = &list["inputSchema"]["properties"];
    assert_eq!(
        schema["memory_type"]["enum"],
        json!(["context", "project", "knowledge", "reference", "personal", "workflow"])
    );
    assert_eq!(
        schema["sort_by"]["enum"],
        json!(["created_at", "updated_at", "title"])
    );
    assert_eq!(schema["sort_order"]["enum"], json!(["asc", "desc"]));
    assert_eq!(schema["limit"]["maximum"], 100);
}

#[tokio::test]
async fn unknown_tool_is_rejected_before_any_upstream_work() {
    let state = AppState::new_test();
    let response = call(
        &state,
        "tools/call",
        json!({"name": "not_a_tool", "arguments": {}}),
    )
    .await;
    assert_eq!(response["result"]["isError"], true);
    let payload: Value =
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(state.breakers.get("api").snapshot().total_failures, 0);
}

#[tokio::test]
async fn bulk_delete_requires_explicit_confirmation() {
    let state = AppState::new_test();
    let response = call(
        &state,
        "tools/call",
        json!({
            "name": "memory_bulk_delete",
            "arguments": { "memory_ids": ["a", "b"], "confirm": false },
        }),
    )
    .await;
    let payload: Value =
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(payload["error"]["details"][0]["field"], "confirm");
    // Rejected before the functions domain was touched.
    assert_eq!(
        state.breakers.get("edgeFunctions").snapshot().total_failures,
        0
    );
}

#[tokio::test]
async fn find_related_needs_an_anchor() {
    let state = AppState::new_test();
    let response = call(
        &state,
        "tools/call",
        json!({"name": "intelligence_find_related", "arguments": {}}),
    )
    .await;
    let payload: Value =
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn prompts_list_names_all_three() {
    let state = AppState::new_test();
    let response = call(&state, "prompts/list", json!({})).await;
    let prompts = response["result"]["prompts"].as_array().expect("prompts");
    let names: Vec<&str> = prompts.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["memory-workflow", "api-key-management", "intelligence-guide"]
    );
}

#[tokio::test]
async fn resources_list_names_both_documents() {
    let state = AppState::new_test();
    let response = call(&state, "resources/list", json!({})).await;
    let resources = response["result"]["resources"].as_array().expect("resources");
    let uris: Vec<&str> = resources.iter().map(|r| r["uri"].as_str().unwrap()).collect();
    assert_eq!(
        uris,
        vec!["lanonasis://docs/api-reference", "lanonasis://config/current"]
    );
}

#[tokio::test]
async fn config_resource_renders_without_secrets() {
    let state = AppState::new_test();
    let response = call(
        &state,
        "resources/read",
        json!({"uri": "lanonasis://config/current"}),
    )
    .await;
    let contents = &response["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "application/json");
    let config: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(config["maxRetries"], 0);
    assert!(config["apiKey"].is_null());
}

#[tokio::test]
async fn chunked_create_passes_small_content_through() {
    // Upstream is unreachable in tests, so the single forwarded create
    // fails — but it must fail as an upstream error, not a chunking one,
    // proving the pass-through path was taken.
    let state = AppState::new_test();
    let response = call(
        &state,
        "tools/call",
        json!({
            "name": "create_memory_chunked",
            "arguments": { "title": "Small", "content": "tiny note" },
        }),
    )
    .await;
    let payload: Value =
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn chunked_create_reports_per_chunk_failures() {
    // 25k of sentence-shaped content with S4's parameters splits into 4
    // chunks; every upstream create fails here, so the summary reports
    // 4 attempts and 4 errors.
    let state = AppState::new_test();
    let sentence = "The quick brown fox jumps over the lazy dog. ";
    let content = sentence.repeat(25_000 / sentence.len() + 1);
    let content = &content[..25_000];

    let response = call(
        &state,
        "tools/call",
        json!({
            "name": "create_memory_chunked",
            "arguments": {
                "title": "Big import",
                "content": content,
                "max_chunk_size": 8_000,
                "overlap_size": 200,
                "min_chunk_size": 500,
            },
        }),
    )
    .await;
    assert_eq!(response["result"]["isError"], false);

    let summary: Value =
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(summary["chunked"], true);
    assert_eq!(summary["totalChunks"], 4);
    assert_eq!(summary["successful"], 0);
    assert_eq!(summary["failed"], 4);
    assert_eq!(summary["originalLength"], 25_000);
    assert_eq!(summary["errors"].as_array().unwrap().len(), 4);
}
