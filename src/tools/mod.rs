//! The MCP tool catalog and dispatcher.
//!
//! The registry is the authoritative catalog of tools, prompts, and
//! resources. It is built once at startup and read-only afterwards; the
//! dispatcher validates arguments against the declared schemas, runs
//! sanitization, then routes to the per-family handler modules.

pub mod admin_tools;
pub mod intelligence_tools;
pub mod memory_tools;
pub mod prompts;
pub mod system_tools;

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{FieldError, GatewayError};
use crate::sanitize::sanitize_payload;
use crate::schema::{
    ArgSchema, DOC_SECTIONS, FieldSpec, MEMORY_TYPES, SORT_FIELDS, SORT_ORDERS,
};
use crate::state::{AppState, RequestContext};

pub use prompts::{PromptDescriptor, ResourceDescriptor};

// ── Behavior annotations ────────────────────────────────────────────────

/// Client-visible intent hints, advertised per tool.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolAnnotations {
    pub read_only: bool,
    pub destructive: bool,
    pub idempotent: bool,
    pub open_world: bool,
}

impl ToolAnnotations {
    /// No side effects; repeat calls are free.
    pub const READ: Self = Self {
        read_only: true,
        destructive: false,
        idempotent: true,
        open_world: false,
    };
    /// Creates or mutates upstream state; repeats are not interchangeable.
    pub const WRITE: Self = Self {
        read_only: false,
        destructive: false,
        idempotent: false,
        open_world: false,
    };
    /// Mutates upstream state; the same call twice lands the same state.
    pub const WRITE_IDEMPOTENT: Self = Self {
        read_only: false,
        destructive: false,
        idempotent: true,
        open_world: false,
    };
    /// Data loss possible.
    pub const DESTRUCTIVE: Self = Self {
        read_only: false,
        destructive: true,
        idempotent: true,
        open_world: false,
    };

    pub const fn open_world(mut self) -> Self {
        self.open_world = true;
        self
    }

    /// MCP annotation object (hint-suffixed keys per the protocol).
    pub fn to_mcp(self) -> Value {
        json!({
            "readOnlyHint": self.read_only,
            "destructiveHint": self.destructive,
            "idempotentHint": self.idempotent,
            "openWorldHint": self.open_world,
        })
    }
}

// ── Descriptors ─────────────────────────────────────────────────────────

/// Immutable catalog entry for one tool. Built at startup, never mutated.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub annotations: ToolAnnotations,
    pub schema: ArgSchema,
}

#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
    prompts: Vec<PromptDescriptor>,
    resources: Vec<ResourceDescriptor>,
}

impl ToolRegistry {
    /// Assemble the full catalog. Panics on duplicate names — a startup
    /// invariant, checked once.
    pub fn build() -> Self {
        let tools = catalog();
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            assert!(
                index.insert(tool.name, i).is_none(),
                "duplicate tool name: {}",
                tool.name
            );
        }
        Self {
            tools,
            index,
            prompts: prompts::prompt_catalog(),
            resources: prompts::resource_catalog(),
        }
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn prompts(&self) -> &[PromptDescriptor] {
        &self.prompts
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// The `tools/list` payload entries.
    pub fn list_tools(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "title": t.title,
                    "description": t.description,
                    "inputSchema": t.schema.to_json_schema(),
                    "annotations": t.annotations.to_mcp(),
                })
            })
            .collect()
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────

/// Route one validated tool call. Exactly one acknowledgement (the returned
/// `Ok` payload or normalized error) is produced per invocation.
pub async fn dispatch(
    state: &AppState,
    name: &str,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    let Some(descriptor) = state.registry.tool(name) else {
        return Err(GatewayError::validation(
            format!("unknown tool: {name}"),
            vec![FieldError::new("name", format!("no tool named '{name}'"))],
        ));
    };

    if let Err(details) = descriptor.schema.validate(args) {
        return Err(GatewayError::validation("invalid arguments", details));
    }

    let clean = sanitize_payload(args, &ctx.request_id)?;

    state.metrics.record_tool_call(name);
    let started = Instant::now();
    let result = route(state, name, &clean, ctx).await;
    state.metrics.record_duration(started.elapsed());

    match &result {
        Ok(_) => {
            tracing::info!(
                component = "dispatcher",
                event = "tool_call",
                request_id = %ctx.request_id,
                tool = name,
                duration_ms = started.elapsed().as_millis() as u64,
                "ok"
            );
        }
        Err(err) => {
            state.metrics.record_tool_error(name);
            tracing::debug!(
                component = "dispatcher",
                event = "tool_call",
                request_id = %ctx.request_id,
                tool = name,
                error = err.code(),
                "failed"
            );
        }
    }
    result
}

async fn route(
    state: &AppState,
    name: &str,
    args: &Value,
    ctx: &RequestContext,
) -> Result<Value, GatewayError> {
    match name {
        // Memory
        "list_memories" => memory_tools::list_memories(state, args, ctx).await,
        "create_memory" => memory_tools::create_memory(state, args, ctx).await,
        "create_memory_chunked" => memory_tools::create_memory_chunked(state, args, ctx).await,
        "get_memory" => memory_tools::get_memory(state, args, ctx).await,
        "update_memory" => memory_tools::update_memory(state, args, ctx).await,
        "delete_memory" => memory_tools::delete_memory(state, args, ctx).await,
        "search_memories" => memory_tools::search_memories(state, args, ctx).await,
        "search_lanonasis_docs" => memory_tools::search_docs(state, args, ctx).await,
        // API keys, projects, organization
        "list_api_keys" => admin_tools::list_api_keys(state, ctx).await,
        "create_api_key" => admin_tools::create_api_key(state, args, ctx).await,
        "delete_api_key" => admin_tools::delete_api_key(state, args, ctx).await,
        "rotate_api_key" => admin_tools::rotate_api_key(state, args, ctx).await,
        "revoke_api_key" => admin_tools::revoke_api_key(state, args, ctx).await,
        "list_projects" => admin_tools::list_projects(state, ctx).await,
        "create_project" => admin_tools::create_project(state, args, ctx).await,
        "get_organization_info" => admin_tools::get_organization_info(state, ctx).await,
        // System
        "get_health_status" => system_tools::get_health_status(state, ctx).await,
        "get_auth_status" => system_tools::get_auth_status(state, ctx).await,
        "get_config" => system_tools::get_config(state, args, ctx).await,
        "set_config" => system_tools::set_config(state, args, ctx).await,
        // Intelligence & memory utilities
        "intelligence_health_check" => intelligence_tools::health_check(state, ctx).await,
        "intelligence_suggest_tags" => intelligence_tools::suggest_tags(state, args, ctx).await,
        "intelligence_find_related" => intelligence_tools::find_related(state, args, ctx).await,
        "intelligence_detect_duplicates" => {
            intelligence_tools::detect_duplicates(state, args, ctx).await
        }
        "intelligence_extract_insights" => {
            intelligence_tools::extract_insights(state, args, ctx).await
        }
        "intelligence_analyze_patterns" => {
            intelligence_tools::analyze_patterns(state, args, ctx).await
        }
        "memory_stats" => intelligence_tools::memory_stats(state, args, ctx).await,
        "memory_bulk_delete" => intelligence_tools::memory_bulk_delete(state, args, ctx).await,
        // The registry lookup above makes this unreachable for catalog
        // tools; keep a normalized error rather than a panic.
        other => Err(GatewayError::internal(format!(
            "tool '{other}' is registered but has no handler"
        ))),
    }
}

// ── Catalog ─────────────────────────────────────────────────────────────

fn memory_payload_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("title", "Memory title").required().max_len(500),
        FieldSpec::string("content", "Memory content").required(),
        FieldSpec::enumeration("memory_type", "Memory classification", MEMORY_TYPES),
        FieldSpec::string_array("tags", "Tags for organization and filtering").max_items(50),
        FieldSpec::object("metadata", "Opaque metadata attached to the record"),
    ]
}

fn catalog() -> Vec<ToolDescriptor> {
    vec![
        // ── Memory ──────────────────────────────────────────────────────
        ToolDescriptor {
            name: "list_memories",
            title: "List memories",
            description: "List memory entries with pagination, type and tag filters, and sorting.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::integer("limit", "Maximum entries to return (1-100, default 20)")
                    .min(1)
                    .max(100),
                FieldSpec::integer("offset", "Entries to skip for pagination").min(0),
                FieldSpec::enumeration("memory_type", "Filter by memory type", MEMORY_TYPES),
                FieldSpec::string_array("tags", "Only entries carrying all of these tags")
                    .max_items(20),
                FieldSpec::enumeration("sort_by", "Sort field", SORT_FIELDS),
                FieldSpec::enumeration("sort_order", "Sort direction", SORT_ORDERS),
            ]),
        },
        ToolDescriptor {
            name: "create_memory",
            title: "Create memory",
            description: "Create a single memory entry.",
            annotations: ToolAnnotations::WRITE,
            schema: ArgSchema::new(memory_payload_fields()),
        },
        ToolDescriptor {
            name: "create_memory_chunked",
            title: "Create memory (chunked)",
            description: "Create one or more memory entries from oversized content, split along \
                          semantic boundaries with overlap. Small content passes through as a \
                          single create.",
            annotations: ToolAnnotations::WRITE,
            schema: ArgSchema::new({
                let mut fields = memory_payload_fields();
                fields.extend([
                    FieldSpec::integer("max_chunk_size", "Largest chunk size in bytes")
                        .min(1_000)
                        .max(50_000),
                    FieldSpec::integer("overlap_size", "Context overlap between chunks in bytes")
                        .min(0)
                        .max(2_000),
                    FieldSpec::integer("min_chunk_size", "Smallest non-final chunk in bytes")
                        .min(100)
                        .max(10_000),
                ]);
                fields
            }),
        },
        ToolDescriptor {
            name: "get_memory",
            title: "Get memory",
            description: "Fetch a single memory entry by id.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::string("id", "Memory id").required().max_len(100),
            ]),
        },
        ToolDescriptor {
            name: "update_memory",
            title: "Update memory",
            description: "Update fields of an existing memory entry. Repeating the same update \
                          lands the same stored state.",
            annotations: ToolAnnotations::WRITE_IDEMPOTENT,
            schema: ArgSchema::new(vec![
                FieldSpec::string("id", "Memory id").required().max_len(100),
                FieldSpec::string("title", "Replacement title").max_len(500),
                FieldSpec::string("content", "Replacement content"),
                FieldSpec::enumeration("memory_type", "Replacement type", MEMORY_TYPES),
                FieldSpec::string_array("tags", "Replacement tag set").max_items(50),
                FieldSpec::object("metadata", "Replacement metadata"),
            ]),
        },
        ToolDescriptor {
            name: "delete_memory",
            title: "Delete memory",
            description: "Permanently delete a memory entry.",
            annotations: ToolAnnotations::DESTRUCTIVE,
            schema: ArgSchema::new(vec![
                FieldSpec::string("id", "Memory id").required().max_len(100),
            ]),
        },
        ToolDescriptor {
            name: "search_memories",
            title: "Search memories",
            description: "Semantic search across memory entries.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::string("query", "Search query").required().min_len(1).max_len(1_000),
                FieldSpec::string_array("memory_types", "Restrict to these memory types")
                    .max_items(6),
                FieldSpec::string_array("tags", "Restrict to entries with these tags")
                    .max_items(20),
                FieldSpec::integer("limit", "Maximum results (1-100)").min(1).max(100),
            ]),
        },
        ToolDescriptor {
            name: "search_lanonasis_docs",
            title: "Search Lanonasis docs",
            description: "Search the Lanonasis platform documentation.",
            annotations: ToolAnnotations::READ.open_world(),
            schema: ArgSchema::new(vec![
                FieldSpec::string("query", "Search query").required().min_len(1).max_len(500),
                FieldSpec::enumeration("section", "Documentation section", DOC_SECTIONS),
                FieldSpec::integer("limit", "Maximum results (1-50)").min(1).max(50),
            ]),
        },
        // ── API keys ────────────────────────────────────────────────────
        ToolDescriptor {
            name: "list_api_keys",
            title: "List API keys",
            description: "List API keys for the current organization (secrets are not returned).",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::none(),
        },
        ToolDescriptor {
            name: "create_api_key",
            title: "Create API key",
            description: "Create a new API key with a name and access level.",
            annotations: ToolAnnotations::WRITE,
            schema: ArgSchema::new(vec![
                FieldSpec::string("name", "Human-readable key name")
                    .required()
                    .min_len(1)
                    .max_len(200),
                FieldSpec::enumeration(
                    "access_level",
                    "Access level granted to the key",
                    crate::schema::ACCESS_LEVELS,
                ),
                FieldSpec::string("project_id", "Project to scope the key to").max_len(100),
                FieldSpec::integer("expires_in_days", "Days until expiry (1-365)")
                    .min(1)
                    .max(365),
                FieldSpec::enumeration(
                    "risk_level",
                    "Informational risk classification for auditors",
                    crate::schema::RISK_LEVELS,
                ),
            ]),
        },
        ToolDescriptor {
            name: "delete_api_key",
            title: "Delete API key",
            description: "Permanently delete an API key.",
            annotations: ToolAnnotations::DESTRUCTIVE,
            schema: ArgSchema::new(vec![
                FieldSpec::string("key_id", "API key id").required().max_len(100),
            ]),
        },
        ToolDescriptor {
            name: "rotate_api_key",
            title: "Rotate API key",
            description: "Rotate an API key's secret. The old secret stops working.",
            annotations: ToolAnnotations::WRITE,
            schema: ArgSchema::new(vec![
                FieldSpec::string("key_id", "API key id").required().max_len(100),
            ]),
        },
        ToolDescriptor {
            name: "revoke_api_key",
            title: "Revoke API key",
            description: "Revoke an API key without deleting its audit trail.",
            annotations: ToolAnnotations::DESTRUCTIVE,
            schema: ArgSchema::new(vec![
                FieldSpec::string("key_id", "API key id").required().max_len(100),
            ]),
        },
        // ── Projects & organization ─────────────────────────────────────
        ToolDescriptor {
            name: "list_projects",
            title: "List projects",
            description: "List projects in the current organization.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::none(),
        },
        ToolDescriptor {
            name: "create_project",
            title: "Create project",
            description: "Create a new project.",
            annotations: ToolAnnotations::WRITE,
            schema: ArgSchema::new(vec![
                FieldSpec::string("name", "Project name").required().min_len(1).max_len(200),
                FieldSpec::string("description", "Project description").max_len(2_000),
            ]),
        },
        ToolDescriptor {
            name: "get_organization_info",
            title: "Get organization info",
            description: "Fetch the current organization's profile and plan.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::none(),
        },
        // ── System ──────────────────────────────────────────────────────
        ToolDescriptor {
            name: "get_health_status",
            title: "Get health status",
            description: "Composite health of the gateway and both upstream services.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::none(),
        },
        ToolDescriptor {
            name: "get_auth_status",
            title: "Get auth status",
            description: "Check whether the configured upstream credentials are accepted.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::none(),
        },
        ToolDescriptor {
            name: "get_config",
            title: "Get config",
            description: "Read a configuration value from the platform.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::string("key", "Configuration key").required().max_len(200),
            ]),
        },
        ToolDescriptor {
            name: "set_config",
            title: "Set config",
            description: "Write a configuration value to the platform.",
            annotations: ToolAnnotations::WRITE_IDEMPOTENT,
            schema: ArgSchema::new(vec![
                FieldSpec::string("key", "Configuration key").required().max_len(200),
                FieldSpec::string("value", "Configuration value").required().max_len(10_000),
            ]),
        },
        // ── Intelligence ────────────────────────────────────────────────
        ToolDescriptor {
            name: "intelligence_health_check",
            title: "Intelligence health check",
            description: "Liveness of the analytics functions domain.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::none(),
        },
        ToolDescriptor {
            name: "intelligence_suggest_tags",
            title: "Suggest tags",
            description: "Suggest tags for a piece of content based on existing memories.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::string("content", "Content to tag").required().min_len(1),
                FieldSpec::integer("max_suggestions", "Maximum suggestions (1-20)")
                    .min(1)
                    .max(20),
            ]),
        },
        ToolDescriptor {
            name: "intelligence_find_related",
            title: "Find related memories",
            description: "Find memories related to a given entry or text.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::string("memory_id", "Anchor memory id").max_len(100),
                FieldSpec::string("content", "Anchor text when no memory id is given"),
                FieldSpec::integer("limit", "Maximum results (1-50)").min(1).max(50),
            ]),
        },
        ToolDescriptor {
            name: "intelligence_detect_duplicates",
            title: "Detect duplicates",
            description: "Detect likely duplicate memory entries.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::enumeration("memory_type", "Restrict to one memory type", MEMORY_TYPES),
                FieldSpec::integer("limit", "Maximum pairs to report (1-100)").min(1).max(100),
            ]),
        },
        ToolDescriptor {
            name: "intelligence_extract_insights",
            title: "Extract insights",
            description: "Extract key insights from a set of memories.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::string_array("memory_ids", "Memories to analyze").max_items(100),
                FieldSpec::enumeration("memory_type", "Or analyze a whole type", MEMORY_TYPES),
            ]),
        },
        ToolDescriptor {
            name: "intelligence_analyze_patterns",
            title: "Analyze patterns",
            description: "Analyze usage and content patterns across the memory store.",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::string("timeframe", "Analysis window, e.g. '30d'").max_len(20),
                FieldSpec::enumeration("memory_type", "Restrict to one memory type", MEMORY_TYPES),
            ]),
        },
        // ── Memory utilities ────────────────────────────────────────────
        ToolDescriptor {
            name: "memory_stats",
            title: "Memory statistics",
            description: "Aggregate statistics of the memory store (cached briefly).",
            annotations: ToolAnnotations::READ,
            schema: ArgSchema::new(vec![
                FieldSpec::enumeration("memory_type", "Restrict to one memory type", MEMORY_TYPES),
            ]),
        },
        ToolDescriptor {
            name: "memory_bulk_delete",
            title: "Bulk delete memories",
            description: "Delete many memory entries in one operation.",
            annotations: ToolAnnotations::DESTRUCTIVE,
            schema: ArgSchema::new(vec![
                FieldSpec::string_array("memory_ids", "Ids to delete")
                    .required()
                    .max_items(500),
                FieldSpec::boolean("confirm", "Must be true to proceed").required(),
            ]),
        },
    ]
}
