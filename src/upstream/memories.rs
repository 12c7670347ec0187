//! Memory and documentation operations on the primary REST API.

use reqwest::Method;
use serde_json::Value;

use super::{Upstream, UpstreamClient};
use crate::error::GatewayError;
use crate::state::RequestContext;

const MEMORY_PATH: &str = "/api/v1/memory";

impl UpstreamClient {
    pub async fn list_memories(
        &self,
        args: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        for key in ["limit", "offset"] {
            if let Some(n) = args.get(key).and_then(|v| v.as_i64()) {
                query.push((key, n.to_string()));
            }
        }
        for key in ["memory_type", "sort_by", "sort_order"] {
            if let Some(s) = args.get(key).and_then(|v| v.as_str()) {
                query.push((key, s.to_string()));
            }
        }
        if let Some(tags) = args.get("tags").and_then(|v| v.as_array()) {
            let joined = tags
                .iter()
                .filter_map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(",");
            if !joined.is_empty() {
                query.push(("tags", joined));
            }
        }
        self.request(Upstream::Api, Method::GET, MEMORY_PATH, &query, None, ctx)
            .await
    }

    pub async fn create_memory(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::POST,
            MEMORY_PATH,
            &[],
            Some(payload),
            ctx,
        )
        .await
    }

    pub async fn get_memory(&self, id: &str, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::GET,
            &format!("{MEMORY_PATH}/{id}"),
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn update_memory(
        &self,
        id: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::PUT,
            &format!("{MEMORY_PATH}/{id}"),
            &[],
            Some(payload),
            ctx,
        )
        .await
    }

    pub async fn delete_memory(
        &self,
        id: &str,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::DELETE,
            &format!("{MEMORY_PATH}/{id}"),
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn search_memories(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::POST,
            &format!("{MEMORY_PATH}/search"),
            &[],
            Some(payload),
            ctx,
        )
        .await
    }

    /// Documentation search. Routed to the primary API; deployments that
    /// host docs search elsewhere point MEMORY_API_URL at a router that
    /// forwards it.
    pub async fn search_docs(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::POST,
            "/api/v1/docs/search",
            &[],
            Some(payload),
            ctx,
        )
        .await
    }
}
