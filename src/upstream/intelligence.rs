//! Analytics and intelligence operations on the serverless functions
//! domain. Each function is a single POST endpoint taking the tool
//! arguments as its body.

use reqwest::Method;
use serde_json::Value;

use super::{Upstream, UpstreamClient};
use crate::error::GatewayError;
use crate::state::RequestContext;

impl UpstreamClient {
    pub async fn intelligence_health(&self, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(
            Upstream::EdgeFunctions,
            Method::GET,
            "/intelligence-health",
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn suggest_tags(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_function("intelligence-suggest-tags", payload, ctx)
            .await
    }

    pub async fn find_related(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_function("intelligence-find-related", payload, ctx)
            .await
    }

    pub async fn detect_duplicates(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_function("intelligence-detect-duplicates", payload, ctx)
            .await
    }

    pub async fn extract_insights(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_function("intelligence-extract-insights", payload, ctx)
            .await
    }

    pub async fn analyze_patterns(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_function("intelligence-analyze-patterns", payload, ctx)
            .await
    }

    pub async fn memory_stats(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_function("memory-stats", payload, ctx).await
    }

    pub async fn bulk_delete_memories(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_function("memory-bulk-delete", payload, ctx).await
    }

    async fn call_function(
        &self,
        name: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::EdgeFunctions,
            Method::POST,
            &format!("/{name}"),
            &[],
            Some(payload),
            ctx,
        )
        .await
    }
}
