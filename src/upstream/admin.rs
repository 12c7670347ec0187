//! API-key, project, organization, and system operations on the primary
//! REST API.

use reqwest::Method;
use serde_json::{Value, json};

use super::{Upstream, UpstreamClient};
use crate::error::GatewayError;
use crate::state::RequestContext;

const API_KEYS_PATH: &str = "/api/v1/api-keys";

impl UpstreamClient {
    // ── API keys ────────────────────────────────────────────────────────

    pub async fn list_api_keys(&self, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(Upstream::Api, Method::GET, API_KEYS_PATH, &[], None, ctx)
            .await
    }

    pub async fn create_api_key(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::POST,
            API_KEYS_PATH,
            &[],
            Some(payload),
            ctx,
        )
        .await
    }

    pub async fn delete_api_key(
        &self,
        key_id: &str,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::DELETE,
            &format!("{API_KEYS_PATH}/{key_id}"),
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn rotate_api_key(
        &self,
        key_id: &str,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::POST,
            &format!("{API_KEYS_PATH}/{key_id}/rotate"),
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn revoke_api_key(
        &self,
        key_id: &str,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::POST,
            &format!("{API_KEYS_PATH}/{key_id}/revoke"),
            &[],
            None,
            ctx,
        )
        .await
    }

    // ── Projects & organization ─────────────────────────────────────────

    pub async fn list_projects(&self, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::GET,
            "/api/v1/projects",
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn create_project(
        &self,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::POST,
            "/api/v1/projects",
            &[],
            Some(payload),
            ctx,
        )
        .await
    }

    pub async fn get_organization(&self, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::GET,
            "/api/v1/organization",
            &[],
            None,
            ctx,
        )
        .await
    }

    // ── System ──────────────────────────────────────────────────────────

    pub async fn system_health(&self, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(Upstream::Api, Method::GET, "/api/v1/health", &[], None, ctx)
            .await
    }

    pub async fn auth_status(&self, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::GET,
            "/api/v1/auth/status",
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn get_config(&self, key: &str, ctx: &RequestContext) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::GET,
            &format!("/api/v1/config/{key}"),
            &[],
            None,
            ctx,
        )
        .await
    }

    pub async fn set_config(
        &self,
        key: &str,
        value: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.request(
            Upstream::Api,
            Method::PUT,
            &format!("/api/v1/config/{key}"),
            &[],
            Some(&json!({ "value": value })),
            ctx,
        )
        .await
    }
}
