//! Shared application state and per-request context.

use std::sync::Arc;
use std::time::Instant;

use crate::breaker::BreakerRegistry;
use crate::cache::GatewayCaches;
use crate::config::{GatewayConfig, GatewayMode, LogFormat};
use crate::mcp::sse::SessionMap;
use crate::metrics::Metrics;
use crate::tools::ToolRegistry;
use crate::upstream::UpstreamClient;

/// Correlation context for one inbound request. The id is accepted from the
/// client's `X-Request-Id` header when present, minted otherwise, and
/// carried verbatim to every upstream call and response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    pub fn minted() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Central application state. Clone-friendly — everything is behind `Arc`.
/// Collaborators are injected here rather than reached as globals so tests
/// can build a gateway against alternate upstreams.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub upstream: UpstreamClient,
    pub registry: Arc<ToolRegistry>,
    pub caches: Arc<GatewayCaches>,
    pub breakers: Arc<BreakerRegistry>,
    pub metrics: Arc<Metrics>,
    pub sessions: Arc<SessionMap>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let config = Arc::new(config);
        let breakers = Arc::new(BreakerRegistry::with_defaults());
        let upstream = UpstreamClient::new(config.clone(), breakers.clone());

        Self {
            config,
            upstream,
            registry: Arc::new(ToolRegistry::build()),
            caches: Arc::new(GatewayCaches::new()),
            breakers,
            metrics: Arc::new(Metrics::new()),
            sessions: Arc::new(SessionMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Test-only constructor — upstream URLs point at an unroutable local
    /// port and the retry budget is zero, so upstream-dependent paths fail
    /// fast without network access.
    #[doc(hidden)]
    pub fn new_test() -> Self {
        let config = GatewayConfig {
            mode: GatewayMode::Http,
            port: 0,
            log_level: "debug".to_string(),
            log_format: LogFormat::Human,
            api_base_url: url::Url::parse("http://127.0.0.1:19998").expect("test url"),
            functions_base_url: url::Url::parse("http://127.0.0.1:19997").expect("test url"),
            api_key: None,
            bearer_token: None,
            request_timeout_ms: 500,
            max_retries: 0,
            retry_base_delay_ms: 1,
            warmup_interval_ms: 300_000,
            auth_base_url: url::Url::parse("http://127.0.0.1:19996").expect("test url"),
            resource_url: "http://localhost:3001/mcp".to_string(),
            server_url: "http://localhost:3001".to_string(),
        };
        Self::new(config)
    }
}
