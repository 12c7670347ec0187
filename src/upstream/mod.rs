//! Upstream HTTP access: deadline, bounded retries with jittered backoff,
//! circuit-breaker gating, correlation-id propagation, and error
//! normalization. Per-operation adapters live in the sibling modules.
//!
//! The breaker wraps the whole retry loop — admission is checked once per
//! logical call and exactly one success/failure is recorded for it, so
//! retries can never reopen an OPEN breaker.

pub mod admin;
pub mod intelligence;
pub mod memories;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use crate::breaker::{API_BREAKER, BreakerRegistry, EDGE_FUNCTIONS_BREAKER};
use crate::config::GatewayConfig;
use crate::error::{FieldError, GatewayError};
use crate::logging::redact;
use crate::state::RequestContext;

/// The two services this gateway fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Api,
    EdgeFunctions,
}

impl Upstream {
    pub fn breaker_name(self) -> &'static str {
        match self {
            Self::Api => API_BREAKER,
            Self::EdgeFunctions => EDGE_FUNCTIONS_BREAKER,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Api => "primary-api",
            Self::EdgeFunctions => "edge-functions",
        }
    }
}

/// Single-attempt health probe result, consumed by `/health/full`.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Some(status) when the upstream produced an HTTP response.
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn responded_ok(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: Arc<GatewayConfig>,
    breakers: Arc<BreakerRegistry>,
}

impl UpstreamClient {
    pub fn new(config: Arc<GatewayConfig>, breakers: Arc<BreakerRegistry>) -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            config,
            breakers,
        }
    }

    fn url_for(&self, upstream: Upstream, path: &str) -> String {
        match upstream {
            Upstream::Api => self.config.api_url(path),
            Upstream::EdgeFunctions => self.config.functions_url(path),
        }
    }

    /// Execute a call with the full reliability stack.
    pub async fn request(
        &self,
        upstream: Upstream,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let breaker = self.breakers.get(upstream.breaker_name());
        breaker.admit()?;

        let url = self.url_for(upstream, path);
        let deadline = Duration::from_millis(self.config.request_timeout_ms);
        let max_retries = self.config.max_retries;

        let mut retry_after_hint: Option<u64> = None;
        let mut attempt: u32 = 0;
        let outcome = loop {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt, retry_after_hint.take());
                tracing::debug!(
                    component = "upstream",
                    upstream = upstream.label(),
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    request_id = %ctx.request_id,
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
            attempt += 1;

            let started = Instant::now();
            let sent = self
                .build_request(&method, &url, query, body, ctx, deadline)
                .send()
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match sent {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!(
                        component = "upstream",
                        upstream = upstream.label(),
                        url = %url,
                        status = status.as_u16(),
                        duration_ms,
                        attempt,
                        request_id = %ctx.request_id,
                        "upstream response"
                    );
                    if status.is_success() {
                        break Ok(decode_body(response).await);
                    }

                    let retry_after = parse_retry_after(&response);
                    let text = response.text().await.unwrap_or_default();
                    if is_retryable_status(status) && attempt <= max_retries {
                        retry_after_hint = retry_after;
                        continue;
                    }
                    break Err(normalize_status(status, &text, retry_after));
                }
                Err(err) => {
                    tracing::debug!(
                        component = "upstream",
                        upstream = upstream.label(),
                        url = %url,
                        duration_ms,
                        attempt,
                        request_id = %ctx.request_id,
                        error = %err,
                        "upstream transport failure"
                    );
                    if attempt <= max_retries {
                        continue;
                    }
                    break Err(normalize_transport(&err, deadline));
                }
            }
        };

        // One breaker outcome per logical call. An HTTP response of any
        // status means the upstream is alive; only transport-level faults
        // and 5xx count as breaker failures.
        match &outcome {
            Ok(_) => breaker.record_success(),
            Err(err) if counts_as_breaker_failure(err) => breaker.record_failure(),
            Err(_) => breaker.record_success(),
        }

        outcome
    }

    /// One-shot latency probe used by dependency health and warmup. Shares
    /// the breaker so recovery probes drive the HALF_OPEN → CLOSED path.
    pub async fn probe(
        &self,
        upstream: Upstream,
        path: &str,
        ctx: &RequestContext,
    ) -> ProbeOutcome {
        let breaker = self.breakers.get(upstream.breaker_name());
        let started = Instant::now();

        if let Err(err) = breaker.admit() {
            return ProbeOutcome {
                status: None,
                latency_ms: started.elapsed().as_millis() as u64,
                error: Some(err.to_string()),
            };
        }

        let url = self.url_for(upstream, path);
        let deadline = Duration::from_millis(self.config.request_timeout_ms.min(5_000));
        let sent = self
            .build_request(&Method::GET, &url, &[], None, ctx, deadline)
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match sent {
            Ok(response) => {
                let status = response.status().as_u16();
                breaker.record_success();
                ProbeOutcome {
                    status: Some(status),
                    latency_ms,
                    error: if (200..300).contains(&status) {
                        None
                    } else {
                        Some(format!("upstream returned HTTP {status}"))
                    },
                }
            }
            Err(err) => {
                breaker.record_failure();
                ProbeOutcome {
                    status: None,
                    latency_ms,
                    error: Some(redact(&err.to_string())),
                }
            }
        }
    }

    /// Raw pass-through POST used by dynamic client registration: the
    /// upstream's status and body are preserved verbatim, not normalized.
    pub async fn proxy_post(
        &self,
        url: &str,
        body: &Value,
        ctx: &RequestContext,
    ) -> Result<(u16, Value), GatewayError> {
        let deadline = Duration::from_millis(self.config.request_timeout_ms);
        let response = self
            .http
            .post(url)
            .timeout(deadline)
            .header("X-Request-Id", ctx.request_id.as_str())
            .json(body)
            .send()
            .await
            .map_err(|err| normalize_transport(&err, deadline))?;
        let status = response.status().as_u16();
        Ok((status, decode_body(response).await))
    }

    fn build_request(
        &self,
        method: &Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        ctx: &RequestContext,
        deadline: Duration,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .request(method.clone(), url)
            .timeout(deadline)
            .header("X-Request-Id", ctx.request_id.as_str())
            .header("Accept", "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-Key", key.as_str());
        }
        if let Some(token) = &self.config.bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
    }

    /// Exponential backoff from the configured base with ±25% jitter;
    /// a Retry-After hint acts as the floor.
    fn backoff_delay(&self, completed_attempts: u32, retry_after_secs: Option<u64>) -> Duration {
        let exponent = completed_attempts.saturating_sub(1).min(10);
        let base_ms = self.config.retry_base_delay_ms.max(1) * (1u64 << exponent);
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        let delay_ms = (base_ms as f64 * jitter) as u64;
        let floor_ms = retry_after_secs.map(|s| s * 1_000).unwrap_or(0);
        Duration::from_millis(delay_ms.max(floor_ms))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 502 | 503 | 504)
}

fn counts_as_breaker_failure(err: &GatewayError) -> bool {
    matches!(
        err,
        GatewayError::Timeout { .. }
            | GatewayError::ServiceUnavailable { .. }
            | GatewayError::Internal { .. }
            | GatewayError::Unknown { .. }
    )
}

async fn decode_body(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    if text.trim().is_empty() {
        json!({ "success": true })
    } else {
        serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }))
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Collapse an upstream HTTP response to the normalized taxonomy.
fn normalize_status(status: StatusCode, body: &str, retry_after: Option<u64>) -> GatewayError {
    let message = extract_message(body)
        .map(|m| redact(&m))
        .unwrap_or_else(|| format!("upstream returned HTTP {}", status.as_u16()));

    match status.as_u16() {
        400 | 404 | 409 | 422 => GatewayError::Validation {
            message,
            details: extract_field_errors(body),
        },
        401 | 403 => GatewayError::Authentication { message },
        408 => GatewayError::Timeout { timeout_ms: 0 },
        429 => GatewayError::RateLimited {
            retry_after_secs: retry_after,
        },
        502 | 503 => GatewayError::ServiceUnavailable { message },
        500..=599 => GatewayError::Internal { message },
        _ => GatewayError::Unknown { message },
    }
}

fn normalize_transport(err: &reqwest::Error, deadline: Duration) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout {
            timeout_ms: deadline.as_millis() as u64,
        }
    } else {
        GatewayError::ServiceUnavailable {
            message: redact(&format!("upstream unreachable: {err}")),
        }
    }
}

/// Best-effort message extraction from `{error:{message}}` / `{message}` /
/// `{error:"..."}` shapes.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn extract_field_errors(body: &str) -> Vec<FieldError> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let details = value
        .pointer("/error/details")
        .or_else(|| value.get("details"))
        .and_then(|v| v.as_array());
    match details {
        Some(items) => items
            .iter()
            .filter_map(|item| {
                let field = item.get("field")?.as_str()?;
                let message = item
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("invalid value");
                Some(FieldError::new(field, message))
            })
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_status_set_matches_policy() {
        for code in [408u16, 429, 502, 503, 504] {
            assert!(is_retryable_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [200u16, 201, 400, 401, 404, 422, 500] {
            assert!(!is_retryable_status(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[test]
    fn status_normalization_covers_the_taxonomy() {
        assert_eq!(
            normalize_status(StatusCode::BAD_REQUEST, "{}", None).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            normalize_status(StatusCode::UNAUTHORIZED, "{}", None).code(),
            "AUTHENTICATION_ERROR"
        );
        assert_eq!(
            normalize_status(StatusCode::TOO_MANY_REQUESTS, "{}", Some(7)).code(),
            "RATE_LIMITED"
        );
        assert_eq!(
            normalize_status(StatusCode::BAD_GATEWAY, "{}", None).code(),
            "SERVICE_UNAVAILABLE"
        );
        assert_eq!(
            normalize_status(StatusCode::INTERNAL_SERVER_ERROR, "{}", None).code(),
            "INTERNAL_ERROR"
        );
        assert_eq!(
            normalize_status(StatusCode::IM_A_TEAPOT, "{}", None).code(),
            "UNKNOWN_ERROR"
        );
    }

    #[test]
    fn rate_limit_keeps_the_retry_after_hint() {
        let err = normalize_status(StatusCode::TOO_MANY_REQUESTS, "{}", Some(12));
        match err {
            GatewayError::RateLimited { retry_after_secs } => {
                assert_eq!(retry_after_secs, Some(12));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn upstream_field_errors_survive_normalization() {
        let body =
            r#"{"error":{"message":"invalid","details":[{"field":"title","message":"too long"}]}}"#;
        match normalize_status(StatusCode::UNPROCESSABLE_ENTITY, body, None) {
            GatewayError::Validation { details, .. } => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "title");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn error_messages_are_redacted() {
        let body = r#"{"message":"rejected token Bearer abcdef0123456789xyz"}"#;
        let err = normalize_status(StatusCode::UNAUTHORIZED, body, None);
        assert!(!err.to_string().contains("abcdef0123456789"));
    }

    #[test]
    fn breaker_failure_policy() {
        assert!(counts_as_breaker_failure(&GatewayError::Timeout {
            timeout_ms: 10
        }));
        assert!(counts_as_breaker_failure(&GatewayError::internal("x")));
        assert!(!counts_as_breaker_failure(&GatewayError::validation(
            "x",
            vec![]
        )));
        assert!(!counts_as_breaker_failure(&GatewayError::Authentication {
            message: "x".into()
        }));
        assert!(!counts_as_breaker_failure(&GatewayError::RateLimited {
            retry_after_secs: None
        }));
    }
}
