//! Normalized error taxonomy.
//!
//! Every failure a client can observe collapses to one of these kinds before
//! it leaves the dispatcher or the upstream client. Each kind carries a
//! stable code, an HTTP-equivalent status, and a `retryable` flag.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

/// Per-field validation failure, surfaced in `details`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("{message}")]
    Authentication { message: String },

    #[error("upstream rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("request deadline of {timeout_ms}ms exceeded")]
    Timeout { timeout_ms: u64 },

    #[error("{message}")]
    ServiceUnavailable { message: String },

    #[error("circuit breaker for {upstream} is open")]
    CircuitOpen {
        upstream: String,
        retry_at: DateTime<Utc>,
    },

    /// Malicious input detected. The message is intentionally vague — the
    /// matched category is logged, never echoed.
    #[error("request rejected: input failed safety checks")]
    InvalidInput,

    #[error("{message}")]
    Internal { message: String },

    #[error("{message}")]
    Unknown { message: String },
}

impl GatewayError {
    pub fn validation(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status this kind maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::InvalidInput => 400,
            Self::Authentication { .. } => 401,
            Self::RateLimited { .. } => 429,
            Self::ServiceUnavailable { .. } | Self::CircuitOpen { .. } => 503,
            Self::Timeout { .. } => 504,
            Self::Internal { .. } | Self::Unknown { .. } => 500,
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::ServiceUnavailable { .. }
                | Self::CircuitOpen { .. }
        )
    }

    /// The single error object a client sees, shaped
    /// `{success:false, error:{code, message, requestId, retryable, details?}}`.
    pub fn to_payload(&self, request_id: &str) -> Value {
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
            "requestId": request_id,
            "retryable": self.retryable(),
        });
        let obj = error.as_object_mut().expect("error payload is an object");
        match self {
            Self::Validation { details, .. } if !details.is_empty() => {
                obj.insert(
                    "details".to_string(),
                    serde_json::to_value(details).unwrap_or(Value::Null),
                );
            }
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => {
                obj.insert("details".to_string(), json!({ "retryAfterSecs": secs }));
            }
            Self::CircuitOpen { retry_at, .. } => {
                obj.insert(
                    "details".to_string(),
                    json!({ "retryAt": retry_at.to_rfc3339() }),
                );
            }
            _ => {}
        }
        json!({ "success": false, "error": error })
    }

    /// Log at warn for client-class errors, error for server-class.
    pub fn log(&self, request_id: &str) {
        let status = self.http_status();
        if status >= 500 {
            tracing::error!(
                request_id,
                code = self.code(),
                status,
                error = %self,
                "request failed"
            );
        } else {
            tracing::warn!(
                request_id,
                code = self.code(),
                status,
                error = %self,
                "request rejected"
            );
        }
    }
}
