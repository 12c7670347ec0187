//! Inbound payload hygiene.
//!
//! Two passes over every tool-call argument object: a safe rewriting pass
//! that neutralizes markup without destroying formatting in content-bearing
//! fields, then a signature pass that rejects clearly malicious payloads.
//! This is best-effort hygiene, not an authorization boundary — real
//! authorization happens upstream.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::GatewayError;

/// Fields whose formatting (whitespace, newlines, markdown) must survive.
const CONTENT_FIELDS: &[&str] = &["content", "description", "text", "body"];

struct Rewriters {
    script_tags: Regex,
    event_attrs: Regex,
    js_scheme: Regex,
}

fn rewriters() -> &'static Rewriters {
    static REWRITERS: OnceLock<Rewriters> = OnceLock::new();
    REWRITERS.get_or_init(|| Rewriters {
        script_tags: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script regex"),
        event_attrs: Regex::new(r#"(?i)\bon\w+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
            .expect("event attr regex"),
        js_scheme: Regex::new(r"(?i)javascript\s*:").expect("js scheme regex"),
    })
}

struct Signatures {
    sql: Regex,
    shell: Regex,
    traversal: Regex,
}

fn signatures() -> &'static Signatures {
    static SIGNATURES: OnceLock<Signatures> = OnceLock::new();
    SIGNATURES.get_or_init(|| Signatures {
        sql: Regex::new(
            r"(?i)(\bunion\s+select\b|\bdrop\s+table\b|\bdelete\s+from\b|\binsert\s+into\b|\btruncate\s+table\b|'\s*(or|and)\s+'?\d+'?\s*=\s*'?\d+|;\s*--|'\s*;\s*drop\b)",
        )
        .expect("sql signature"),
        shell: Regex::new(
            r"(?i)(\$\(|`[^`]+`|[;&|]\s*(rm|curl|wget|nc|bash|sh|chmod|mkfifo)\b|\|\s*(sh|bash)\b)",
        )
        .expect("shell signature"),
        traversal: Regex::new(r"(\.\./|\.\.\\|%2e%2e%2f|%2e%2e/|\.\.%2f)")
            .expect("traversal signature"),
    })
}

/// Rewrite then screen a tool-call argument object.
///
/// Returns the rewritten payload, or [`GatewayError::InvalidInput`] when a
/// signature matches. The matched category is logged at warn and never
/// echoed back to the caller.
pub fn sanitize_payload(payload: &Value, request_id: &str) -> Result<Value, GatewayError> {
    let rewritten = rewrite(payload, None);

    if let Some(category) = detect(&rewritten) {
        tracing::warn!(
            component = "sanitizer",
            event = "pattern_detected",
            request_id,
            category,
            "rejecting request body"
        );
        return Err(GatewayError::InvalidInput);
    }

    Ok(rewritten)
}

/// Pass 1 — recursive rewriting. Content-like fields keep formatting but
/// lose script tags, inline event handlers, `javascript:` schemes, and null
/// bytes; every other string is HTML-escaped and trimmed.
fn rewrite(value: &Value, field: Option<&str>) -> Value {
    match value {
        Value::String(s) => Value::String(rewrite_string(s, field)),
        Value::Array(items) => Value::Array(items.iter().map(|v| rewrite(v, field)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), rewrite(v, Some(k.as_str()))))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn rewrite_string(s: &str, field: Option<&str>) -> String {
    let r = rewriters();
    let stripped = r.script_tags.replace_all(s, "");

    let is_content = field.is_some_and(|name| CONTENT_FIELDS.contains(&name));
    if is_content {
        let no_events = r.event_attrs.replace_all(&stripped, "");
        let no_scheme = r.js_scheme.replace_all(&no_events, "");
        no_scheme.replace('\0', "")
    } else {
        html_escape(stripped.trim()).replace('\0', "")
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Pass 2 — signature detection over the serialized body. Returns the
/// matched category name for logging.
fn detect(payload: &Value) -> Option<&'static str> {
    let serialized = payload.to_string();
    let s = signatures();
    if s.sql.is_match(&serialized) {
        Some("sql_injection")
    } else if s.shell.is_match(&serialized) {
        Some("command_injection")
    } else if s.traversal.is_match(&serialized) {
        Some("path_traversal")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_script_tags_everywhere() {
        let payload = json!({
            "title": "hello <script>alert(1)</script> world",
            "content": "before <script src='x'>bad()</script> after",
        });
        let clean = sanitize_payload(&payload, "req").expect("clean");
        assert_eq!(clean["title"], "hello  world");
        assert_eq!(clean["content"], "before  after");
    }

    #[test]
    fn content_fields_keep_formatting() {
        let payload = json!({
            "content": "line one\n\nline two\n  indented",
        });
        let clean = sanitize_payload(&payload, "req").expect("clean");
        assert_eq!(clean["content"], "line one\n\nline two\n  indented");
    }

    #[test]
    fn content_fields_lose_event_handlers_and_js_schemes() {
        let payload = json!({
            "content": "<a href=\"javascript:steal()\" onclick=\"x()\">link</a>",
        });
        let clean = sanitize_payload(&payload, "req").expect("clean");
        let content = clean["content"].as_str().unwrap();
        assert!(!content.to_lowercase().contains("javascript:"));
        assert!(!content.to_lowercase().contains("onclick"));
    }

    #[test]
    fn other_fields_are_escaped_and_trimmed() {
        let payload = json!({ "title": "  a <b> & \"c\"  " });
        let clean = sanitize_payload(&payload, "req").expect("clean");
        assert_eq!(clean["title"], "a &lt;b&gt; &amp; &quot;c&quot;");
    }

    #[test]
    fn rewriting_recurses_through_arrays_and_objects() {
        let payload = json!({
            "tags": ["<script>x</script>tag"],
            "metadata": { "note": "a<b" },
        });
        let clean = sanitize_payload(&payload, "req").expect("clean");
        assert_eq!(clean["tags"][0], "tag");
        assert_eq!(clean["metadata"]["note"], "a&lt;b");
    }

    #[test]
    fn sql_injection_is_rejected() {
        let payload = json!({
            "title": "ok",
            "content": "'; DROP TABLE users;--",
        });
        let err = sanitize_payload(&payload, "req").expect_err("rejected");
        assert_eq!(err.code(), "INVALID_INPUT");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn shell_injection_is_rejected() {
        let payload = json!({ "content": "nice; rm -rf /" });
        assert!(sanitize_payload(&payload, "req").is_err());
    }

    #[test]
    fn path_traversal_is_rejected() {
        let payload = json!({ "path": "../../etc/passwd" });
        assert!(sanitize_payload(&payload, "req").is_err());
    }

    #[test]
    fn benign_payloads_pass() {
        let payload = json!({
            "title": "Quarterly report",
            "content": "Revenue grew 4% quarter over quarter.\n\nDetails follow.",
            "tags": ["finance", "q3"],
        });
        assert!(sanitize_payload(&payload, "req").is_ok());
    }
}
