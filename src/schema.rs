//! Tool argument schemas as data.
//!
//! Schemas drive both argument validation and the JSON Schema advertised in
//! `tools/list` and the capability cards — a change to a schema is a change
//! to the catalog.

use serde_json::{Map, Value, json};

use crate::error::FieldError;

// ── Closed enumerations ─────────────────────────────────────────────────

pub const MEMORY_TYPES: &[&str] = &[
    "context",
    "project",
    "knowledge",
    "reference",
    "personal",
    "workflow",
];
pub const SORT_FIELDS: &[&str] = &["created_at", "updated_at", "title"];
pub const SORT_ORDERS: &[&str] = &["asc", "desc"];
pub const ACCESS_LEVELS: &[&str] = &["public", "authenticated", "team", "admin", "enterprise"];
pub const DOC_SECTIONS: &[&str] = &["all", "api", "guides", "sdks"];
pub const RISK_LEVELS: &[&str] = &["low", "medium", "high", "critical"];

#[derive(Debug, Clone)]
pub enum FieldKind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean,
    Enum(&'static [&'static str]),
    Array {
        item: Box<FieldKind>,
        max_items: Option<usize>,
    },
    /// Opaque record; contents validated only by sanitization.
    Object,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub doc: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn string(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            required: false,
            kind: FieldKind::String {
                min_len: None,
                max_len: None,
            },
        }
    }

    pub fn integer(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            required: false,
            kind: FieldKind::Integer {
                min: None,
                max: None,
            },
        }
    }

    pub fn boolean(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            required: false,
            kind: FieldKind::Boolean,
        }
    }

    pub fn enumeration(
        name: &'static str,
        doc: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            doc,
            required: false,
            kind: FieldKind::Enum(values),
        }
    }

    pub fn string_array(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            required: false,
            kind: FieldKind::Array {
                item: Box::new(FieldKind::String {
                    min_len: None,
                    max_len: None,
                }),
                max_items: None,
            },
        }
    }

    pub fn object(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            required: false,
            kind: FieldKind::Object,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, value: i64) -> Self {
        if let FieldKind::Integer { min, .. } = &mut self.kind {
            *min = Some(value);
        }
        self
    }

    pub fn max(mut self, value: i64) -> Self {
        if let FieldKind::Integer { max, .. } = &mut self.kind {
            *max = Some(value);
        }
        self
    }

    pub fn min_len(mut self, value: usize) -> Self {
        if let FieldKind::String { min_len, .. } = &mut self.kind {
            *min_len = Some(value);
        }
        self
    }

    pub fn max_len(mut self, value: usize) -> Self {
        if let FieldKind::String { max_len, .. } = &mut self.kind {
            *max_len = Some(value);
        }
        self
    }

    pub fn max_items(mut self, value: usize) -> Self {
        if let FieldKind::Array { max_items, .. } = &mut self.kind {
            *max_items = Some(value);
        }
        self
    }
}

/// A strict object schema: known fields only, typed, with per-field docs.
#[derive(Debug, Clone)]
pub struct ArgSchema {
    pub fields: Vec<FieldSpec>,
    pub strict: bool,
}

impl ArgSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            strict: true,
        }
    }

    /// Empty argument object (tools that take nothing).
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Validate `args` against this schema. Collects every violation rather
    /// than stopping at the first.
    pub fn validate(&self, args: &Value) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let empty = Map::new();
        let map = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(vec![FieldError::new("arguments", "must be a JSON object")]);
            }
        };

        if self.strict {
            for key in map.keys() {
                if !self.fields.iter().any(|f| f.name == key) {
                    errors.push(FieldError::new(key.clone(), "unknown field"));
                }
            }
        }

        for field in &self.fields {
            match map.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        errors.push(FieldError::new(field.name, "is required"));
                    }
                }
                Some(value) => {
                    check_kind(field.name, &field.kind, value, &mut errors);
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Render the advertised JSON Schema for this tool's `inputSchema`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), kind_schema(&field.kind, field.doc));
            if field.required {
                required.push(Value::String(field.name.to_string()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": !self.strict,
        })
    }
}

fn check_kind(path: &str, kind: &FieldKind, value: &Value, errors: &mut Vec<FieldError>) {
    match kind {
        FieldKind::String { min_len, max_len } => match value.as_str() {
            Some(s) => {
                if let Some(min) = min_len {
                    if s.len() < *min {
                        errors.push(FieldError::new(
                            path,
                            format!("must be at least {min} characters"),
                        ));
                    }
                }
                if let Some(max) = max_len {
                    if s.len() > *max {
                        errors.push(FieldError::new(
                            path,
                            format!("must be at most {max} characters"),
                        ));
                    }
                }
            }
            None => errors.push(FieldError::new(path, "must be a string")),
        },
        FieldKind::Integer { min, max } => match value.as_i64() {
            Some(n) => {
                if let Some(min) = min {
                    if n < *min {
                        errors.push(FieldError::new(path, format!("must be at least {min}")));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        errors.push(FieldError::new(path, format!("must be at most {max}")));
                    }
                }
            }
            None => errors.push(FieldError::new(path, "must be an integer")),
        },
        FieldKind::Boolean => {
            if !value.is_boolean() {
                errors.push(FieldError::new(path, "must be a boolean"));
            }
        }
        FieldKind::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => errors.push(FieldError::new(
                path,
                format!("'{s}' is not one of [{}]", allowed.join(", ")),
            )),
            None => errors.push(FieldError::new(path, "must be a string")),
        },
        FieldKind::Array { item, max_items } => match value.as_array() {
            Some(items) => {
                if let Some(max) = max_items {
                    if items.len() > *max {
                        errors
                            .push(FieldError::new(path, format!("must have at most {max} items")));
                    }
                }
                for (i, entry) in items.iter().enumerate() {
                    check_kind(&format!("{path}[{i}]"), item, entry, errors);
                }
            }
            None => errors.push(FieldError::new(path, "must be an array")),
        },
        FieldKind::Object => {
            if !value.is_object() {
                errors.push(FieldError::new(path, "must be an object"));
            }
        }
    }
}

fn kind_schema(kind: &FieldKind, doc: &str) -> Value {
    let mut schema = match kind {
        FieldKind::String { min_len, max_len } => {
            let mut s = json!({ "type": "string" });
            if let Some(min) = min_len {
                s["minLength"] = json!(min);
            }
            if let Some(max) = max_len {
                s["maxLength"] = json!(max);
            }
            s
        }
        FieldKind::Integer { min, max } => {
            let mut s = json!({ "type": "integer" });
            if let Some(min) = min {
                s["minimum"] = json!(min);
            }
            if let Some(max) = max {
                s["maximum"] = json!(max);
            }
            s
        }
        FieldKind::Boolean => json!({ "type": "boolean" }),
        FieldKind::Enum(values) => json!({ "type": "string", "enum": values }),
        FieldKind::Array { item, max_items } => {
            let mut s = json!({ "type": "array", "items": kind_schema(item, "") });
            if let Some(max) = max_items {
                s["maxItems"] = json!(max);
            }
            s
        }
        FieldKind::Object => json!({ "type": "object" }),
    };
    if !doc.is_empty() {
        schema["description"] = json!(doc);
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_schema() -> ArgSchema {
        ArgSchema::new(vec![
            FieldSpec::integer("limit", "Maximum results").min(1).max(100),
            FieldSpec::enumeration("memory_type", "Filter by type", MEMORY_TYPES),
            FieldSpec::string_array("tags", "Filter by tags").max_items(20),
        ])
    }

    #[test]
    fn valid_arguments_pass() {
        let schema = list_schema();
        assert!(
            schema
                .validate(&json!({"limit": 10, "memory_type": "project", "tags": ["a"]}))
                .is_ok()
        );
        assert!(schema.validate(&json!({})).is_ok());
    }

    #[test]
    fn limit_above_max_is_named_in_details() {
        let schema = list_schema();
        let errors = schema
            .validate(&json!({"limit": 1000}))
            .expect_err("rejected");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "limit");
        assert!(errors[0].message.to_lowercase().contains("most"));
    }

    #[test]
    fn strict_mode_rejects_unknown_fields() {
        let schema = list_schema();
        let errors = schema
            .validate(&json!({"limit": 5, "surprise": true}))
            .expect_err("rejected");
        assert_eq!(errors[0].field, "surprise");
        assert_eq!(errors[0].message, "unknown field");
    }

    #[test]
    fn missing_required_field_is_reported() {
        let schema = ArgSchema::new(vec![
            FieldSpec::string("title", "Title").required().max_len(500),
            FieldSpec::string("content", "Body").required(),
        ]);
        let errors = schema
            .validate(&json!({"title": "x"}))
            .expect_err("rejected");
        assert_eq!(errors[0].field, "content");
        assert_eq!(errors[0].message, "is required");
    }

    #[test]
    fn enum_violations_list_the_allowed_values() {
        let schema = list_schema();
        let errors = schema
            .validate(&json!({"memory_type": "diary"}))
            .expect_err("rejected");
        assert!(errors[0].message.contains("context"));
        assert!(errors[0].message.contains("workflow"));
    }

    #[test]
    fn array_items_are_type_checked_with_paths() {
        let schema = list_schema();
        let errors = schema
            .validate(&json!({"tags": ["ok", 7]}))
            .expect_err("rejected");
        assert_eq!(errors[0].field, "tags[1]");
    }

    #[test]
    fn multiple_violations_are_all_collected() {
        let schema = list_schema();
        let errors = schema
            .validate(&json!({"limit": 0, "memory_type": "nope"}))
            .expect_err("rejected");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn json_schema_rendering_is_stable() {
        let schema = list_schema();
        let rendered = schema.to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["additionalProperties"], false);
        assert_eq!(rendered["properties"]["limit"]["minimum"], 1);
        assert_eq!(rendered["properties"]["limit"]["maximum"], 100);
        assert_eq!(
            rendered["properties"]["memory_type"]["enum"],
            json!(MEMORY_TYPES)
        );
        assert_eq!(rendered["properties"]["tags"]["maxItems"], 20);
    }
}
