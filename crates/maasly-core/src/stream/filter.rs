// ── Filter predicates for collection snapshots ──
//
// Used by `list` and `watch` to narrow a snapshot without re-fetching.

use serde_json::Value;

/// Filter predicate over untyped entities.
pub enum EntityFilter {
    All,
    /// Top-level `field` equals `value`.
    FieldEquals { field: String, value: Value },
    /// Case-insensitive substring match against any top-level string or
    /// number field.
    Contains(String),
    Custom(Box<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl EntityFilter {
    /// Parse `field=value` into [`FieldEquals`](Self::FieldEquals).
    ///
    /// The value is read as JSON when it parses (`id=5`, `locked=true`),
    /// as a plain string otherwise.
    pub fn field_equals(expr: &str) -> Option<Self> {
        let (field, raw) = expr.split_once('=')?;
        let field = field.trim();
        if field.is_empty() {
            return None;
        }
        let value = serde_json::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_owned()));
        Some(Self::FieldEquals {
            field: field.to_owned(),
            value,
        })
    }

    pub fn matches(&self, entity: &Value) -> bool {
        match self {
            Self::All => true,
            Self::FieldEquals { field, value } => entity.get(field) == Some(value),
            Self::Contains(needle) => {
                let needle = needle.to_lowercase();
                entity.as_object().is_some_and(|fields| {
                    fields.values().any(|v| match v {
                        Value::String(s) => s.to_lowercase().contains(&needle),
                        Value::Number(n) => n.to_string().contains(&needle),
                        _ => false,
                    })
                })
            }
            Self::Custom(f) => f(entity),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_equals_parses_json_values() {
        let filter = EntityFilter::field_equals("id=5").unwrap();
        assert!(filter.matches(&json!({"id": 5})));
        assert!(!filter.matches(&json!({"id": "5"})));

        let filter = EntityFilter::field_equals("status = Ready").unwrap();
        assert!(filter.matches(&json!({"status": "Ready"})));

        assert!(EntityFilter::field_equals("=x").is_none());
        assert!(EntityFilter::field_equals("nofield").is_none());
    }

    #[test]
    fn contains_is_case_insensitive() {
        let filter = EntityFilter::Contains("RACK".into());
        assert!(filter.matches(&json!({"id": 1, "name": "rack-1"})));
        assert!(!filter.matches(&json!({"id": 1, "name": "default"})));
        assert!(!filter.matches(&json!("rack")));
    }
}
