//! Canonical query strings for saved searches.
//!
//! The identity string doubles as the key of the last-items table and as the
//! filter part of the search request, so two alerts that only differ by their
//! internal id share both.

use crate::types::SavedSearch;
use serde_json::{Map, Value};

/// Internal alert id carried inside the parameter mapping; never part of the identity.
pub const INTERNAL_ID_FIELD: &str = "saved_search_id";

/// Builds `key=value&key=value` from the parameters, in the order received.
///
/// Empty values (null, `false`, `0`, `""`, `[]`) are left out, list values are
/// joined with `,` and every value is URL-encoded.
pub fn query_identity(params: &Map<String, Value>) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != INTERNAL_ID_FIELD)
        .filter_map(|(key, value)| {
            render_value(value).map(|v| format!("{}={}", key, urlencoding::encode(&v)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// The keyword filter, if the search has a non-blank one.
pub fn keywords(params: &Map<String, Value>) -> Option<&str> {
    params
        .get("keywords")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => {
            if n.as_f64() == Some(0.0) {
                None
            } else {
                Some(n.to_string())
            }
        }
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

impl SavedSearch {
    pub fn identity(&self) -> String {
        query_identity(&self.query)
    }

    pub fn keywords(&self) -> Option<&str> {
        keywords(&self.query)
    }
}
