//! Query strings for list calls.
//!
//! Each query is a JSON object `{"method", "attribute", "values"}` rendered
//! to a string and passed in the `queries` list param.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attribute: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    values: Vec<Value>,
}

impl Query {
    fn new(method: &'static str, attribute: Option<&str>, values: Vec<Value>) -> Self {
        Self {
            method,
            attribute: attribute.map(str::to_string),
            values,
        }
    }

    pub fn equal<V: Into<Value>>(attribute: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            "equal",
            Some(attribute),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn not_equal<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new("notEqual", Some(attribute), vec![value.into()])
    }

    pub fn less_than<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new("lessThan", Some(attribute), vec![value.into()])
    }

    pub fn greater_than<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new("greaterThan", Some(attribute), vec![value.into()])
    }

    pub fn search(attribute: &str, text: &str) -> Self {
        Self::new("search", Some(attribute), vec![Value::from(text)])
    }

    pub fn is_null(attribute: &str) -> Self {
        Self::new("isNull", Some(attribute), Vec::new())
    }

    pub fn order_asc(attribute: &str) -> Self {
        Self::new("orderAsc", Some(attribute), Vec::new())
    }

    pub fn order_desc(attribute: &str) -> Self {
        Self::new("orderDesc", Some(attribute), Vec::new())
    }

    pub fn limit(limit: u64) -> Self {
        Self::new("limit", None, vec![Value::from(limit)])
    }

    pub fn offset(offset: u64) -> Self {
        Self::new("offset", None, vec![Value::from(offset)])
    }

    pub fn cursor_after(document_id: &str) -> Self {
        Self::new("cursorAfter", None, vec![Value::from(document_id)])
    }

    pub fn select<'a>(attributes: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            "select",
            None,
            attributes.into_iter().map(Value::from).collect(),
        )
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl From<Query> for String {
    fn from(query: Query) -> Self {
        query.to_string()
    }
}
