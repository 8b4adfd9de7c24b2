//! Data-source abstraction over the hosted backend: "named resource -> rows" and
//! "named procedure -> rows".

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// One row as returned by a data source, before it is shaped into a model.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Error)]
pub enum DataSourceError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    Denied(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl DataSourceError {
    /// True when the backend reported the resource itself as missing rather than a transport fault.
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unsupported(_))
    }
}

impl From<serde_json::Error> for DataSourceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Read request for a table or view.
///
/// `select` follows the hosted backend's column syntax: `*`, a column list, or
/// embedded relations such as `*, surgeon:surgeons(full_name)`. Sources that
/// cannot embed relations reject the latter as [`DataSourceError::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub select: String,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl Default for SelectQuery {
    fn default() -> Self {
        Self {
            select: "*".to_string(),
            order: None,
            limit: None,
        }
    }
}

impl SelectQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(select: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Cheapest possible existence check: one row, no joins.
    pub fn probe() -> Self {
        Self::all().limit(1)
    }

    /// True when the select list embeds related resources.
    pub fn has_embedded_relations(&self) -> bool {
        self.select.contains('(')
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn select(&self, resource: &str, query: &SelectQuery)
    -> Result<Vec<Row>, DataSourceError>;

    async fn call_procedure(&self, name: &str, args: Value) -> Result<Vec<Row>, DataSourceError>;

    /// Minimal request used to decide whether `resource` is reachable at all.
    async fn probe_rows(&self, resource: &str) -> Result<Vec<Row>, DataSourceError> {
        self.select(resource, &SelectQuery::probe()).await
    }
}

/// Table, view, column and procedure names are interpolated into requests, so
/// only plain identifiers are accepted.
pub fn validate_identifier(name: &str) -> Result<&str, DataSourceError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(DataSourceError::InvalidIdentifier(name.to_string()))
    }
}

/// Turn a procedure's JSON payload into rows: arrays are rows, a single object is one row.
pub fn rows_from_value(value: Value) -> Result<Vec<Row>, DataSourceError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(DataSourceError::Serde(format!(
                    "expected object row, got {}",
                    other
                ))),
            })
            .collect(),
        Value::Object(map) => Ok(vec![map]),
        Value::Null => Ok(Vec::new()),
        other => Err(DataSourceError::Serde(format!(
            "expected rows, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identifiers_reject_injection() {
        assert!(validate_identifier("surgery_cases").is_ok());
        assert!(validate_identifier("_private2").is_ok());
        assert!(validate_identifier("1cases").is_err());
        assert!(validate_identifier("cases; drop table x").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn procedure_payload_shapes() {
        assert_eq!(rows_from_value(json!([{"a": 1}, {"a": 2}])).unwrap().len(), 2);
        assert_eq!(rows_from_value(json!({"a": 1})).unwrap().len(), 1);
        assert!(rows_from_value(Value::Null).unwrap().is_empty());
        assert!(rows_from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn embedded_relations_detected() {
        assert!(!SelectQuery::all().has_embedded_relations());
        assert!(SelectQuery::columns("*, surgeon:surgeons(full_name)").has_embedded_relations());
    }
}
