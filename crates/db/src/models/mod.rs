pub mod dashboard;
pub mod inventory;
pub mod manufacturer;
pub mod sales_opportunity;
pub mod surgery_case;
pub mod surgical_kit;

use serde::{Deserialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::source::{DataSourceError, Row};

/// Deserialize one source row into a tier-specific shape.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, DataSourceError> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}

/// `{ name }` projection used by embedded relations in joined selects.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NamedRef {
    pub id: Option<Uuid>,
    pub name: String,
}

/// Client-side text search over the fields a list screen shows.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;

    /// Case-insensitive substring match on any field; a blank query matches everything.
    fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}
