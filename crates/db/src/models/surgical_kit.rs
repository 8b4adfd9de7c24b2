use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::Searchable;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KitStatus {
    #[default]
    Available,
    Assigned,
    InTransit,
    Sterilizing,
    Maintenance,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct SurgicalKit {
    pub id: Uuid,
    pub kit_code: String,
    pub name: String,
    #[serde(default)]
    pub status: KitStatus,
    pub location: Option<String>,
    #[serde(default)]
    pub item_count: Option<i64>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
}

/// Flat row from the `surgical_kits` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SurgicalKitRecord {
    pub id: Uuid,
    pub kit_code: String,
    pub name: String,
    #[serde(default)]
    pub status: KitStatus,
    pub location: Option<String>,
}

impl From<SurgicalKitRecord> for SurgicalKit {
    fn from(record: SurgicalKitRecord) -> Self {
        Self {
            id: record.id,
            kit_code: record.kit_code,
            name: record.name,
            status: record.status,
            location: record.location,
            item_count: None,
            manufacturer_name: None,
        }
    }
}

impl Searchable for SurgicalKit {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.kit_code.as_str(), self.name.as_str()];
        fields.extend(self.location.as_deref());
        fields.extend(self.manufacturer_name.as_deref());
        fields
    }
}
