use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::Searchable;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct InventoryItem {
    pub id: Uuid,
    pub sku: String,
    pub description: String,
    pub quantity_on_hand: i64,
    pub reorder_level: Option<i64>,
    pub lot_number: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
}

/// Flat row from the `inventory_items` table.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryItemRecord {
    pub id: Uuid,
    pub sku: String,
    pub description: String,
    pub quantity_on_hand: i64,
    pub reorder_level: Option<i64>,
    pub lot_number: Option<String>,
    pub expiration_date: Option<NaiveDate>,
}

impl From<InventoryItemRecord> for InventoryItem {
    fn from(record: InventoryItemRecord) -> Self {
        Self {
            id: record.id,
            sku: record.sku,
            description: record.description,
            quantity_on_hand: record.quantity_on_hand,
            reorder_level: record.reorder_level,
            lot_number: record.lot_number,
            expiration_date: record.expiration_date,
            manufacturer_name: None,
        }
    }
}

impl InventoryItem {
    pub fn needs_reorder(&self) -> bool {
        self.reorder_level
            .map(|level| self.quantity_on_hand <= level)
            .unwrap_or(false)
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date.map(|date| date < today).unwrap_or(false)
    }
}

impl Searchable for InventoryItem {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.sku.as_str(), self.description.as_str()];
        fields.extend(self.lot_number.as_deref());
        fields.extend(self.manufacturer_name.as_deref());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity_on_hand: i64, reorder_level: Option<i64>) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            sku: "ACL-SCR-7X25".to_string(),
            description: "Interference screw 7x25mm".to_string(),
            quantity_on_hand,
            reorder_level,
            lot_number: Some("L2291".to_string()),
            expiration_date: NaiveDate::from_ymd_opt(2026, 1, 31),
            manufacturer_name: None,
        }
    }

    #[test]
    fn reorder_threshold_is_inclusive() {
        assert!(item(5, Some(5)).needs_reorder());
        assert!(!item(6, Some(5)).needs_reorder());
        assert!(!item(0, None).needs_reorder());
    }

    #[test]
    fn expiry_compares_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert!(item(1, None).is_expired(today));
        assert!(item(1, None).matches("l2291"));
    }
}
