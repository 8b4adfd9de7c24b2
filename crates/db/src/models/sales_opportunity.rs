use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::Searchable;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpportunityStage {
    #[default]
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
    #[serde(other)]
    Unknown,
}

/// Opportunity on the sales pipeline screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct SalesOpportunity {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub stage: OpportunityStage,
    pub amount: Option<f64>,
    pub probability: Option<i64>,
    pub expected_close_date: Option<NaiveDate>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
}

/// Flat row from the `sales_opportunities` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesOpportunityRecord {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub stage: OpportunityStage,
    pub amount: Option<f64>,
    pub probability: Option<i64>,
    pub expected_close_date: Option<NaiveDate>,
}

impl From<SalesOpportunityRecord> for SalesOpportunity {
    fn from(record: SalesOpportunityRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            stage: record.stage,
            amount: record.amount,
            probability: record.probability,
            expected_close_date: record.expected_close_date,
            account_name: None,
            owner_name: None,
        }
    }
}

impl Searchable for SalesOpportunity {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        fields.extend(self.account_name.as_deref());
        fields.extend(self.owner_name.as_deref());
        fields
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::from_row;

    #[test]
    fn raw_row_leaves_joined_fields_empty() {
        let row = json!({
            "id": "3f9c2a1e-7b4d-4e8f-a6c5-2d1b0e9f8a7c",
            "title": "Spine implants - Mercy West",
            "stage": "negotiation_pending_legal",
            "amount": 200000.0,
            "probability": 40,
            "expected_close_date": "2026-11-30"
        })
        .as_object()
        .cloned()
        .unwrap();

        let opportunity: SalesOpportunity = from_row::<SalesOpportunityRecord>(row).unwrap().into();
        assert_eq!(opportunity.stage, OpportunityStage::Unknown);
        assert_eq!(opportunity.amount, Some(200000.0));
        assert!(opportunity.account_name.is_none());
        assert!(opportunity.owner_name.is_none());
    }
}
