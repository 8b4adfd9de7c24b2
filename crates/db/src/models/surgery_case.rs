use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{NamedRef, Searchable};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Surgery case as shown on the case scheduling screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct SurgeryCase {
    pub id: Uuid,
    pub case_number: String,
    pub procedure_name: String,
    pub surgery_date: NaiveDate,
    #[serde(default)]
    pub status: CaseStatus,
    pub hospital_id: Option<Uuid>,
    #[serde(default)]
    pub hospital_name: Option<String>,
    pub surgeon_id: Option<Uuid>,
    #[serde(default)]
    pub surgeon_name: Option<String>,
    #[serde(default)]
    pub kit_count: Option<i64>,
}

/// Flat row from the `surgery_cases` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SurgeryCaseRecord {
    pub id: Uuid,
    pub case_number: String,
    pub procedure_name: String,
    pub surgery_date: NaiveDate,
    #[serde(default)]
    pub status: CaseStatus,
    pub hospital_id: Option<Uuid>,
    pub surgeon_id: Option<Uuid>,
}

/// Row from a select that embeds `hospital:hospitals(...)` and `surgeon:surgeons(...)`.
#[derive(Debug, Clone, Deserialize)]
pub struct SurgeryCaseJoined {
    #[serde(flatten)]
    pub record: SurgeryCaseRecord,
    pub hospital: Option<NamedRef>,
    pub surgeon: Option<NamedRef>,
    #[serde(default)]
    pub case_kits: Vec<serde_json::Value>,
}

impl From<SurgeryCaseRecord> for SurgeryCase {
    fn from(record: SurgeryCaseRecord) -> Self {
        Self {
            id: record.id,
            case_number: record.case_number,
            procedure_name: record.procedure_name,
            surgery_date: record.surgery_date,
            status: record.status,
            hospital_id: record.hospital_id,
            hospital_name: None,
            surgeon_id: record.surgeon_id,
            surgeon_name: None,
            kit_count: None,
        }
    }
}

impl From<SurgeryCaseJoined> for SurgeryCase {
    fn from(joined: SurgeryCaseJoined) -> Self {
        let kit_count = joined.case_kits.len() as i64;
        Self {
            hospital_name: joined.hospital.map(|h| h.name),
            surgeon_name: joined.surgeon.map(|s| s.name),
            kit_count: Some(kit_count),
            ..Self::from(joined.record)
        }
    }
}

impl Searchable for SurgeryCase {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.case_number.as_str(), self.procedure_name.as_str()];
        fields.extend(self.hospital_name.as_deref());
        fields.extend(self.surgeon_name.as_deref());
        fields
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::from_row;

    fn base_row() -> serde_json::Value {
        json!({
            "id": "7d9f4a52-3c1e-4b8a-9f0d-2e6c5b4a3d21",
            "case_number": "SC-1042",
            "procedure_name": "Total knee arthroplasty",
            "surgery_date": "2026-10-20",
            "status": "confirmed",
            "hospital_id": null,
            "surgeon_id": null
        })
    }

    #[test]
    fn joined_row_flattens_relations() {
        let mut row = base_row();
        row["hospital"] = json!({"id": null, "name": "St. Mary's"});
        row["surgeon"] = json!({"id": null, "name": "Dr. Okafor"});
        row["case_kits"] = json!([{"kit_id": 1}, {"kit_id": 2}]);

        let joined: SurgeryCaseJoined = from_row(row.as_object().unwrap().clone()).unwrap();
        let case = SurgeryCase::from(joined);
        assert_eq!(case.hospital_name.as_deref(), Some("St. Mary's"));
        assert_eq!(case.surgeon_name.as_deref(), Some("Dr. Okafor"));
        assert_eq!(case.kit_count, Some(2));
        assert_eq!(case.status, CaseStatus::Confirmed);
    }

    #[test]
    fn flat_row_leaves_joined_fields_empty() {
        let record: SurgeryCaseRecord = from_row(base_row().as_object().unwrap().clone()).unwrap();
        let case = SurgeryCase::from(record);
        assert!(case.hospital_name.is_none());
        assert!(case.kit_count.is_none());
    }

    #[test]
    fn unknown_status_does_not_fail_the_row() {
        let mut row = base_row();
        row["status"] = json!("on_hold");
        let record: SurgeryCaseRecord = from_row(row.as_object().unwrap().clone()).unwrap();
        assert_eq!(record.status, CaseStatus::Unknown);
    }

    #[test]
    fn search_covers_names() {
        let mut row = base_row();
        row["surgeon_name"] = json!("Dr. Okafor");
        let case: SurgeryCase = from_row(row.as_object().unwrap().clone()).unwrap();
        assert!(case.matches("okafor"));
        assert!(case.matches("SC-10"));
        assert!(case.matches("  "));
        assert!(!case.matches("hip"));
    }
}
