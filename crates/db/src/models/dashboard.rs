use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::Searchable;

/// Single-row KPI summary for the dashboard panel.
///
/// Every counter is required so a payload of another shape fails the tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct DashboardKpis {
    pub cases_this_week: i64,
    pub open_opportunities: i64,
    pub pipeline_value: f64,
    pub kits_available: i64,
    pub low_stock_items: i64,
}

impl Searchable for DashboardKpis {
    fn search_fields(&self) -> Vec<&str> {
        Vec::new()
    }

    fn matches(&self, _query: &str) -> bool {
        true
    }
}
