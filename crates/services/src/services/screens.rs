//! Tier catalogue for each ERP screen and the registry that owns their controllers.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use db::{
    models::{
        Searchable,
        dashboard::DashboardKpis,
        inventory::{InventoryItem, InventoryItemRecord},
        manufacturer::Manufacturer,
        sales_opportunity::{SalesOpportunity, SalesOpportunityRecord},
        surgery_case::{SurgeryCase, SurgeryCaseJoined, SurgeryCaseRecord},
        surgical_kit::{SurgicalKit, SurgicalKitRecord},
    },
    source::{DataSource, Direction, SelectQuery},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tokio::task::JoinHandle;
use ts_rs::TS;

use super::{
    screen::{RefreshOutcome, ScreenController},
    tiered_fetch::{FetchAttempt, TieredFetcher},
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    TS,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScreenKind {
    SurgeryCases,
    SalesPipeline,
    SurgicalKits,
    Inventory,
    Manufacturers,
    Dashboard,
}

impl ScreenKind {
    /// Logical dataset name used as the availability cache key.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::SurgeryCases => "surgery_cases",
            Self::SalesPipeline => "sales_opportunities",
            Self::SurgicalKits => "surgical_kits",
            Self::Inventory => "inventory_items",
            Self::Manufacturers => "manufacturers",
            Self::Dashboard => "dashboard_kpis",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SurgeryCases => "Surgery cases",
            Self::SalesPipeline => "Sales pipeline",
            Self::SurgicalKits => "Surgical kits",
            Self::Inventory => "Inventory",
            Self::Manufacturers => "Manufacturers",
            Self::Dashboard => "Dashboard",
        }
    }
}

/// Tiers for the surgery case schedule, richest first.
pub fn surgery_case_tiers(source: &Arc<dyn DataSource>) -> Vec<FetchAttempt<'static, SurgeryCase>> {
    vec![
        FetchAttempt::procedure::<SurgeryCase>(
            source.clone(),
            "get_surgery_cases_enriched",
            json!({}),
        ),
        FetchAttempt::select::<SurgeryCaseJoined>(
            source.clone(),
            "surgery_cases",
            SelectQuery::columns(
                "*, hospital:hospitals(id, name), surgeon:surgeons(id, name), case_kits(kit_id)",
            )
            .order_by("surgery_date", Direction::Desc),
        ),
        FetchAttempt::select::<SurgeryCaseRecord>(
            source.clone(),
            "surgery_cases",
            SelectQuery::all().order_by("surgery_date", Direction::Desc),
        ),
    ]
}

pub fn sales_pipeline_tiers(
    source: &Arc<dyn DataSource>,
) -> Vec<FetchAttempt<'static, SalesOpportunity>> {
    vec![
        FetchAttempt::procedure::<SalesOpportunity>(
            source.clone(),
            "get_sales_pipeline",
            json!({}),
        ),
        FetchAttempt::select::<SalesOpportunityRecord>(
            source.clone(),
            "sales_opportunities",
            SelectQuery::all().order_by("expected_close_date", Direction::Asc),
        ),
    ]
}

pub fn surgical_kit_tiers(source: &Arc<dyn DataSource>) -> Vec<FetchAttempt<'static, SurgicalKit>> {
    vec![
        FetchAttempt::select::<SurgicalKit>(
            source.clone(),
            "surgical_kits_with_contents",
            SelectQuery::all().order_by("kit_code", Direction::Asc),
        ),
        FetchAttempt::select::<SurgicalKitRecord>(
            source.clone(),
            "surgical_kits",
            SelectQuery::all().order_by("kit_code", Direction::Asc),
        ),
    ]
}

pub fn inventory_tiers(source: &Arc<dyn DataSource>) -> Vec<FetchAttempt<'static, InventoryItem>> {
    vec![
        FetchAttempt::select::<InventoryItem>(
            source.clone(),
            "inventory_with_manufacturer",
            SelectQuery::all().order_by("sku", Direction::Asc),
        ),
        FetchAttempt::select::<InventoryItemRecord>(
            source.clone(),
            "inventory_items",
            SelectQuery::all().order_by("sku", Direction::Asc),
        ),
    ]
}

pub fn manufacturer_tiers(
    source: &Arc<dyn DataSource>,
) -> Vec<FetchAttempt<'static, Manufacturer>> {
    vec![FetchAttempt::select::<Manufacturer>(
        source.clone(),
        "manufacturers",
        SelectQuery::all().order_by("name", Direction::Asc),
    )]
}

pub fn dashboard_tiers(source: &Arc<dyn DataSource>) -> Vec<FetchAttempt<'static, DashboardKpis>> {
    vec![
        FetchAttempt::procedure::<DashboardKpis>(source.clone(), "get_dashboard_kpis", json!({})),
        FetchAttempt::select::<DashboardKpis>(
            source.clone(),
            "dashboard_kpis",
            SelectQuery::all().limit(1),
        ),
    ]
}

fn controller<T, F>(
    kind: ScreenKind,
    source: Arc<dyn DataSource>,
    fetcher: TieredFetcher,
    tiers: F,
) -> Arc<ScreenController<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&Arc<dyn DataSource>) -> Vec<FetchAttempt<'static, T>> + Send + Sync + 'static,
{
    Arc::new(ScreenController::new(kind.to_string(), move || {
        let attempts = tiers(&source);
        let fetcher = fetcher.clone();
        async move { fetcher.fetch(kind.resource(), attempts).await }
    }))
}

/// Type-erased view of a screen controller for callers that only need JSON.
#[async_trait]
pub trait ScreenHandle: Send + Sync {
    fn kind(&self) -> ScreenKind;

    /// Current state, with rows filtered by `query` when given.
    fn snapshot_json(&self, query: Option<&str>) -> Result<Value, serde_json::Error>;

    async fn reload(&self) -> RefreshOutcome;

    fn close(&self);
}

struct TypedScreen<T> {
    kind: ScreenKind,
    controller: Arc<ScreenController<T>>,
}

#[async_trait]
impl<T> ScreenHandle for TypedScreen<T>
where
    T: Serialize + Searchable + Clone + Send + Sync + 'static,
{
    fn kind(&self) -> ScreenKind {
        self.kind
    }

    fn snapshot_json(&self, query: Option<&str>) -> Result<Value, serde_json::Error> {
        let state = self.controller.state();
        match query {
            Some(query) => serde_json::to_value(state.filtered(query)),
            None => serde_json::to_value(state),
        }
    }

    async fn reload(&self) -> RefreshOutcome {
        self.controller.refresh().await
    }

    fn close(&self) {
        self.controller.unmount();
    }
}

/// One controller per screen, all sharing the same fetcher and availability cache.
pub struct ScreenRegistry {
    screens: BTreeMap<ScreenKind, Arc<dyn ScreenHandle>>,
    dashboard: Arc<ScreenController<DashboardKpis>>,
}

impl ScreenRegistry {
    pub fn new(source: Arc<dyn DataSource>, fetcher: TieredFetcher) -> Self {
        let dashboard = controller(
            ScreenKind::Dashboard,
            source.clone(),
            fetcher.clone(),
            dashboard_tiers,
        );

        let mut screens: BTreeMap<ScreenKind, Arc<dyn ScreenHandle>> = BTreeMap::new();
        screens.insert(
            ScreenKind::SurgeryCases,
            Arc::new(TypedScreen {
                kind: ScreenKind::SurgeryCases,
                controller: controller(
                    ScreenKind::SurgeryCases,
                    source.clone(),
                    fetcher.clone(),
                    surgery_case_tiers,
                ),
            }),
        );
        screens.insert(
            ScreenKind::SalesPipeline,
            Arc::new(TypedScreen {
                kind: ScreenKind::SalesPipeline,
                controller: controller(
                    ScreenKind::SalesPipeline,
                    source.clone(),
                    fetcher.clone(),
                    sales_pipeline_tiers,
                ),
            }),
        );
        screens.insert(
            ScreenKind::SurgicalKits,
            Arc::new(TypedScreen {
                kind: ScreenKind::SurgicalKits,
                controller: controller(
                    ScreenKind::SurgicalKits,
                    source.clone(),
                    fetcher.clone(),
                    surgical_kit_tiers,
                ),
            }),
        );
        screens.insert(
            ScreenKind::Inventory,
            Arc::new(TypedScreen {
                kind: ScreenKind::Inventory,
                controller: controller(
                    ScreenKind::Inventory,
                    source.clone(),
                    fetcher.clone(),
                    inventory_tiers,
                ),
            }),
        );
        screens.insert(
            ScreenKind::Manufacturers,
            Arc::new(TypedScreen {
                kind: ScreenKind::Manufacturers,
                controller: controller(
                    ScreenKind::Manufacturers,
                    source,
                    fetcher.clone(),
                    manufacturer_tiers,
                ),
            }),
        );
        screens.insert(
            ScreenKind::Dashboard,
            Arc::new(TypedScreen {
                kind: ScreenKind::Dashboard,
                controller: dashboard.clone(),
            }),
        );

        Self {
            screens,
            dashboard,
        }
    }

    pub fn get(&self, kind: ScreenKind) -> Option<Arc<dyn ScreenHandle>> {
        self.screens.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ScreenKind> {
        ScreenKind::iter()
            .filter(|kind| self.screens.contains_key(kind))
            .collect()
    }

    /// Load every screen once, e.g. at startup.
    pub async fn refresh_all(&self) -> BTreeMap<ScreenKind, RefreshOutcome> {
        let mut outcomes = BTreeMap::new();
        for (kind, screen) in &self.screens {
            outcomes.insert(*kind, screen.reload().await);
        }
        outcomes
    }

    /// Start the dashboard KPI poller; the only screen that refreshes on a timer.
    pub fn start_dashboard_polling(&self, every: Duration) -> JoinHandle<()> {
        self.dashboard.spawn_polling(every)
    }

    pub fn dashboard(&self) -> &Arc<ScreenController<DashboardKpis>> {
        &self.dashboard
    }

    pub fn unmount_all(&self) {
        for screen in self.screens.values() {
            screen.close();
        }
    }
}
