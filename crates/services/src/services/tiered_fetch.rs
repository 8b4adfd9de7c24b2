//! Ordered fallback across data-access strategies for one logical dataset.

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use db::{
    models::from_row,
    source::{DataSource, DataSourceError, Row, SelectQuery},
};
use futures::{FutureExt, future::BoxFuture};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    availability::{AvailabilityCache, AvailabilityState},
    probe::TableProbe,
};

type Execute<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<Vec<T>, DataSourceError>> + Send + 'a>;

/// One strategy for loading a dataset, already shaped to the canonical row type `T`.
pub struct FetchAttempt<'a, T> {
    strategy_name: String,
    execute: Execute<'a, T>,
}

impl<'a, T: Send + 'a> FetchAttempt<'a, T> {
    pub fn new<F, Fut>(strategy_name: impl Into<String>, execute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<Vec<T>, DataSourceError>> + Send + 'a,
    {
        Self {
            strategy_name: strategy_name.into(),
            execute: Box::new(move || execute().boxed()),
        }
    }

    /// Strategy returning raw rows, shaped through the tier-specific type `R`.
    pub fn shaped<R, F, Fut>(strategy_name: impl Into<String>, execute: F) -> Self
    where
        R: DeserializeOwned + Into<T>,
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<Vec<Row>, DataSourceError>> + Send + 'a,
    {
        Self::new(strategy_name, move || async move {
            execute()
                .await?
                .into_iter()
                .map(|row| from_row::<R>(row).map(Into::into))
                .collect()
        })
    }

    /// Remote procedure tier.
    pub fn procedure<R>(source: Arc<dyn DataSource>, name: &'a str, args: Value) -> Self
    where
        R: DeserializeOwned + Into<T>,
    {
        Self::shaped::<R, _, _>(format!("rpc:{}", name), move || async move {
            source.call_procedure(name, args).await
        })
    }

    /// Table or view tier.
    pub fn select<R>(source: Arc<dyn DataSource>, resource: &'a str, query: SelectQuery) -> Self
    where
        R: DeserializeOwned + Into<T>,
    {
        let strategy = if query.has_embedded_relations() {
            format!("join:{}", resource)
        } else {
            format!("select:{}", resource)
        };
        Self::shaped::<R, _, _>(strategy, move || async move {
            source.select(resource, &query).await
        })
    }

    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// A tier succeeded; zero rows is still a success.
    Rows { rows: Vec<T>, strategy: String },
    /// Terminal: no tier could serve the dataset.
    Unavailable { resource: String, message: String },
}

impl<T> FetchOutcome<T> {
    pub fn unavailable(resource: &str) -> Self {
        Self::Unavailable {
            resource: resource.to_string(),
            message: format!("{} is not configured yet", resource),
        }
    }

    pub fn rows(&self) -> Option<&[T]> {
        match self {
            Self::Rows { rows, .. } => Some(rows),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Runs fetch attempts richest-first, consulting and updating the availability cache.
#[derive(Clone)]
pub struct TieredFetcher {
    cache: Arc<AvailabilityCache>,
    probe: Option<TableProbe>,
}

impl TieredFetcher {
    pub fn new(cache: Arc<AvailabilityCache>) -> Self {
        Self { cache, probe: None }
    }

    /// Probe unknown resources once before running their tiers. A reachable
    /// table marks the resource available; an unreachable one changes nothing.
    pub fn with_probe(mut self, probe: TableProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub async fn fetch<'a, T: Send + 'a>(
        &self,
        resource: &str,
        attempts: Vec<FetchAttempt<'a, T>>,
    ) -> FetchOutcome<T> {
        match self.cache.state(resource) {
            AvailabilityState::Known(false) => {
                debug!(resource, "Resource known unavailable, skipping all tiers");
                return FetchOutcome::unavailable(resource);
            }
            AvailabilityState::Unknown => {
                if let Some(probe) = &self.probe {
                    if self.cache.begin_probe(resource) {
                        let claim = ProbeClaim {
                            cache: &self.cache,
                            resource,
                        };
                        // A failed probe never gates the tiers.
                        if probe.probe(resource).await {
                            self.cache.set(resource, true);
                        } else {
                            debug!(resource, "Raw table unreachable, trying every tier");
                        }
                        drop(claim);
                    }
                }
            }
            AvailabilityState::Probing | AvailabilityState::Known(true) => {}
        }

        let tier_count = attempts.len();
        for (index, attempt) in attempts.into_iter().enumerate() {
            let FetchAttempt {
                strategy_name,
                execute,
            } = attempt;

            let result = AssertUnwindSafe(async move { execute().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(DataSourceError::Unsupported(
                        "fetch strategy panicked".to_string(),
                    ))
                });

            match result {
                Ok(rows) => {
                    if self.cache.get(resource) != Some(true) {
                        self.cache.set(resource, true);
                    }
                    info!(
                        resource,
                        strategy = %strategy_name,
                        tier = index + 1,
                        rows = rows.len(),
                        "Dataset loaded"
                    );
                    return FetchOutcome::Rows {
                        rows,
                        strategy: strategy_name,
                    };
                }
                Err(e) => {
                    debug!(
                        resource,
                        strategy = %strategy_name,
                        tier = index + 1,
                        tiers = tier_count,
                        error = %e,
                        "Fetch tier failed, falling back"
                    );
                }
            }
        }

        warn!(
            resource,
            tiers = tier_count,
            "All fetch tiers failed, marking resource unavailable"
        );
        self.cache.set(resource, false);
        FetchOutcome::unavailable(resource)
    }
}

// Releases the probe claim if the fetch is dropped before the probe settles.
struct ProbeClaim<'c> {
    cache: &'c AvailabilityCache,
    resource: &'c str,
}

impl Drop for ProbeClaim<'_> {
    fn drop(&mut self) {
        self.cache.release_probe(self.resource);
    }
}
