//! Wiring of data source, availability cache and screen controllers.

use std::{fs, path::Path, sync::Arc};

use db::{DBService, source::DataSource};
use services::services::{
    availability::AvailabilityCache,
    config::{BackendConfig, CacheLocation, Config},
    kv_store::{FileStore, KeyValueStore, MemoryStore},
    probe::TableProbe,
    remote_client::RemoteClient,
    screens::ScreenRegistry,
    tiered_fetch::TieredFetcher,
};
use strum_macros::Display;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    DataSource(#[from] db::source::DataSourceError),
    #[error("failed to create data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Where screen data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SourceMode {
    Hosted,
    Offline,
}

#[derive(Clone)]
pub struct Deployment {
    mode: SourceMode,
    cache: Arc<AvailabilityCache>,
    registry: Arc<ScreenRegistry>,
}

impl Deployment {
    pub async fn new(config: Config) -> Result<Self, DeploymentError> {
        let (mode, source): (SourceMode, Arc<dyn DataSource>) = match config.backend {
            Some(BackendConfig {
                url,
                api_key,
                request_timeout,
            }) => {
                info!(url = %url, "Using hosted backend");
                let client = RemoteClient::new(&url, api_key, request_timeout)?;
                (SourceMode::Hosted, Arc::new(client))
            }
            None => {
                ensure_parent_dir(&config.database_url)?;
                info!(database_url = %config.database_url, "Using offline database");
                let db = DBService::new(&config.database_url).await?;
                (SourceMode::Offline, Arc::new(db))
            }
        };

        let store: Arc<dyn KeyValueStore> = match config.cache {
            CacheLocation::Memory => Arc::new(MemoryStore::new()),
            CacheLocation::File(path) => {
                info!(path = %path.display(), "Persisting availability cache");
                Arc::new(FileStore::new(path))
            }
        };
        let cache = Arc::new(AvailabilityCache::new(store));

        Ok(Self::from_parts(
            mode,
            source,
            cache,
            config.probe_before_fetch,
        ))
    }

    /// Assemble a deployment around an existing source and cache.
    pub fn from_parts(
        mode: SourceMode,
        source: Arc<dyn DataSource>,
        cache: Arc<AvailabilityCache>,
        probe_before_fetch: bool,
    ) -> Self {
        let mut fetcher = TieredFetcher::new(cache.clone());
        if probe_before_fetch {
            fetcher = fetcher.with_probe(TableProbe::new(source.clone()));
        }
        let registry = Arc::new(ScreenRegistry::new(source, fetcher));
        Self {
            mode,
            cache,
            registry,
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn cache(&self) -> &Arc<AvailabilityCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ScreenRegistry> {
        &self.registry
    }
}

// SQLite creates the file but not its directory.
fn ensure_parent_dir(database_url: &str) -> std::io::Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_directory_for_file_databases() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("offline.sqlite");
        ensure_parent_dir(&format!("sqlite://{}", db_path.display())).unwrap();
        assert!(db_path.parent().unwrap().is_dir());
    }

    #[test]
    fn ignores_memory_databases() {
        ensure_parent_dir("sqlite::memory:").unwrap();
    }
}
