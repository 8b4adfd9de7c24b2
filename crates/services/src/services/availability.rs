//! Availability cache: remembers which remote resources have been confirmed
//! reachable (or not), in memory and mirrored into a persistent store.

use std::{collections::BTreeMap, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::kv_store::{KeyValueStore, MemoryStore};

/// Namespaced key under which the full mapping is persisted.
pub const AVAILABILITY_STORAGE_KEY: &str = "kitline.availability.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "state", content = "available", rename_all = "snake_case")]
pub enum AvailabilityState {
    /// Never probed in this cache generation.
    Unknown,
    /// A probe is running; other callers should not start another one.
    Probing,
    Known(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct AvailabilityRecord {
    pub resource_name: String,
    pub is_available: bool,
}

pub struct AvailabilityCache {
    entries: DashMap<String, AvailabilityState>,
    hydrated: OnceCell<()>,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for AvailabilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityCache")
            .field("entries", &self.entries.len())
            .field("hydrated", &self.hydrated.get().is_some())
            .finish()
    }
}

impl AvailabilityCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            entries: DashMap::new(),
            hydrated: OnceCell::new(),
            store,
        }
    }

    /// Cache backed by a process-local store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get(&self, resource: &str) -> Option<bool> {
        match self.state(resource) {
            AvailabilityState::Known(available) => Some(available),
            AvailabilityState::Unknown | AvailabilityState::Probing => None,
        }
    }

    pub fn state(&self, resource: &str) -> AvailabilityState {
        self.hydrate();
        self.entries
            .get(resource)
            .map(|entry| *entry.value())
            .unwrap_or(AvailabilityState::Unknown)
    }

    /// Claim the probe for `resource`. Returns `false` when the resource is
    /// already known or another caller is probing it.
    pub fn begin_probe(&self, resource: &str) -> bool {
        self.hydrate();
        match self.entries.entry(resource.to_string()) {
            Entry::Occupied(mut entry) => match *entry.get() {
                AvailabilityState::Unknown => {
                    entry.insert(AvailabilityState::Probing);
                    true
                }
                AvailabilityState::Probing | AvailabilityState::Known(_) => false,
            },
            Entry::Vacant(entry) => {
                entry.insert(AvailabilityState::Probing);
                true
            }
        }
    }

    /// Return a claimed but unfinished probe to `Unknown`.
    pub fn release_probe(&self, resource: &str) {
        self.entries
            .remove_if(resource, |_, state| *state == AvailabilityState::Probing);
    }

    pub fn set(&self, resource: &str, is_available: bool) {
        self.hydrate();
        self.entries
            .insert(resource.to_string(), AvailabilityState::Known(is_available));
        debug!(resource, is_available, "Availability recorded");
        self.persist();
    }

    /// Forget one resource, or every resource when `resource` is `None`.
    pub fn reset(&self, resource: Option<&str>) {
        self.hydrate();
        match resource {
            Some(resource) => {
                self.entries.remove(resource);
                info!(resource, "Availability cache entry reset");
                self.persist();
            }
            None => {
                self.entries.clear();
                info!("Availability cache reset");
                if let Err(e) = self.store.remove(AVAILABILITY_STORAGE_KEY) {
                    warn!(error = %e, "Failed to clear persisted availability cache");
                }
            }
        }
    }

    /// Known entries, ordered by resource name.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.hydrate();
        self.entries
            .iter()
            .filter_map(|entry| match entry.value() {
                AvailabilityState::Known(available) => Some((entry.key().clone(), *available)),
                _ => None,
            })
            .collect()
    }

    pub fn records(&self) -> Vec<AvailabilityRecord> {
        self.snapshot()
            .into_iter()
            .map(|(resource_name, is_available)| AvailabilityRecord {
                resource_name,
                is_available,
            })
            .collect()
    }

    fn hydrate(&self) {
        self.hydrated.get_or_init(|| {
            for (resource, available) in self.load_persisted() {
                self.entries
                    .entry(resource)
                    .or_insert(AvailabilityState::Known(available));
            }
        });
    }

    fn load_persisted(&self) -> BTreeMap<String, bool> {
        let raw = match self.store.get(AVAILABILITY_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted availability cache");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Persisted availability cache is corrupted, ignoring it");
            BTreeMap::new()
        })
    }

    // Best-effort: the cache is an optimisation, a failed write only costs a re-probe.
    fn persist(&self) {
        let snapshot = self.snapshot();
        let result = serde_json::to_string(&snapshot)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                self.store
                    .set(AVAILABILITY_STORAGE_KEY, &raw)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist availability cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::kv_store::KvStoreError;

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, KvStoreError> {
            Err(KvStoreError::Poisoned)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), KvStoreError> {
            Err(KvStoreError::Io(std::io::Error::other("quota exceeded")))
        }

        fn remove(&self, _key: &str) -> Result<(), KvStoreError> {
            Err(KvStoreError::Poisoned)
        }
    }

    #[test]
    fn set_is_idempotent_and_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = AvailabilityCache::new(store.clone());
        cache.set("surgery_cases", true);
        cache.set("surgery_cases", true);
        assert_eq!(cache.get("surgery_cases"), Some(true));

        let reloaded = AvailabilityCache::new(store);
        assert_eq!(reloaded.get("surgery_cases"), Some(true));
        assert_eq!(reloaded.get("manufacturers"), None);
    }

    #[test]
    fn reset_one_keeps_the_others() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = AvailabilityCache::new(store.clone());
        cache.set("sales_opportunities", false);
        cache.set("surgical_kits", true);

        cache.reset(Some("sales_opportunities"));
        assert_eq!(cache.get("sales_opportunities"), None);
        assert_eq!(cache.get("surgical_kits"), Some(true));

        let reloaded = AvailabilityCache::new(store.clone());
        assert_eq!(reloaded.get("sales_opportunities"), None);
        assert_eq!(reloaded.get("surgical_kits"), Some(true));

        cache.reset(None);
        assert!(cache.snapshot().is_empty());
        assert!(store.get(AVAILABILITY_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn corrupted_record_is_a_cache_miss() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(AVAILABILITY_STORAGE_KEY, "{not json").unwrap();

        let cache = AvailabilityCache::new(store.clone());
        assert_eq!(cache.get("surgery_cases"), None);

        cache.set("surgery_cases", false);
        let reloaded = AvailabilityCache::new(store);
        assert_eq!(reloaded.get("surgery_cases"), Some(false));
    }

    #[test]
    fn store_failures_are_swallowed() {
        let cache = AvailabilityCache::new(Arc::new(FailingStore));
        cache.set("inventory_items", true);
        assert_eq!(cache.get("inventory_items"), Some(true));
        cache.reset(None);
        assert_eq!(cache.get("inventory_items"), None);
    }

    #[test]
    fn probe_claim_is_exclusive() {
        let cache = AvailabilityCache::in_memory();
        assert!(cache.begin_probe("manufacturers"));
        assert_eq!(cache.state("manufacturers"), AvailabilityState::Probing);
        assert!(!cache.begin_probe("manufacturers"));
        assert_eq!(cache.get("manufacturers"), None);

        cache.release_probe("manufacturers");
        assert_eq!(cache.state("manufacturers"), AvailabilityState::Unknown);
        assert!(cache.begin_probe("manufacturers"));

        cache.set("manufacturers", true);
        cache.release_probe("manufacturers");
        assert!(!cache.begin_probe("manufacturers"));
        assert_eq!(cache.state("manufacturers"), AvailabilityState::Known(true));
    }

    #[test]
    fn probing_entries_are_not_persisted() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = AvailabilityCache::new(store.clone());
        cache.begin_probe("dashboard_kpis");
        cache.set("surgical_kits", true);

        let raw = store.get(AVAILABILITY_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"{"surgical_kits":true}"#);
    }
}
