//! One-shot reachability check for a remote resource.

use std::{panic::AssertUnwindSafe, sync::Arc};

use db::source::DataSource;
use futures::FutureExt;
use tracing::{debug, warn};

/// Issues a single-row, join-free select and reports whether it succeeded.
///
/// The probe never records its result; callers feed it into the availability cache.
#[derive(Clone)]
pub struct TableProbe {
    source: Arc<dyn DataSource>,
}

impl TableProbe {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub async fn probe(&self, resource: &str) -> bool {
        match AssertUnwindSafe(self.source.probe_rows(resource))
            .catch_unwind()
            .await
        {
            Ok(Ok(rows)) => {
                debug!(resource, rows = rows.len(), "Table probe succeeded");
                true
            }
            Ok(Err(e)) => {
                debug!(
                    resource,
                    error = %e,
                    missing = e.is_missing_resource(),
                    "Table probe failed"
                );
                false
            }
            Err(_) => {
                warn!(resource, "Table probe panicked, treating resource as unavailable");
                false
            }
        }
    }
}
