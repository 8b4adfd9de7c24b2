//! Per-screen state machine binding tiered fetch results to an observable state.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use db::models::Searchable;
use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use ts_rs::TS;

use super::tiered_fetch::FetchOutcome;

/// Shown when a loader fails in a way the fetcher did not anticipate.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong while loading data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScreenPhase {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ScreenState<T> {
    pub phase: ScreenPhase,
    pub rows: Vec<T>,
    pub error_message: Option<String>,
    /// Strategy that served the current rows.
    pub served_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> ScreenState<T> {
    pub fn loading() -> Self {
        Self {
            phase: ScreenPhase::Loading,
            rows: Vec::new(),
            error_message: None,
            served_by: None,
            updated_at: None,
        }
    }

    pub fn success(rows: Vec<T>, served_by: String) -> Self {
        Self {
            phase: ScreenPhase::Success,
            rows,
            error_message: None,
            served_by: Some(served_by),
            updated_at: Some(Utc::now()),
        }
    }

    /// Error states never carry stale rows.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            phase: ScreenPhase::Error,
            rows: Vec::new(),
            error_message: Some(message.into()),
            served_by: None,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn from_outcome(outcome: FetchOutcome<T>) -> Self {
        match outcome {
            FetchOutcome::Rows { rows, strategy } => Self::success(rows, strategy),
            FetchOutcome::Unavailable { message, .. } => Self::error(message),
        }
    }
}

impl<T: Searchable + Clone> ScreenState<T> {
    /// Copy of the state keeping only rows matching `query`.
    pub fn filtered(&self, query: &str) -> Self {
        Self {
            phase: self.phase,
            rows: self
                .rows
                .iter()
                .filter(|row| row.matches(query))
                .cloned()
                .collect(),
            error_message: self.error_message.clone(),
            served_by: self.served_by.clone(),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Settled(ScreenPhase),
    /// A fetch for this screen was already in flight.
    Skipped,
    /// The screen was unmounted; any late result was discarded.
    Unmounted,
}

type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, FetchOutcome<T>> + Send + Sync>;

pub struct ScreenController<T> {
    name: String,
    loader: Loader<T>,
    state: watch::Sender<ScreenState<T>>,
    in_flight: AtomicBool,
    mounted: CancellationToken,
}

// Clears the in-flight flag even when the refresh future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T> ScreenController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchOutcome<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(ScreenState::loading());
        Self {
            name: name.into(),
            loader: Arc::new(move || loader().boxed()),
            state,
            in_flight: AtomicBool::new(false),
            mounted: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ScreenState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState<T>> {
        self.state.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        !self.mounted.is_cancelled()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Re-run the loader unless a fetch for this screen is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        if !self.is_mounted() {
            return RefreshOutcome::Unmounted;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(screen = %self.name, "Refresh skipped, fetch already in flight");
            return RefreshOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        self.state.send_modify(|state| {
            state.phase = ScreenPhase::Loading;
            state.error_message = None;
        });

        let loader = self.loader.clone();
        let result = AssertUnwindSafe(async move { loader().await })
            .catch_unwind()
            .await;

        if !self.is_mounted() {
            debug!(screen = %self.name, "Screen unmounted, discarding fetch result");
            return RefreshOutcome::Unmounted;
        }

        let next = match result {
            Ok(outcome) => ScreenState::from_outcome(outcome),
            Err(_) => {
                error!(screen = %self.name, "Screen loader panicked");
                ScreenState::error(GENERIC_ERROR_MESSAGE)
            }
        };
        let phase = next.phase;
        self.state.send_replace(next);
        RefreshOutcome::Settled(phase)
    }

    /// Stop accepting results and stop any polling loop.
    pub fn unmount(&self) {
        if self.is_mounted() {
            info!(screen = %self.name, "Screen unmounted");
        }
        self.mounted.cancel();
    }

    /// Refresh every `every` until unmounted. Ticks that land on an unsettled
    /// fetch are skipped rather than queued.
    pub fn spawn_polling(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            info!(
                screen = %controller.name,
                "Starting screen polling with interval {:?}", every
            );
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = controller.mounted.cancelled() => break,
                    _ = ticker.tick() => {
                        let refreshing = Arc::clone(&controller);
                        tokio::spawn(async move {
                            refreshing.refresh().await;
                        });
                    }
                }
            }
            debug!(screen = %controller.name, "Screen polling stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Kit(&'static str);

    impl Searchable for Kit {
        fn search_fields(&self) -> Vec<&str> {
            vec![self.0]
        }
    }

    fn rows(rows: Vec<Kit>) -> FetchOutcome<Kit> {
        FetchOutcome::Rows {
            rows,
            strategy: "select:surgical_kits".to_string(),
        }
    }

    #[tokio::test]
    async fn success_then_error_clears_rows() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let controller = ScreenController::new("surgical_kits", move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    rows(vec![Kit("Hip revision tray")])
                } else {
                    FetchOutcome::unavailable("surgical_kits")
                }
            }
        });
        assert_eq!(controller.state().phase, ScreenPhase::Loading);

        assert_eq!(
            controller.refresh().await,
            RefreshOutcome::Settled(ScreenPhase::Success)
        );
        let state = controller.state();
        assert_eq!(state.rows, vec![Kit("Hip revision tray")]);
        assert_eq!(state.served_by.as_deref(), Some("select:surgical_kits"));

        assert_eq!(
            controller.refresh().await,
            RefreshOutcome::Settled(ScreenPhase::Error)
        );
        let state = controller.state();
        assert!(state.rows.is_empty());
        assert_eq!(
            state.error_message.as_deref(),
            Some("surgical_kits is not configured yet")
        );
    }

    #[tokio::test]
    async fn empty_rows_are_success_not_error() {
        let controller = ScreenController::new("surgical_kits", || async { rows(Vec::new()) });
        controller.refresh().await;
        let state = controller.state();
        assert_eq!(state.phase, ScreenPhase::Success);
        assert!(state.rows.is_empty());
        assert!(state.error_message.is_none());
    }

    #[tokio::test]
    async fn panicking_loader_becomes_generic_error() {
        let controller: ScreenController<Kit> = ScreenController::new("surgical_kits", || async {
            let payload: Option<FetchOutcome<Kit>> = None;
            payload.expect("loader bug")
        });
        assert_eq!(
            controller.refresh().await,
            RefreshOutcome::Settled(ScreenPhase::Error)
        );
        assert_eq!(
            controller.state().error_message.as_deref(),
            Some(GENERIC_ERROR_MESSAGE)
        );
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn overlapping_refresh_is_skipped() {
        let release = Arc::new(Notify::new());
        let gate = release.clone();
        let controller = Arc::new(ScreenController::new("dashboard_kpis", move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                rows(vec![Kit("kpis")])
            }
        }));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.refresh().await })
        };
        while !controller.is_loading() {
            tokio::task::yield_now().await;
        }

        assert_eq!(controller.refresh().await, RefreshOutcome::Skipped);
        release.notify_one();
        assert_eq!(
            first.await.unwrap(),
            RefreshOutcome::Settled(ScreenPhase::Success)
        );
    }

    #[tokio::test]
    async fn unmounted_screen_ignores_late_result() {
        let release = Arc::new(Notify::new());
        let gate = release.clone();
        let controller = Arc::new(ScreenController::new("surgery_cases", move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                rows(vec![Kit("late")])
            }
        }));
        let mut updates = controller.subscribe();

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.refresh().await })
        };
        while !controller.is_loading() {
            tokio::task::yield_now().await;
        }
        controller.unmount();
        release.notify_one();

        assert_eq!(pending.await.unwrap(), RefreshOutcome::Unmounted);
        assert!(controller.state().rows.is_empty());
        assert_eq!(updates.borrow_and_update().phase, ScreenPhase::Loading);
        assert_eq!(controller.refresh().await, RefreshOutcome::Unmounted);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_repeats_until_unmounted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let controller = Arc::new(ScreenController::new("dashboard_kpis", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { rows(vec![Kit("kpis")]) }
        }));

        let handle = controller.spawn_polling(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(65)).await;
        controller.unmount();
        handle.await.unwrap();

        let seen = calls.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected at least 3 polls, saw {}", seen);
        assert_eq!(controller.state().phase, ScreenPhase::Success);
    }

    #[test]
    fn filtered_keeps_matching_rows() {
        let state = ScreenState::success(
            vec![Kit("Hip revision tray"), Kit("Knee primary tray")],
            "select:surgical_kits".to_string(),
        );
        let filtered = state.filtered("KNEE");
        assert_eq!(filtered.rows, vec![Kit("Knee primary tray")]);
        assert_eq!(filtered.phase, ScreenPhase::Success);
    }
}
