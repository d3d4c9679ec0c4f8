// SPDX-License-Identifier: MIT OR Apache-2.0
//! Poll scheduler (C4): per-adapter single-flight polling, staggered
//! starts, and exponential backoff on consecutive failures.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::Utc;
use review_error::ReviewError;
use review_pipeline::{Pipeline, PipelineSummary};
use review_sources::SourceAdapter;
use review_store::Store;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// Stagger applied between each enabled adapter's first poll (`spec.md` §4.3).
const STAGGER_STEP: Duration = Duration::from_secs(5);
/// Floor under every adapter's effective poll interval.
const MIN_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// Ceiling on the backoff-inflated interval.
const MAX_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Outcome of a single `poll_once` call.
#[derive(Debug, Clone, Serialize)]
pub struct PollOutcome {
    /// True if another poll of this source was already in flight and this
    /// call returned immediately without touching any state.
    pub skipped: bool,
    /// The fan-out summary, present unless `skipped` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PipelineSummary>,
}

/// Point-in-time state for one registered adapter, for `/api/ingestion/status`.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterStatus {
    /// Adapter tag.
    pub source: String,
    /// Whether the adapter initialized successfully and is pollable.
    pub enabled: bool,
    /// Consecutive failed polls since the last success.
    pub consecutive_failures: u32,
    /// This adapter's configured poll interval override, in minutes, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_minutes: Option<u64>,
}

struct AdapterEntry {
    adapter: Arc<dyn SourceAdapter>,
    lock: AsyncMutex<()>,
    consecutive_failures: AtomicU32,
    poll_interval_override: Option<Duration>,
}

/// Owns the adapter registry and drives scheduled polling; also serves
/// manual poll requests.
pub struct Scheduler {
    adapters: BTreeMap<String, AdapterEntry>,
    store: Store,
    pipeline: Arc<Pipeline>,
    global_interval: Duration,
}

impl Scheduler {
    /// Construct a scheduler over a set of adapters, keyed by name.
    ///
    /// `global_interval_minutes` is the configured floor from
    /// `ingestion.poll_interval_minutes`; per-adapter overrides, if any,
    /// still participate in the `max(adapter, global, 15 min)` floor.
    pub fn new(
        adapters: Vec<(Arc<dyn SourceAdapter>, Option<u64>)>,
        store: Store,
        pipeline: Arc<Pipeline>,
        global_interval_minutes: u64,
    ) -> Self {
        let mut map = BTreeMap::new();
        for (adapter, poll_interval_minutes) in adapters {
            let name = adapter.name().to_string();
            map.insert(
                name,
                AdapterEntry {
                    adapter,
                    lock: AsyncMutex::new(()),
                    consecutive_failures: AtomicU32::new(0),
                    poll_interval_override: poll_interval_minutes.map(|m| Duration::from_secs(m * 60)),
                },
            );
        }
        Self {
            adapters: map,
            store,
            pipeline,
            global_interval: Duration::from_secs(global_interval_minutes * 60),
        }
    }

    fn base_interval(&self, entry: &AdapterEntry) -> Duration {
        entry
            .poll_interval_override
            .unwrap_or(Duration::ZERO)
            .max(self.global_interval)
            .max(MIN_INTERVAL)
    }

    fn effective_interval(base: Duration, failures: u32) -> Duration {
        let mut interval = base.min(MAX_INTERVAL);
        for _ in 0..failures {
            if interval >= MAX_INTERVAL {
                return MAX_INTERVAL;
            }
            interval = interval.saturating_mul(2).min(MAX_INTERVAL);
        }
        interval
    }

    /// Per-adapter status snapshot, for `/api/ingestion/status`.
    pub fn status(&self) -> Vec<AdapterStatus> {
        self.adapters
            .values()
            .map(|entry| AdapterStatus {
                source: entry.adapter.name().to_string(),
                enabled: entry.adapter.enabled(),
                consecutive_failures: entry.consecutive_failures.load(Ordering::Acquire),
                poll_interval_minutes: entry.poll_interval_override.map(|d| d.as_secs() / 60),
            })
            .collect()
    }

    /// Run `initialize` on every registered adapter once, at startup.
    pub async fn initialize_all(&self) {
        for entry in self.adapters.values() {
            match entry.adapter.initialize().await {
                Ok(true) => info!(source = entry.adapter.name(), "adapter initialized"),
                Ok(false) => warn!(source = entry.adapter.name(), "adapter failed to initialize, left disabled"),
                Err(err) => error!(source = entry.adapter.name(), error = ?err, "adapter initialization errored"),
            }
        }
    }

    /// The `poll_once` contract (`spec.md` §4.3): validates the adapter,
    /// enforces single-flight, fetches, persists cursor/last-poll-time,
    /// feeds the pipeline, and updates the failure counter.
    pub async fn poll_once(&self, source: &str) -> Result<PollOutcome, ReviewError> {
        let entry = self
            .adapters
            .get(source)
            .ok_or_else(|| ReviewError::not_found("unknown adapter").with_context("source", source))?;

        if !entry.adapter.enabled() {
            return Err(ReviewError::not_found("unknown adapter").with_context("source", source));
        }

        let Ok(_guard) = entry.lock.try_lock() else {
            return Ok(PollOutcome { skipped: true, summary: None });
        };

        let cursor = self.store.get_cursor(source).await;
        let fetch_result = entry.adapter.fetch(cursor.as_deref()).await;
        self.store.set_last_poll_time(source, Utc::now()).await;

        match fetch_result {
            Ok((records, new_cursor)) => {
                if let Some(new_cursor) = new_cursor {
                    if Some(&new_cursor) != cursor.as_ref() {
                        self.store.set_cursor(source, new_cursor).await;
                    }
                }
                let summary = self.pipeline.process(records).await;
                entry.consecutive_failures.store(0, Ordering::Release);
                Ok(PollOutcome { skipped: false, summary: Some(summary) })
            }
            Err(err) => {
                entry.consecutive_failures.fetch_add(1, Ordering::AcqRel);
                Err(err)
            }
        }
    }

    /// Poll every enabled adapter once, returning each outcome keyed by
    /// source name. A single adapter's failure does not stop the others.
    pub async fn poll_all(&self) -> BTreeMap<String, Result<PollOutcome, ReviewError>> {
        let mut results = BTreeMap::new();
        for name in self.adapters.keys() {
            if !self.adapters[name].adapter.enabled() {
                continue;
            }
            results.insert(name.clone(), self.poll_once(name).await);
        }
        results
    }

    /// Spawn the background scheduling loop: staggered first polls, then
    /// repeated polling on each adapter's backoff-adjusted interval.
    /// Returns the spawned task handles so a caller can abort them on
    /// shutdown.
    pub fn spawn_background_polling(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        self.adapters
            .keys()
            .enumerate()
            .map(|(k, name)| {
                let scheduler = Arc::clone(self);
                let name = name.clone();
                let stagger = STAGGER_STEP * k as u32;
                tokio::spawn(async move {
                    tokio::time::sleep(stagger).await;
                    loop {
                        let failures_before = scheduler
                            .adapters
                            .get(&name)
                            .map(|e| e.consecutive_failures.load(Ordering::Acquire))
                            .unwrap_or(0);
                        let base = scheduler
                            .adapters
                            .get(&name)
                            .map(|e| scheduler.base_interval(e))
                            .unwrap_or(MIN_INTERVAL);

                        if let Err(err) = scheduler.poll_once(&name).await {
                            warn!(source = %name, error = ?err, "scheduled poll failed");
                        }

                        let failures_after = scheduler
                            .adapters
                            .get(&name)
                            .map(|e| e.consecutive_failures.load(Ordering::Acquire))
                            .unwrap_or(failures_before);
                        let sleep_for = Self::effective_interval(base, failures_after);
                        tokio::time::sleep(sleep_for).await;
                    }
                })
            })
            .collect()
    }
}
