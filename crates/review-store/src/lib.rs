// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced, file-backed persistent store for review records (C2).
//!
//! Mutating calls update the in-memory document and mark it dirty; a
//! background task flushes to disk on a fixed interval rather than on
//! every call, going through a temp file and a `.bak` copy of the
//! previous version so a crash mid-write never loses the last good
//! document. [`Store::shutdown`] forces a final synchronous flush.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;

use chrono::{DateTime, Utc};
use review_core::{ProcessingFlags, ReviewRecord};
use review_error::ReviewError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info};

pub use document::StoreDocument;

/// How often the background flush task checks for unsaved changes.
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum number of records [`Store::recent`] will return in one call.
pub const MAX_RECENT_LIMIT: usize = 200;

/// Aggregate counts returned by [`Store::stats`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    /// Total number of stored records.
    pub total: usize,
    /// Count of records per `source` tag.
    pub by_source: BTreeMap<String, usize>,
    /// Count of records with `image_generated = true`.
    pub image_generated: usize,
    /// Count of records with `chat_shared = true`.
    pub chat_shared: usize,
}

struct Inner {
    document: Mutex<StoreDocument>,
    path: PathBuf,
    dirty: AtomicBool,
    notify: Notify,
}

/// Handle to the persistent store. Cheaply `Clone`-able; every clone
/// shares the same in-memory document and the same background flush
/// task.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Open (or create) the store document at `path` and start the
    /// background flush task.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ReviewError> {
        let path = path.into();
        let loaded = document::load_or_default(&path).await?;
        let inner = Arc::new(Inner {
            document: Mutex::new(loaded),
            path,
            dirty: AtomicBool::new(false),
            notify: Notify::new(),
        });
        let store = Self { inner };
        store.spawn_flush_task();
        Ok(store)
    }

    fn spawn_flush_task(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(FLUSH_INTERVAL) => {}
                    _ = inner.notify.notified() => {}
                }
                if inner.dirty.swap(false, Ordering::AcqRel) {
                    let document = inner.document.lock().await;
                    if let Err(err) = document::save(&inner.path, &document).await {
                        error!(error = ?err, path = %inner.path.display(), "review store flush failed, leaving dirty");
                        inner.dirty.store(true, Ordering::Release);
                    }
                }
            }
        });
    }

    fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Force an immediate, synchronous flush. Intended for graceful
    /// shutdown.
    pub async fn shutdown(&self) -> Result<(), ReviewError> {
        let document = self.inner.document.lock().await;
        document::save(&self.inner.path, &document).await?;
        self.inner.dirty.store(false, Ordering::Release);
        info!(path = %self.inner.path.display(), "review store flushed on shutdown");
        Ok(())
    }

    /// Whether a record with this id already exists.
    pub async fn has(&self, id: &str) -> bool {
        self.inner.document.lock().await.records.contains_key(id)
    }

    /// Fetch a single record by id.
    pub async fn get(&self, id: &str) -> Option<ReviewRecord> {
        self.inner.document.lock().await.records.get(id).cloned()
    }

    /// Insert a new record. Fails with [`review_error::ErrorKind::BadRequest`]
    /// if a record with the same id is already present — callers on the
    /// ingestion path are expected to check [`Store::has`] first and treat
    /// that case as a duplicate, not an error.
    pub async fn add(&self, record: ReviewRecord) -> Result<(), ReviewError> {
        let mut document = self.inner.document.lock().await;
        if document.records.contains_key(&record.id) {
            return Err(ReviewError::bad_request("record already exists")
                .with_context("id", record.id.clone()));
        }
        document.records.insert(record.id.clone(), record);
        drop(document);
        self.mark_dirty();
        Ok(())
    }

    /// Merge processing flags into an existing record.
    pub async fn mark_processed(&self, id: &str, flags: ProcessingFlags) -> Result<(), ReviewError> {
        let mut document = self.inner.document.lock().await;
        let record = document
            .records
            .get_mut(id)
            .ok_or_else(|| ReviewError::not_found("unknown review id").with_context("id", id))?;
        record.apply_flags(flags);
        drop(document);
        self.mark_dirty();
        Ok(())
    }

    /// The resume cursor recorded for a source, if any.
    pub async fn get_cursor(&self, source: &str) -> Option<String> {
        self.inner.document.lock().await.cursors.get(source).cloned()
    }

    /// Record a new resume cursor for a source.
    pub async fn set_cursor(&self, source: &str, cursor: String) {
        let mut document = self.inner.document.lock().await;
        document.cursors.insert(source.to_string(), cursor);
        drop(document);
        self.mark_dirty();
    }

    /// Record the timestamp of the most recent poll attempt for a source.
    pub async fn set_last_poll_time(&self, source: &str, when: DateTime<Utc>) {
        let mut document = self.inner.document.lock().await;
        document.last_poll.insert(source.to_string(), when);
        drop(document);
        self.mark_dirty();
    }

    /// The timestamp of the most recent poll attempt for a source, if any.
    pub async fn last_poll_time(&self, source: &str) -> Option<DateTime<Utc>> {
        self.inner.document.lock().await.last_poll.get(source).copied()
    }

    /// The most recent records, newest first, optionally filtered by
    /// `source`. `limit` is clamped to [`MAX_RECENT_LIMIT`].
    pub async fn recent(&self, limit: usize, source: Option<&str>) -> Vec<ReviewRecord> {
        let limit = limit.min(MAX_RECENT_LIMIT);
        let document = self.inner.document.lock().await;
        let mut records: Vec<ReviewRecord> = document
            .records
            .values()
            .filter(|r| source.is_none_or(|s| r.source == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.sort_timestamp().cmp(&a.sort_timestamp()));
        records.truncate(limit);
        records
    }

    /// Aggregate counts across all stored records.
    pub async fn stats(&self) -> StoreStats {
        let document = self.inner.document.lock().await;
        let mut stats = StoreStats::default();
        stats.total = document.records.len();
        for record in document.records.values() {
            *stats.by_source.entry(record.source.clone()).or_insert(0) += 1;
            if record.image_generated {
                stats.image_generated += 1;
            }
            if record.chat_shared {
                stats.chat_shared += 1;
            }
        }
        stats
    }

    /// Remove records older than `max_age_days`, measured against
    /// [`ReviewRecord::prune_timestamp`]. Returns the number removed.
    pub async fn prune(&self, max_age_days: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        let mut document = self.inner.document.lock().await;
        let before = document.records.len();
        document.records.retain(|_, record| record.prune_timestamp() >= cutoff);
        let removed = before - document.records.len();
        drop(document);
        if removed > 0 {
            self.mark_dirty();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(id: &str, source: &str, rating: u8, age_days: i64) -> ReviewRecord {
        ReviewRecord {
            id: id.to_string(),
            source: source.to_string(),
            reviewer_name: "Jane".into(),
            rating,
            review_text: "Great work".into(),
            review_date: Utc::now() - chrono::Duration::days(age_days),
            tech_name: None,
            tech_photo_url: None,
            raw: serde_json::json!({}),
            processed_at: None,
            image_generated: false,
            chat_shared: false,
            partial: false,
        }
    }

    async fn open_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        let store = Store::open(path).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn add_then_has_and_get() {
        let (store, _dir) = open_store().await;
        let record = sample_record("generic:a", "generic", 5, 0);
        store.add(record.clone()).await.unwrap();
        assert!(store.has("generic:a").await);
        assert_eq!(store.get("generic:a").await.unwrap().reviewer_name, "Jane");
    }

    #[tokio::test]
    async fn add_duplicate_id_fails() {
        let (store, _dir) = open_store().await;
        let record = sample_record("generic:a", "generic", 5, 0);
        store.add(record.clone()).await.unwrap();
        let err = store.add(record).await.unwrap_err();
        assert_eq!(err.kind, review_error::ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn mark_processed_merges_flags() {
        let (store, _dir) = open_store().await;
        store.add(sample_record("generic:a", "generic", 5, 0)).await.unwrap();
        let now = Utc::now();
        store
            .mark_processed("generic:a", ProcessingFlags::generated(now))
            .await
            .unwrap();
        let record = store.get("generic:a").await.unwrap();
        assert!(record.image_generated);
        assert_eq!(record.processed_at, Some(now));
    }

    #[tokio::test]
    async fn mark_processed_unknown_id_not_found() {
        let (store, _dir) = open_store().await;
        let err = store
            .mark_processed("generic:missing", ProcessingFlags::generated(Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, review_error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn recent_filters_by_source_and_sorts_newest_first() {
        let (store, _dir) = open_store().await;
        store.add(sample_record("google:a", "google", 5, 2)).await.unwrap();
        store.add(sample_record("google:b", "google", 4, 0)).await.unwrap();
        store.add(sample_record("yelp:c", "yelp", 3, 1)).await.unwrap();

        let google_only = store.recent(10, Some("google")).await;
        assert_eq!(google_only.len(), 2);
        assert_eq!(google_only[0].id, "google:b");
        assert_eq!(google_only[1].id, "google:a");

        let all = store.recent(10, None).await;
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn recent_clamps_limit() {
        let (store, _dir) = open_store().await;
        for i in 0..5 {
            store
                .add(sample_record(&format!("generic:{i}"), "generic", 5, i as i64))
                .await
                .unwrap();
        }
        let result = store.recent(1_000_000, None).await;
        assert_eq!(result.len(), 5);
    }

    #[tokio::test]
    async fn stats_counts_by_source_and_flags() {
        let (store, _dir) = open_store().await;
        store.add(sample_record("google:a", "google", 5, 0)).await.unwrap();
        store.add(sample_record("yelp:b", "yelp", 4, 0)).await.unwrap();
        store
            .mark_processed("google:a", ProcessingFlags::generated(Utc::now()))
            .await
            .unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_source["google"], 1);
        assert_eq!(stats.by_source["yelp"], 1);
        assert_eq!(stats.image_generated, 1);
        assert_eq!(stats.chat_shared, 0);
    }

    #[tokio::test]
    async fn prune_removes_records_older_than_cutoff() {
        let (store, _dir) = open_store().await;
        store.add(sample_record("generic:old", "generic", 5, 120)).await.unwrap();
        store.add(sample_record("generic:new", "generic", 5, 1)).await.unwrap();

        let removed = store.prune(90).await;
        assert_eq!(removed, 1);
        assert!(!store.has("generic:old").await);
        assert!(store.has("generic:new").await);
    }

    #[tokio::test]
    async fn cursor_and_last_poll_roundtrip() {
        let (store, _dir) = open_store().await;
        assert_eq!(store.get_cursor("google").await, None);
        store.set_cursor("google", "cursor-1".into()).await;
        assert_eq!(store.get_cursor("google").await, Some("cursor-1".into()));

        let now = Utc::now();
        store.set_last_poll_time("google", now).await;
        assert_eq!(store.last_poll_time("google").await, Some(now));
    }

    #[tokio::test]
    async fn shutdown_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        let store = Store::open(&path).await.unwrap();
        store.add(sample_record("generic:a", "generic", 5, 0)).await.unwrap();
        store.shutdown().await.unwrap();

        let reopened = Store::open(&path).await.unwrap();
        assert!(reopened.has("generic:a").await);
    }
}
