// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk representation of the store and its atomic load/save.

use chrono::{DateTime, Utc};
use review_core::{ReviewRecord, STORE_DOCUMENT_VERSION};
use review_error::ReviewError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// The persisted document: records keyed by id, plus per-source poll
/// bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Schema version; a mismatch falls back to an empty document rather
    /// than failing startup (`spec.md` §9).
    pub version: u32,
    /// All stored records, keyed by `id`.
    pub records: BTreeMap<String, ReviewRecord>,
    /// Per-source resume cursor, set by the scheduler after a successful
    /// poll.
    pub cursors: BTreeMap<String, String>,
    /// Per-source timestamp of the last poll attempt, successful or not.
    pub last_poll: BTreeMap<String, DateTime<Utc>>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: STORE_DOCUMENT_VERSION,
            records: BTreeMap::new(),
            cursors: BTreeMap::new(),
            last_poll: BTreeMap::new(),
        }
    }
}

/// Load the document at `path`, or start fresh if it is absent, corrupt,
/// or carries an unrecognised schema version.
pub async fn load_or_default(path: &Path) -> Result<StoreDocument, ReviewError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no existing store document, starting fresh");
            return Ok(StoreDocument::default());
        }
        Err(err) => {
            return Err(ReviewError::internal("failed to read store document")
                .with_context("path", path.display().to_string())
                .with_source(err))
        }
    };

    match serde_json::from_slice::<StoreDocument>(&bytes) {
        Ok(document) if document.version == STORE_DOCUMENT_VERSION => Ok(document),
        Ok(document) => {
            warn!(
                found = document.version,
                expected = STORE_DOCUMENT_VERSION,
                "store document schema version mismatch, starting fresh"
            );
            Ok(StoreDocument::default())
        }
        Err(err) => {
            warn!(path = %path.display(), error = ?err, "store document failed to parse, starting fresh");
            Ok(StoreDocument::default())
        }
    }
}

/// Write `document` to `path`, going through a temp file and a `.bak` copy
/// of the previous contents so a crash mid-write never loses the last good
/// document (`spec.md` §4.1).
pub async fn save(path: &Path, document: &StoreDocument) -> Result<(), ReviewError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|err| {
                ReviewError::internal("failed to create store directory").with_source(err)
            })?;
        }
    }

    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|err| ReviewError::internal("failed to serialize store document").with_source(err))?;

    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, &bytes)
        .await
        .map_err(|err| ReviewError::internal("failed to write store tmp file").with_source(err))?;

    if fs::try_exists(path).await.unwrap_or(false) {
        let bak_path = bak_path_for(path);
        if let Err(err) = fs::copy(path, &bak_path).await {
            warn!(error = ?err, "failed to write store .bak copy, continuing");
        }
    }

    fs::rename(&tmp_path, path)
        .await
        .map_err(|err| ReviewError::internal("failed to rename store tmp file into place").with_source(err))?;

    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tmp.into()
}

fn bak_path_for(path: &Path) -> std::path::PathBuf {
    let mut bak = path.as_os_str().to_owned();
    bak.push(".bak");
    bak.into()
}
