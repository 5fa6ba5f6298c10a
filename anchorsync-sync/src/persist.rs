//! Map and record persistence on top of a [`BlobStore`].
//!
//! Maps are stored as JSON under the configured map key. Records are stored as
//! a `RecordsFile` document; a bare JSON array of records (the older layout)
//! is still accepted on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use anchorsync_core::{BlobStore, CloudAnchorRecord, StoreError, WorldMap};

/// On-disk record payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordsFile {
    pub saved_at: DateTime<Utc>,
    pub records: Vec<CloudAnchorRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordsCompat {
    Structured(RecordsFile),
    Legacy(Vec<CloudAnchorRecord>),
}

pub fn save_map(store: &dyn BlobStore, key: &str, map: &WorldMap) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(map)?;
    store.write_blob(key, &bytes)
}

/// `Ok(None)` when no map has been saved under `key`.
pub fn load_map(store: &dyn BlobStore, key: &str) -> Result<Option<WorldMap>, StoreError> {
    let Some(bytes) = store.read_blob(key)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

pub fn save_records(
    store: &dyn BlobStore,
    key: &str,
    records: &[CloudAnchorRecord],
) -> Result<(), StoreError> {
    let file = RecordsFile {
        saved_at: Utc::now(),
        records: records.to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&file)?;
    store.write_blob(key, &bytes)
}

/// `Ok(None)` when no records have been saved under `key`.
pub fn load_records(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<RecordsFile>, StoreError> {
    let Some(bytes) = store.read_blob(key)? else {
        return Ok(None);
    };
    match serde_json::from_slice::<RecordsCompat>(&bytes)? {
        RecordsCompat::Structured(file) => Ok(Some(file)),
        RecordsCompat::Legacy(records) => Ok(Some(RecordsFile {
            saved_at: Utc::now(),
            records,
        })),
    }
}
