//! JSON-file record store.
//!
//! The whole collection lives in one file and is replaced wholesale on save,
//! mirroring the fetch-all / save-all contract the dashboard expects. Writes
//! go through a temp file and rename so a failed save never truncates the
//! existing collection.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::RmaRecord;

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record store: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("No record with id {0}")]
    NotFound(String),
}

/// File-backed store for the RMA record collection.
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full collection. A missing file is an empty collection.
    pub fn list(&self) -> Result<Vec<RmaRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Replace the stored collection wholesale.
    pub fn save_all(&self, records: &[RmaRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<RmaRecord>, StoreError> {
        Ok(self.list()?.into_iter().find(|r| r.id == id))
    }

    /// Insert or replace a record by id. New records go to the front so the
    /// dashboard lists newest first.
    pub fn upsert(&self, record: RmaRecord) -> Result<(), StoreError> {
        let mut records = self.list()?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.insert(0, record),
        }
        self.save_all(&records)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.list()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.save_all(&records)
    }

    /// Next sequential id: one past the highest numeric id in the store.
    pub fn next_id(&self) -> Result<String, StoreError> {
        let max = self
            .list()?
            .iter()
            .filter_map(|r| r.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Ok((max + 1).to_string())
    }
}
