use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisSummary;

/// Number of accounts kept by default.
pub const DEFAULT_MAX_ENTRIES: usize = 10;
const FILE_NAME: &str = "users.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Recent analyses, one per handle, most recent first, kept in a single JSON
/// file. Older entries beyond `max_entries` are dropped on save.
pub struct AnalysisStore {
    path: PathBuf,
    max_entries: usize,
    lock: Mutex<()>,
}

impl AnalysisStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_capacity(dir, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(dir: impl AsRef<Path>, max_entries: usize) -> Self {
        let path = dir.as_ref().join(FILE_NAME);
        info!(path = %path.display(), max_entries, "Analysis store opened");
        Self {
            path,
            max_entries,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `summary` at the front, replacing any entry with the same handle.
    /// `analyzed_at` is stamped with the current time.
    pub async fn save(&self, mut summary: AnalysisSummary) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await;

        summary.analyzed_at = Utc::now();
        let handle = summary.handle.clone();
        entries.retain(|e| e.handle != handle);
        entries.insert(0, summary);
        entries.truncate(self.max_entries);

        self.write_entries(&entries).await?;
        info!(handle, total = entries.len(), "Saved analysis");
        Ok(())
    }

    pub async fn list(&self) -> Vec<AnalysisSummary> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    pub async fn get(&self, handle: &str) -> Option<AnalysisSummary> {
        self.list().await.into_iter().find(|e| e.handle == handle)
    }

    /// Returns whether an entry was removed.
    pub async fn delete(&self, handle: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await;
        let before = entries.len();
        entries.retain(|e| e.handle != handle);
        if entries.len() == before {
            return Ok(false);
        }
        self.write_entries(&entries).await?;
        info!(handle, "Deleted analysis");
        Ok(true)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write_entries(&[]).await?;
        info!("Cleared analysis store");
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.list().await.len()
    }

    /// Missing, unreadable or corrupt files read as empty. Individual entries
    /// that no longer deserialize are dropped.
    async fn read_entries(&self) -> Vec<AnalysisSummary> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Store file does not exist yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read store file");
                return Vec::new();
            }
        };

        let doc: Value = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Store file is not valid JSON, treating as empty");
                return Vec::new();
            }
        };

        let items = match doc {
            Value::Array(items) => items,
            // Older files keyed entries by handle.
            Value::Object(map) => {
                warn!("Converting handle-keyed store file to list");
                map.into_iter().map(|(_, v)| v).collect()
            }
            _ => return Vec::new(),
        };

        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<AnalysisSummary>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Dropping unreadable store entry");
                    None
                }
            })
            .collect()
    }

    async fn write_entries(&self, entries: &[AnalysisSummary]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(entries = entries.len(), "Wrote store file");
        Ok(())
    }
}
