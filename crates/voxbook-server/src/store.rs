//! Latest call summary, stored as a JSON file.
//!
//! The booking agent writes the file as the call progresses; the server
//! serves it and clears it whenever a new call is issued a token.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use voxbook_types::CallSummary;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("summary file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("summary file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SummaryStore {
    path: PathBuf,
}

impl SummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored summary, or `None` if none has been written.
    pub async fn load(&self) -> Result<Option<CallSummary>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the stored summary. Written to a sibling file first so a
    /// concurrent reader never sees a partial document.
    ///
    /// The booking agent writes the file in production; this is used to
    /// seed fixtures.
    pub async fn save(&self, summary: &CallSummary) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(summary)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Removes the stored summary. Missing files are not an error.
    pub async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbook_types::Appointment;

    #[tokio::test]
    async fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SummaryStore::new(dir.path().join("latest_summary.json"));

        assert!(store.load().await.unwrap().is_none());

        let summary = CallSummary {
            text: "Booked.".to_string(),
            appointments: vec![Appointment::new("2026-01-21T15:00:00")],
            preferences: Some("Afternoons".to_string()),
            timestamp: "2026-01-19T09:00:00+00:00".to_string(),
        };
        store.save(&summary).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(summary));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest_summary.json");
        std::fs::write(&path, b"{\"text\": ").unwrap();

        let store = SummaryStore::new(&path);
        assert!(matches!(store.load().await, Err(StoreError::Parse(_))));
    }
}
