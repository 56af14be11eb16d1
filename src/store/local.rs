//! Local file-based cluster store backend.
//!
//! Each cluster record is kept as a pretty-printed JSON file named after the
//! cluster inside a single directory.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ClusterError, Result, StoreError};

use super::store::ClusterStore;
use super::types::ClusterRecord;

/// Default record directory name.
const STORE_DIR: &str = ".clusters";

/// Record file extension.
const RECORD_EXTENSION: &str = "json";

const BACKEND: &str = "local";

/// Local file-based cluster store.
#[derive(Debug)]
pub struct LocalClusterStore {
    /// Directory holding one file per cluster.
    base_dir: PathBuf,
}

impl LocalClusterStore {
    /// Creates a new local store under the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| ClusterError::internal(format!("Cannot determine current directory: {e}")))?
            .join(STORE_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a new local store with a custom directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the file path for a cluster record.
    fn record_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::backend(BACKEND, format!("invalid cluster name '{name}'")).into());
        }
        Ok(self.base_dir.join(format!("{name}.{RECORD_EXTENSION}")))
    }

    /// Ensures the record directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating record directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                StoreError::backend(BACKEND, format!("Failed to create record directory: {e}"))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for LocalClusterStore {
    async fn get(&self, name: &str) -> Result<ClusterRecord> {
        let path = self.record_path(name)?;
        if !path.exists() {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            }
            .into());
        }

        debug!("Loading cluster record from: {}", path.display());

        let content = fs::read_to_string(&path).await.map_err(|e| StoreError::Corrupted {
            message: format!("Failed to read record file: {e}"),
        })?;

        let record: ClusterRecord = serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            message: format!("Failed to parse record file {}: {e}", path.display()),
        })?;

        Ok(record)
    }

    async fn put(&self, name: &str, record: &ClusterRecord) -> Result<()> {
        let path = self.record_path(name)?;
        self.ensure_dir().await?;

        debug!("Saving cluster record to: {}", path.display());

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize record: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StoreError::backend(BACKEND, format!("Failed to create temp record file: {e}"))
        })?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to write record file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to sync record file: {e}")))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to rename record file: {e}")))?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.record_path(name)?;
        if !path.exists() {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            }
            .into());
        }

        debug!("Deleting cluster record: {}", path.display());
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to delete record file: {e}")))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to read record directory: {e}")))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to read record directory: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    fn backend_type(&self) -> &'static str {
        BACKEND
    }
}
