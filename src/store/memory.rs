//! In-memory cluster store backend.
//!
//! Records live only as long as the process. Useful for dry runs and tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};

use super::store::ClusterStore;
use super::types::ClusterRecord;

/// In-memory cluster store.
#[derive(Debug, Default)]
pub struct MemoryClusterStore {
    records: RwLock<BTreeMap<String, ClusterRecord>>,
}

impl MemoryClusterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn get(&self, name: &str) -> Result<ClusterRecord> {
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    async fn put(&self, name: &str, record: &ClusterRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| {
                StoreError::NotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ClusterSpec;

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let store = MemoryClusterStore::new();
        let record = ClusterRecord::new("alpha", ClusterSpec::installed("azure", 1, 1, 1, 0));

        store.put("alpha", &record).await.unwrap();
        assert_eq!(store.get("alpha").await.unwrap(), record);
        assert_eq!(store.list().await.unwrap(), vec!["alpha"]);

        store.delete("alpha").await.unwrap();
        assert!(store.get("alpha").await.unwrap_err().is_not_found());
        assert!(store.delete("alpha").await.is_err());
    }
}
