//! Cluster store trait definition.
//!
//! This module defines the common interface for cluster record backends.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use super::types::ClusterRecord;

/// Trait for durable cluster record backends, keyed by cluster name.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Loads the record for a cluster.
    ///
    /// A missing record is reported as `StoreError::NotFound`.
    async fn get(&self, name: &str) -> Result<ClusterRecord>;

    /// Writes the record for a cluster, replacing any existing one.
    async fn put(&self, name: &str, record: &ClusterRecord) -> Result<()>;

    /// Deletes the record for a cluster.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Lists the names of all stored clusters, sorted.
    async fn list(&self) -> Result<Vec<String>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
