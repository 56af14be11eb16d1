//! Cluster record storage.
//!
//! Every managed cluster is persisted as a [`ClusterRecord`] keyed by its
//! name. Users write the spec half of a record; the controller owning the
//! name writes the status half.

mod store;
mod local;
mod memory;
mod s3;
mod types;

pub use store::ClusterStore;
#[cfg(test)]
pub use store::MockClusterStore;
pub use local::LocalClusterStore;
pub use memory::MemoryClusterStore;
pub use s3::S3ClusterStore;
pub use types::{ClusterRecord, ClusterSpec, ClusterState, ClusterStatus, DesiredState, ProvisionerSpec};
