//! Cluster spec fingerprints.
//!
//! A fingerprint identifies the exact spec a status was computed against.
//! It is shown by `status` and logged when a controller adopts a record.

use sha2::{Digest, Sha256};

use crate::store::ClusterSpec;

/// Hasher for computing cluster spec fingerprints.
#[derive(Debug, Default)]
pub struct SpecHasher;

impl SpecHasher {
    /// Creates a new spec hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the SHA-256 fingerprint of a spec.
    ///
    /// Every field takes part, so any spec edit changes the fingerprint.
    #[must_use]
    pub fn hash_spec(&self, spec: &ClusterSpec) -> String {
        let mut hasher = Sha256::new();

        hasher.update(spec.desired_state.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(spec.provisioner.provider.as_bytes());
        hasher.update([0u8]);

        // Options are a BTreeMap, so iteration order is already sorted.
        for (key, value) in &spec.provisioner.options {
            hasher.update(key.as_bytes());
            hasher.update([b'=']);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }

        for count in [
            spec.etcd_count,
            spec.master_count,
            spec.worker_count,
            spec.ingress_count,
        ] {
            hasher.update(count.to_be_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DesiredState;

    #[test]
    fn test_hash_is_deterministic() {
        let hasher = SpecHasher::new();
        let spec = ClusterSpec::installed("aws", 1, 1, 2, 0);

        let first = hasher.hash_spec(&spec);
        assert_eq!(first, hasher.hash_spec(&spec.clone()));
        assert_eq!(first.len(), 64);
        assert_eq!(hasher.short_hash(&first).len(), 8);
    }

    #[test]
    fn test_any_edit_changes_hash() {
        let hasher = SpecHasher::new();
        let base = ClusterSpec::installed("aws", 1, 1, 2, 0);
        let original = hasher.hash_spec(&base);

        let mut edited = base.clone();
        edited.worker_count = 3;
        assert_ne!(hasher.hash_spec(&edited), original);

        let mut edited = base.clone();
        edited.desired_state = DesiredState::Destroyed;
        assert_ne!(hasher.hash_spec(&edited), original);

        let mut edited = base;
        edited
            .provisioner
            .options
            .insert("region".to_string(), "us-east-2".to_string());
        assert_ne!(hasher.hash_spec(&edited), original);
    }

    #[test]
    fn test_field_boundaries_are_distinct() {
        let hasher = SpecHasher::new();
        let mut a = ClusterSpec::installed("aws", 1, 1, 1, 0);
        a.provisioner.options.insert("ab".to_string(), "c".to_string());
        let mut b = ClusterSpec::installed("aws", 1, 1, 1, 0);
        b.provisioner.options.insert("a".to_string(), "bc".to_string());

        assert_ne!(hasher.hash_spec(&a), hasher.hash_spec(&b));
    }
}
