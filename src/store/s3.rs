//! S3-based cluster store backend.
//!
//! Stores each cluster record as a JSON object under a key prefix, so several
//! controller hosts and operators can share one record set.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{Result, StoreError};

use super::store::ClusterStore;
use super::types::ClusterRecord;

/// Object key suffix for records.
const RECORD_SUFFIX: &str = ".json";

const BACKEND: &str = "s3";

/// S3-based cluster store.
#[derive(Debug)]
pub struct S3ClusterStore {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Key prefix, empty or ending in '/'.
    prefix: String,
}

impl S3ClusterStore {
    /// Creates a new S3 cluster store.
    ///
    /// # Errors
    ///
    /// Returns an error if the S3 client cannot be initialized.
    pub async fn new(bucket: &str, prefix: Option<&str>, region: Option<&str>) -> Result<Self> {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Ok(Self::with_client(Client::new(&config), bucket, prefix))
    }

    /// Creates a new S3 cluster store with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str, prefix: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
        }
    }

    /// Gets the full S3 key for a cluster.
    fn key(&self, name: &str) -> String {
        format!("{}{name}{RECORD_SUFFIX}", self.prefix)
    }
}

/// Normalizes a key prefix to either "" or "some/path/".
fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .map(|p| {
            let p = p.trim_matches('/');
            if p.is_empty() {
                String::new()
            } else {
                format!("{p}/")
            }
        })
        .unwrap_or_default()
}

/// Extracts a cluster name from an object key, if the key names a record.
fn name_from_key<'k>(prefix: &str, key: &'k str) -> Option<&'k str> {
    let name = key.strip_prefix(prefix)?.strip_suffix(RECORD_SUFFIX)?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

#[async_trait]
impl ClusterStore for S3ClusterStore {
    async fn get(&self, name: &str) -> Result<ClusterRecord> {
        let key = self.key(name);
        debug!("Loading cluster record from s3://{}/{key}", self.bucket);

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    return Err(StoreError::NotFound {
                        name: name.to_string(),
                    }
                    .into());
                }
                return Err(StoreError::backend(BACKEND, format!("S3 get error: {service_err}")).into());
            }
        };

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to read S3 object: {e}")))?;

        let record: ClusterRecord =
            serde_json::from_slice(&bytes.into_bytes()).map_err(|e| StoreError::Corrupted {
                message: format!("Failed to parse record {key}: {e}"),
            })?;

        Ok(record)
    }

    async fn put(&self, name: &str, record: &ClusterRecord) -> Result<()> {
        let key = self.key(name);
        debug!("Saving cluster record to s3://{}/{key}", self.bucket);

        let content = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize record: {e}")))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(content.into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("S3 put error: {e}")))?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let key = self.key(name);
        debug!("Deleting cluster record s3://{}/{key}", self.bucket);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StoreError::backend(BACKEND, format!("S3 delete error: {e}")))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StoreError::backend(BACKEND, format!("S3 list error: {e}")))?;

            names.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter_map(|key| name_from_key(&self.prefix, key))
                    .map(str::to_string),
            );

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        names.sort();
        Ok(names)
    }

    fn backend_type(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(None), "");
        assert_eq!(normalize_prefix(Some("/")), "");
        assert_eq!(normalize_prefix(Some("/teams/infra/")), "teams/infra/");
    }

    #[test]
    fn test_name_from_key() {
        assert_eq!(name_from_key("clusters/", "clusters/alpha.json"), Some("alpha"));
        assert_eq!(name_from_key("", "beta.json"), Some("beta"));
        assert_eq!(name_from_key("clusters/", "clusters/nested/alpha.json"), None);
        assert_eq!(name_from_key("clusters/", "clusters/alpha.lock"), None);
        assert_eq!(name_from_key("clusters/", "other/alpha.json"), None);
    }
}
