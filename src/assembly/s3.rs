//! S3 artifact store.
//!
//! Keys: `<prefix><stack>/template.json`, `manifest.json`, `publish.lock`.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use crate::error::{ArtifactError, Result};
use crate::topology::StackDeclaration;

use super::artifact::{AssemblyManifest, CloudAssembly};
use super::lock::{PublishLock, LOCK_EXPIRY_SECS};
use super::store::ArtifactStore;

const MANIFEST_KEY: &str = "manifest.json";
const TEMPLATE_KEY: &str = "template.json";
const LOCK_KEY: &str = "publish.lock";

/// S3 artifact store.
#[derive(Debug)]
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    prefix: String,
    stack_name: String,
}

impl S3ArtifactStore {
    /// Creates a store for `stack_name`, loading AWS credentials from the
    /// environment.
    pub async fn new(bucket: &str, prefix: Option<&str>, region: Option<&str>, stack_name: &str) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self::with_client(Client::new(&config), bucket, prefix, stack_name)
    }

    /// Creates a store with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str, prefix: Option<&str>, stack_name: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: stack_prefix(prefix, stack_name),
            stack_name: stack_name.to_string(),
        }
    }

    fn key(&self, file: &str) -> String {
        format!("{}{file}", self.prefix)
    }

    async fn get_object(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| ArtifactError::storage(format!("Failed to read S3 object: {e}")))?;

                let content = String::from_utf8(bytes.to_vec())
                    .map_err(|e| ArtifactError::corrupted(format!("Invalid UTF-8 in S3 object: {e}")))?;

                Ok(Some(content))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(ArtifactError::storage(format!("S3 get error: {service_err}")).into())
                }
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned + Send>(&self, file: &str) -> Result<Option<T>> {
        let key = self.key(file);
        debug!("Reading s3://{}/{key}", self.bucket);
        match self.get_object(&key).await? {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| ArtifactError::corrupted(format!("Failed to parse {key}: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put_json<T: serde::Serialize + Sync>(&self, file: &str, value: &T) -> Result<()> {
        let key = self.key(file);
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| ArtifactError::serialization(format!("Failed to serialize {file}: {e}")))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/json")
            .body(ByteStream::from(content.into_bytes()))
            .send()
            .await
            .map_err(|e| ArtifactError::storage(format!("S3 put error: {e}")))?;

        Ok(())
    }

    async fn delete_object(&self, file: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(file))
            .send()
            .await
            .map_err(|e| ArtifactError::storage(format!("S3 delete error: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>> {
        self.get_json(MANIFEST_KEY).await
    }

    async fn load_template(&self) -> Result<Option<StackDeclaration>> {
        self.get_json(TEMPLATE_KEY).await
    }

    async fn save(&self, assembly: &CloudAssembly) -> Result<()> {
        info!("Publishing assembly to {}", self.location());
        self.put_json(TEMPLATE_KEY, &assembly.template).await?;
        self.put_json(MANIFEST_KEY, &assembly.manifest).await?;
        debug!("Assembly {} published to S3", assembly.manifest.assembly_id);
        Ok(())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<PublishLock> {
        let current = self.get_json::<PublishLock>(LOCK_KEY).await?;
        let lock = PublishLock::claim(current, holder, &self.stack_name)?;
        self.put_json(LOCK_KEY, &lock).await?;

        info!(
            "Acquired publish lock: {} (expires in {}s)",
            lock.lock_id, LOCK_EXPIRY_SECS
        );
        Ok(lock)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.get_json::<PublishLock>(LOCK_KEY).await? {
            if existing.lock_id == lock_id {
                self.delete_object(LOCK_KEY).await?;
                info!("Released publish lock: {lock_id}");
            } else {
                debug!("Lock ID mismatch: expected {lock_id}, found {}", existing.lock_id);
            }
        }
        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}

/// Normalises the key prefix to `<prefix>/<stack>/`.
fn stack_prefix(prefix: Option<&str>, stack_name: &str) -> String {
    let base = prefix.map(|p| p.trim_matches('/')).unwrap_or_default();
    if base.is_empty() {
        format!("{stack_name}/")
    } else {
        format!("{base}/{stack_name}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_prefix() {
        assert_eq!(stack_prefix(None, "app-dev"), "app-dev/");
        assert_eq!(stack_prefix(Some(""), "app-dev"), "app-dev/");
        assert_eq!(stack_prefix(Some("/assemblies/"), "app-dev"), "assemblies/app-dev/");
    }
}
