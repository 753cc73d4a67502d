//! Synthesized cloud assemblies and the stores they are published to.
//!
//! An assembly is the declaration tree (template) plus a manifest carrying
//! hashes and provenance. Stores keep the last published assembly of a
//! stack, either in a local directory or in an S3 bucket.

mod artifact;
mod local;
mod lock;
mod s3;
mod store;

pub use artifact::{AssemblyManifest, CloudAssembly, MANIFEST_VERSION};
pub use local::{LocalArtifactStore, DEFAULT_OUT_DIR};
pub use lock::{generate_publisher_id, PublishLock, LOCK_EXPIRY_SECS};
pub use s3::S3ArtifactStore;
pub use store::ArtifactStore;

use std::path::Path;

use crate::config::{ArtifactBackend, TopologyConfig};
use crate::error::{ConfigError, Result};

/// Opens the store configured for the stack.
///
/// A relative local path is resolved against `base_dir`, the directory of
/// the configuration file.
///
/// # Errors
///
/// Returns an error if the S3 backend has no bucket.
pub async fn open_store(config: &TopologyConfig, base_dir: &Path) -> Result<Box<dyn ArtifactStore>> {
    let stack_name = config.stack_name();
    let artifacts = &config.artifacts;

    let store: Box<dyn ArtifactStore> = match artifacts.backend {
        ArtifactBackend::Local => {
            let dir = base_dir.join(artifacts.path.as_deref().unwrap_or(DEFAULT_OUT_DIR));
            Box::new(LocalArtifactStore::new(dir, &stack_name))
        }
        ArtifactBackend::S3 => {
            let bucket = artifacts
                .bucket
                .as_deref()
                .ok_or_else(|| ConfigError::validation("S3 bucket not configured", "artifacts.bucket"))?;
            Box::new(
                S3ArtifactStore::new(
                    bucket,
                    artifacts.prefix.as_deref(),
                    artifacts.region.as_deref(),
                    &stack_name,
                )
                .await,
            )
        }
    };

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_local_store_under_base_dir() {
        let temp = TempDir::new().unwrap();
        let config = ConfigParser::new()
            .parse_yaml(
                "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n",
                None,
            )
            .unwrap();

        let store = open_store(&config, temp.path()).await.unwrap();
        assert_eq!(store.backend_type(), "local");
        assert!(store.location().ends_with("playground-dev"));
        assert!(store.location().contains(DEFAULT_OUT_DIR));
    }
}
