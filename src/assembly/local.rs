//! Local directory artifact store.
//!
//! Layout: `<base>/<stack>/template.json`, `manifest.json`, `publish.lock`.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ArtifactError, Result};
use crate::topology::StackDeclaration;

use super::artifact::{AssemblyManifest, CloudAssembly};
use super::lock::{PublishLock, LOCK_EXPIRY_SECS};
use super::store::ArtifactStore;

/// Default output directory name.
pub const DEFAULT_OUT_DIR: &str = "edgestack.out";

const MANIFEST_FILE: &str = "manifest.json";
const TEMPLATE_FILE: &str = "template.json";
const LOCK_FILE: &str = "publish.lock";

/// Local directory artifact store.
#[derive(Debug)]
pub struct LocalArtifactStore {
    stack_dir: PathBuf,
    stack_name: String,
}

impl LocalArtifactStore {
    /// Creates a store for `stack_name` under `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl AsRef<Path>, stack_name: &str) -> Self {
        Self {
            stack_dir: base_dir.as_ref().join(stack_name),
            stack_name: stack_name.to_string(),
        }
    }

    /// Directory holding the stack's artifacts.
    #[must_use]
    pub fn stack_dir(&self) -> &Path {
        &self.stack_dir
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.stack_dir.exists() {
            debug!("Creating artifact directory: {}", self.stack_dir.display());
            fs::create_dir_all(&self.stack_dir)
                .await
                .map_err(|e| ArtifactError::storage(format!("Failed to create artifact directory: {e}")))?;
        }
        Ok(())
    }

    async fn read_json<T: DeserializeOwned + Send>(&self, file: &str) -> Result<Option<T>> {
        let path = self.stack_dir.join(file);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| ArtifactError::corrupted(format!("Failed to read {}: {e}", path.display())))?;

        let value = serde_json::from_str(&content)
            .map_err(|e| ArtifactError::corrupted(format!("Failed to parse {}: {e}", path.display())))?;

        Ok(Some(value))
    }

    /// Writes to a temporary file first, then renames it into place.
    async fn write_json<T: Serialize + Sync>(&self, file: &str, value: &T) -> Result<()> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(value)
            .map_err(|e| ArtifactError::serialization(format!("Failed to serialize {file}: {e}")))?;

        let path = self.stack_dir.join(file);
        let temp_path = path.with_extension("tmp");

        let mut handle = fs::File::create(&temp_path)
            .await
            .map_err(|e| ArtifactError::storage(format!("Failed to create {}: {e}", temp_path.display())))?;
        handle
            .write_all(content.as_bytes())
            .await
            .map_err(|e| ArtifactError::storage(format!("Failed to write {file}: {e}")))?;
        handle
            .sync_all()
            .await
            .map_err(|e| ArtifactError::storage(format!("Failed to sync {file}: {e}")))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| ArtifactError::storage(format!("Failed to rename {file}: {e}")))?;

        Ok(())
    }

    async fn remove(&self, file: &str) -> Result<()> {
        let path = self.stack_dir.join(file);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| ArtifactError::storage(format!("Failed to delete {}: {e}", path.display())))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>> {
        self.read_json(MANIFEST_FILE).await
    }

    async fn load_template(&self) -> Result<Option<StackDeclaration>> {
        self.read_json(TEMPLATE_FILE).await
    }

    async fn save(&self, assembly: &CloudAssembly) -> Result<()> {
        info!("Writing assembly to: {}", self.stack_dir.display());
        self.write_json(TEMPLATE_FILE, &assembly.template).await?;
        self.write_json(MANIFEST_FILE, &assembly.manifest).await?;
        debug!("Assembly {} saved", assembly.manifest.assembly_id);
        Ok(())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<PublishLock> {
        let current = self.read_json::<PublishLock>(LOCK_FILE).await?;
        let lock = PublishLock::claim(current, holder, &self.stack_name)?;
        self.write_json(LOCK_FILE, &lock).await?;

        info!(
            "Acquired publish lock: {} (expires in {}s)",
            lock.lock_id, LOCK_EXPIRY_SECS
        );
        Ok(lock)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_json::<PublishLock>(LOCK_FILE).await? {
            if existing.lock_id == lock_id {
                self.remove(LOCK_FILE).await?;
                info!("Released publish lock: {lock_id}");
            } else {
                debug!("Lock ID mismatch: expected {lock_id}, found {}", existing.lock_id);
            }
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.stack_dir.display().to_string()
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::topology::TopologyAssembler;
    use tempfile::TempDir;

    fn assembly() -> CloudAssembly {
        let config = ConfigParser::new()
            .parse_yaml(
                "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n",
                None,
            )
            .unwrap();
        let stack = TopologyAssembler::new(&config).assemble().unwrap().stack;
        CloudAssembly::synthesize(&config, stack).unwrap()
    }

    fn create_test_store() -> (LocalArtifactStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalArtifactStore::new(temp_dir.path(), "playground-dev");
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = create_test_store();
        let assembly = assembly();

        store.save(&assembly).await.expect("Failed to save assembly");

        let manifest = store
            .load_manifest()
            .await
            .expect("Failed to load manifest")
            .expect("Manifest should exist");
        assert_eq!(manifest, assembly.manifest);

        let template = store
            .load_template()
            .await
            .expect("Failed to load template")
            .expect("Template should exist");
        assert_eq!(template.resources, assembly.template.resources);
        assert_eq!(template.outputs, assembly.template.outputs);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = create_test_store();

        assert!(store.load_manifest().await.expect("Load should not fail").is_none());
        assert!(store.load_template().await.expect("Load should not fail").is_none());
    }

    #[tokio::test]
    async fn test_lock_conflict_and_release() {
        let (store, _temp) = create_test_store();

        let lock = store.acquire_lock("ci-1").await.expect("Failed to acquire lock");
        let err = store.acquire_lock("ci-2").await.unwrap_err();
        assert!(err.to_string().contains("ci-1"));

        store.release_lock(&lock.lock_id).await.expect("Failed to release lock");
        assert!(!store.stack_dir().join(LOCK_FILE).exists());
        store.acquire_lock("ci-2").await.expect("Lock should be free");
    }

    #[test]
    fn test_corrupted_manifest() {
        let (store, _temp) = create_test_store();
        std::fs::create_dir_all(store.stack_dir()).unwrap();
        std::fs::write(store.stack_dir().join(MANIFEST_FILE), "{broken").unwrap();

        let err = tokio_test::block_on(store.load_manifest()).unwrap_err();
        assert!(err.to_string().contains("corrupted"));
    }
}
