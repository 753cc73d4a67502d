//! Artifact store trait definition.
//!
//! A store holds the last published assembly of one stack.

use async_trait::async_trait;

use crate::error::Result;
use crate::topology::StackDeclaration;

use super::artifact::{AssemblyManifest, CloudAssembly};
use super::lock::PublishLock;

/// Trait for artifact storage backends.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Loads the manifest of the published assembly.
    ///
    /// Returns `None` if nothing was published yet.
    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>>;

    /// Loads the template of the published assembly.
    ///
    /// Returns `None` if nothing was published yet.
    async fn load_template(&self) -> Result<Option<StackDeclaration>>;

    /// Saves an assembly, template first so a manifest never points at a
    /// missing template.
    async fn save(&self, assembly: &CloudAssembly) -> Result<()>;

    /// Acquires the publish lock.
    async fn acquire_lock(&self, holder: &str) -> Result<PublishLock>;

    /// Releases the publish lock.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets a human-readable location of the store.
    fn location(&self) -> String;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl ArtifactStore for Box<dyn ArtifactStore> {
    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>> {
        (**self).load_manifest().await
    }

    async fn load_template(&self) -> Result<Option<StackDeclaration>> {
        (**self).load_template().await
    }

    async fn save(&self, assembly: &CloudAssembly) -> Result<()> {
        (**self).save(assembly).await
    }

    async fn acquire_lock(&self, holder: &str) -> Result<PublishLock> {
        (**self).acquire_lock(holder).await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        (**self).release_lock(lock_id).await
    }

    fn location(&self) -> String {
        (**self).location()
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
