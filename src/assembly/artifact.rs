//! Cloud assembly: the template plus the manifest describing it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ConfigHasher, TopologyConfig, Variant};
use crate::error::Result;
use crate::topology::StackDeclaration;

use super::lock::generate_publisher_id;

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Metadata of a synthesized assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyManifest {
    /// Manifest format version.
    pub version: u32,
    /// Unique id of this synthesis.
    pub assembly_id: Uuid,
    /// Stack name.
    pub stack_name: String,
    /// Selected variant.
    pub variant: Variant,
    /// Hash of the configuration the tree was assembled from.
    pub config_hash: String,
    /// Hash of the declaration tree.
    pub tree_hash: String,
    /// When the assembly was synthesized.
    pub synthesized_at: DateTime<Utc>,
    /// Who synthesized it (`host-pid-id`).
    pub synthesized_by: String,
    /// Number of declarations.
    pub resource_count: usize,
}

/// A synthesized cloud assembly.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    /// Manifest.
    pub manifest: AssemblyManifest,
    /// Template (the declaration tree).
    pub template: StackDeclaration,
}

impl CloudAssembly {
    /// Synthesizes an assembly from an assembled tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the tree cannot be hashed.
    pub fn synthesize(config: &TopologyConfig, template: StackDeclaration) -> Result<Self> {
        let hasher = ConfigHasher::new();
        let manifest = AssemblyManifest {
            version: MANIFEST_VERSION,
            assembly_id: Uuid::new_v4(),
            stack_name: template.stack_name.clone(),
            variant: template.variant,
            config_hash: hasher.hash_config(config)?,
            tree_hash: hasher.hash_stack(&template)?,
            synthesized_at: Utc::now(),
            synthesized_by: generate_publisher_id(),
            resource_count: template.resource_count(),
        };
        Ok(Self { manifest, template })
    }

    /// Returns true if `other` describes the same tree.
    #[must_use]
    pub fn same_tree(&self, other: &AssemblyManifest) -> bool {
        ConfigHasher::hashes_match(&self.manifest.tree_hash, &other.tree_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::topology::TopologyAssembler;

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

    #[test]
    fn test_resynthesis_keeps_tree_hash() {
        let a = assembly();
        let b = assembly();

        assert_ne!(a.manifest.assembly_id, b.manifest.assembly_id);
        assert_eq!(a.manifest.config_hash, b.manifest.config_hash);
        assert!(a.same_tree(&b.manifest));
        assert_eq!(a.manifest.stack_name, "playground-dev");
        assert_eq!(a.manifest.resource_count, a.template.resources.len());
    }
}
