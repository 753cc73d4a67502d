//! Diff engine comparing a desired tree with the last published one.
//!
//! Declarations are matched by logical id and compared by hash. A changed
//! declaration is replaced, never patched in place.

use std::collections::HashMap;
use tracing::debug;

use crate::config::ConfigHasher;
use crate::error::Result;
use crate::topology::StackDeclaration;

/// Engine for computing diffs between declaration trees.
#[derive(Debug, Default)]
pub struct DiffEngine {
    hasher: ConfigHasher,
}

/// Difference for a single declaration.
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Logical id.
    pub logical_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Previous hash (if published before).
    pub old_hash: Option<String>,
    /// New hash (if still declared).
    pub new_hash: Option<String>,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    /// Declaration is new.
    Create,
    /// Declaration changed and will be replaced.
    Replace,
    /// Declaration was removed.
    Delete,
    /// Declaration is unchanged.
    NoChange,
}

/// Complete diff result.
#[derive(Debug, Default)]
pub struct DiffResult {
    /// All declaration diffs, desired declarations first.
    pub diffs: Vec<ResourceDiff>,
    /// Number of declarations to create.
    pub creates: usize,
    /// Number of declarations to replace.
    pub replaces: usize,
    /// Number of declarations to delete.
    pub deletes: usize,
    /// Number of unchanged declarations.
    pub unchanged: usize,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hasher: ConfigHasher::new(),
        }
    }

    /// Computes the diff between the desired tree and the published one.
    ///
    /// # Errors
    ///
    /// Returns an error if a declaration cannot be hashed.
    pub fn compute_diff(
        &self,
        desired: &StackDeclaration,
        published: Option<&StackDeclaration>,
    ) -> Result<DiffResult> {
        let mut published_hashes: HashMap<&str, (String, &str)> = HashMap::new();
        if let Some(published) = published {
            for decl in &published.resources {
                published_hashes.insert(
                    decl.logical_id.as_str(),
                    (self.hasher.hash_declaration(decl)?, decl.resource_type()),
                );
            }
        }

        let mut diffs = Vec::with_capacity(desired.resources.len());
        for decl in &desired.resources {
            let new_hash = self.hasher.hash_declaration(decl)?;
            let old_hash = published_hashes
                .remove(decl.logical_id.as_str())
                .map(|(hash, _)| hash);

            let diff_type = match &old_hash {
                None => DiffType::Create,
                Some(old) if ConfigHasher::hashes_match(old, &new_hash) => DiffType::NoChange,
                Some(_) => DiffType::Replace,
            };

            diffs.push(ResourceDiff {
                logical_id: decl.logical_id.to_string(),
                resource_type: decl.resource_type().to_string(),
                diff_type,
                old_hash,
                new_hash: Some(new_hash),
            });
        }

        // Whatever is left was published but is no longer declared.
        if let Some(published) = published {
            for decl in &published.resources {
                if let Some((hash, resource_type)) = published_hashes.remove(decl.logical_id.as_str()) {
                    debug!("Declaration {} no longer declared", decl.logical_id);
                    diffs.push(ResourceDiff {
                        logical_id: decl.logical_id.to_string(),
                        resource_type: resource_type.to_string(),
                        diff_type: DiffType::Delete,
                        old_hash: Some(hash),
                        new_hash: None,
                    });
                }
            }
        }

        let count = |t: DiffType| diffs.iter().filter(|d| d.diff_type == t).count();
        let creates = count(DiffType::Create);
        let replaces = count(DiffType::Replace);
        let deletes = count(DiffType::Delete);
        let unchanged = count(DiffType::NoChange);

        Ok(DiffResult {
            diffs,
            creates,
            replaces,
            deletes,
            unchanged,
        })
    }
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.creates > 0 || self.replaces > 0 || self.deletes > 0
    }

    /// Returns the total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.creates + self.replaces + self.deletes
    }

    /// Returns the diff for a logical id.
    #[must_use]
    pub fn get(&self, logical_id: &str) -> Option<&ResourceDiff> {
        self.diffs.iter().find(|d| d.logical_id == logical_id)
    }
}

impl std::fmt::Display for DiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for DiffResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to replace, {} to delete, {} unchanged",
            self.creates, self.replaces, self.deletes, self.unchanged
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::topology::TopologyAssembler;

    fn stack(extra: &str) -> StackDeclaration {
        let yaml = format!(
            "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n{extra}"
        );
        let config = ConfigParser::new().parse_yaml(&yaml, None).unwrap();
        TopologyAssembler::new(&config).assemble().unwrap().stack
    }

    #[test]
    fn test_first_publish_creates_everything() {
        let desired = stack("");
        let diff = DiffEngine::new().compute_diff(&desired, None).unwrap();

        assert_eq!(diff.creates, desired.resource_count());
        assert_eq!(diff.deletes, 0);
        assert!(diff.has_changes());
    }

    #[test]
    fn test_same_tree_has_no_changes() {
        let desired = stack("");
        let published = stack("");
        let diff = DiffEngine::new()
            .compute_diff(&desired, Some(&published))
            .unwrap();

        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged, desired.resource_count());
    }

    #[test]
    fn test_switching_to_https_replaces_listener_and_adds_record() {
        let published = stack("");
        let desired = stack(
            "tls:\n  domain_name: app.example.com\n  certificate_arn: arn:aws:acm:eu-west-1:123456789012:certificate/abc\n",
        );
        let diff = DiffEngine::new()
            .compute_diff(&desired, Some(&published))
            .unwrap();

        assert_eq!(diff.get("Listener").unwrap().diff_type, DiffType::Replace);
        assert_eq!(diff.get("AliasRecord").unwrap().diff_type, DiffType::Create);
        assert_eq!(diff.get("Vpc").unwrap().diff_type, DiffType::NoChange);
    }

    #[test]
    fn test_removed_declaration_is_deleted() {
        let published = stack("edge:\n  security_group: true\n");
        let desired = stack("");
        let diff = DiffEngine::new()
            .compute_diff(&desired, Some(&published))
            .unwrap();

        let removed = diff.get("LoadBalancerSecurityGroup").unwrap();
        assert_eq!(removed.diff_type, DiffType::Delete);
        assert!(removed.new_hash.is_none());
    }
}
