//! Configuration and declaration hashing for change detection.
//!
//! Hashes are computed over the canonical JSON form of a value. All maps in
//! the hashed types are ordered, so equal values always hash equally.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{ArtifactError, Result};
use crate::topology::{Declaration, StackDeclaration};

use super::spec::TopologyConfig;

/// Hasher for computing configuration and declaration hashes.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire topology configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn hash_config(&self, config: &TopologyConfig) -> Result<String> {
        digest(config)
    }

    /// Computes a hash of an assembled declaration tree.
    ///
    /// Two assembly passes over the same configuration produce the same hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration cannot be serialized.
    pub fn hash_stack(&self, stack: &StackDeclaration) -> Result<String> {
        digest(stack)
    }

    /// Computes a hash of a single declaration, tags included.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration cannot be serialized.
    pub fn hash_declaration(&self, declaration: &Declaration) -> Result<String> {
        digest(declaration)
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

fn digest<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| ArtifactError::serialization(format!("Failed to hash value: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn config(yaml_tail: &str) -> TopologyConfig {
        let yaml = format!(
            "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n{yaml_tail}"
        );
        ConfigParser::new().parse_yaml(&yaml, None).unwrap()
    }

    #[test]
    fn test_config_hash_deterministic() {
        let hasher = ConfigHasher::new();
        let a = hasher.hash_config(&config("")).unwrap();
        let b = hasher.hash_config(&config("")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_different_configs_different_hash() {
        let hasher = ConfigHasher::new();
        let a = hasher.hash_config(&config("")).unwrap();
        let b = hasher
            .hash_config(&config("tags:\n  team: platform\n"))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hashes_match() {
        assert!(ConfigHasher::hashes_match("abc123", "abc123"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc124"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc12"));
    }
}
