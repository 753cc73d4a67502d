//! Error types for the edgestack topology assembler.
//!
//! This module provides the error hierarchy for every phase of an assembly
//! pass: configuration, declaration, external preconditions recorded in the
//! lookup context, and artifact storage.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for edgestack.
#[derive(Debug, Error)]
pub enum EdgestackError {
    /// Configuration-related errors (fatal, raised before any declaration).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Assembly errors (fatal, raised while declaring the topology).
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// External precondition failures recorded in the lookup context.
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Artifact storage errors.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An option required by another configured option is missing.
    #[error("Option '{option}' is required when '{required_by}' is set")]
    MissingOption {
        /// The missing option.
        option: String,
        /// The option that requires it.
        required_by: String,
    },

    /// A policy principal is not an explicit ARN.
    #[error("Invalid policy principal '{principal}': expected an explicit IAM ARN")]
    InvalidPrincipal {
        /// The rejected principal.
        principal: String,
    },

    /// A CIDR block could not be parsed or carved.
    #[error("Invalid CIDR block '{cidr}': {reason}")]
    InvalidCidr {
        /// The offending CIDR block.
        cidr: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors raised while declaring the topology.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// A declaration references a logical id that was not declared before it.
    #[error("'{from}' references '{target}', which has not been declared")]
    UnresolvedReference {
        /// Logical id of the referencing declaration.
        from: String,
        /// Logical id that could not be resolved.
        target: String,
    },

    /// A reference consumes an attribute its target does not expose.
    #[error("'{from}' references '{target}.{attribute}', which '{target}' does not provide")]
    UnsupportedAttribute {
        /// Logical id of the referencing declaration.
        from: String,
        /// Referenced logical id.
        target: String,
        /// Attribute that was requested.
        attribute: String,
    },

    /// Two declarations share a logical id.
    #[error("Duplicate logical id: {logical_id}")]
    DuplicateLogicalId {
        /// The duplicated logical id.
        logical_id: String,
    },

    /// A placement invariant was violated.
    #[error("Placement violation for '{resource}': {reason}")]
    PlacementViolation {
        /// Logical id of the misplaced declaration.
        resource: String,
        /// Description of the violation.
        reason: String,
    },

    /// No availability zone survived selection.
    #[error("No availability zones available in region {region}")]
    NoAvailabilityZones {
        /// Region the zones were selected for.
        region: String,
    },

    /// The VPC address space cannot hold the requested subnets.
    #[error("CIDR {cidr} cannot hold {needed} /{mask} subnets")]
    SubnetSpaceExhausted {
        /// VPC CIDR block.
        cidr: String,
        /// Subnet mask length.
        mask: u8,
        /// Number of subnets requested.
        needed: usize,
    },

    /// Reference edges form a cycle.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// External preconditions that the lookup context reports as unmet.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// The hosted zone for a domain does not exist.
    #[error("Hosted zone for '{domain_name}' does not exist")]
    HostedZoneNotFound {
        /// Domain that was looked up.
        domain_name: String,
    },
}

/// Artifact storage errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Artifact not found.
    #[error("Artifact not found: {path}")]
    NotFound {
        /// Path or key of the missing artifact.
        path: String,
    },

    /// A stored artifact could not be read back.
    #[error("Artifact is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Another publisher holds the publish lock.
    #[error("Publish lock held by {holder} since {since} (expires in {expires_in}s)")]
    Locked {
        /// Holder of the lock.
        holder: String,
        /// When the lock was acquired (RFC 3339).
        since: String,
        /// Seconds until the lock may be taken over.
        expires_in: i64,
    },

    /// The storage backend failed.
    #[error("Artifact storage error: {message}")]
    Storage {
        /// Description of the backend failure.
        message: String,
    },

    /// Serialization error.
    #[error("Artifact serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },
}

/// Result type alias for edgestack operations.
pub type Result<T> = std::result::Result<T, EdgestackError>;

impl EdgestackError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Artifact(ArtifactError::Storage { .. }))
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Artifact(ArtifactError::Storage { .. }) => Some(2),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl AssemblyError {
    /// Creates a placement violation for a declaration.
    #[must_use]
    pub fn placement(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlacementViolation {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

impl ArtifactError {
    /// Creates a storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = EdgestackError::Artifact(ArtifactError::storage("timeout"));
        assert!(err.is_retryable());
        assert_eq!(err.retry_delay_secs(), Some(2));
    }

    #[test]
    fn test_config_errors_are_not_retryable() {
        let err = EdgestackError::Config(ConfigError::MissingOption {
            option: String::from("tls.domain_name"),
            required_by: String::from("tls.certificate_arn"),
        });
        assert!(!err.is_retryable());
        assert!(err.retry_delay_secs().is_none());
        assert!(err.to_string().contains("tls.domain_name"));
    }
}
