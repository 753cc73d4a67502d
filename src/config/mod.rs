//! Configuration module for the topology assembler.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `edgestack.yaml`
//! - Validation of configuration values
//! - Computing configuration and declaration hashes for change detection

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    ArtifactBackend, ArtifactsConfig, CiTrust, EdgeConfig, IdentityConfig, NetworkConfig,
    ProjectConfig, RegistryConfig, RemovalPolicy, TagMutability, TlsBinding, TlsConfig,
    TopologyConfig, Variant, WorkloadConfig, DEFAULT_ACCOUNT, DEFAULT_REGION,
};
pub use parser::{ConfigParser, find_config_file, DEFAULT_CONFIG_FILES};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::ConfigHasher;
