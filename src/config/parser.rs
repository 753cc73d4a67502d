//! Configuration parser for loading topology configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, EdgestackError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::TopologyConfig;

/// Configuration parser for loading topology configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<TopologyConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(EdgestackError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            EdgestackError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<TopologyConfig> {
        debug!("Parsing YAML configuration");

        let config: TopologyConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            EdgestackError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for project: {}", config.project.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are checked in the format
    /// `EDGESTACK_<SECTION>_<KEY>` (e.g., `EDGESTACK_PROJECT_REGION`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<TopologyConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    fn apply_env_overrides(config: &mut TopologyConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("EDGESTACK_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            config.project.name = name;
        }

        if let Some(env) = lookup("EDGESTACK_PROJECT_ENVIRONMENT") {
            debug!("Overriding project.environment from environment");
            config.project.environment = env;
        }

        if let Some(account) = lookup("EDGESTACK_PROJECT_ACCOUNT") {
            debug!("Overriding project.account from environment");
            config.project.account = account;
        }

        if let Some(region) = lookup("EDGESTACK_PROJECT_REGION") {
            debug!("Overriding project.region from environment");
            config.project.region = region;
        }

        // TLS overrides
        if let Some(domain) = lookup("EDGESTACK_DOMAIN_NAME") {
            debug!("Overriding tls.domain_name from environment");
            config.tls.domain_name = Some(domain);
        }

        if let Some(arn) = lookup("EDGESTACK_CERTIFICATE_ARN") {
            debug!("Overriding tls.certificate_arn from environment");
            config.tls.certificate_arn = Some(arn);
        }

        // Artifact overrides
        if let Some(bucket) = lookup("EDGESTACK_ARTIFACTS_BUCKET") {
            debug!("Overriding artifacts.bucket from environment");
            config.artifacts.bucket = Some(bucket);
        }

        if let Some(prefix) = lookup("EDGESTACK_ARTIFACTS_PREFIX") {
            debug!("Overriding artifacts.prefix from environment");
            config.artifacts.prefix = Some(prefix);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                EdgestackError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "edgestack.yaml",
    "edgestack.yml",
    "topology.yaml",
    "topology.yml",
];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(EdgestackError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CiTrust, TagMutability};
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
project:
  name: playground
identity:
  trust:
    provider: codebuild
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(config.project.name, "playground");
        assert_eq!(config.project.environment, "dev");
        assert_eq!(config.project.region, "eu-west-1");
        assert_eq!(config.network.max_azs, 3);
        assert_eq!(config.network.nat_gateways, 1);
        assert!(config.registry.scan_on_push);
        assert_eq!(config.registry.tag_mutability, TagMutability::Mutable);
        assert_eq!(config.identity.trust, CiTrust::Codebuild);
        assert!(config.tls.domain_name.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
project:
  name: playground
  environment: prod
  account: "210987654321"
  region: us-east-1

network:
  max_azs: 2
  availability_zones: [us-east-1a, us-east-1b]

registry:
  name: playground-images
  pull_principals:
    - arn:aws:iam::111122223333:root

identity:
  role_name: deployer
  trust:
    provider: github-actions
    repository: acme/playground

workload:
  container_name: web
  image_tag: v1.2.0
  log_retention_days: 30

tls:
  domainName: example.com
  certificateArn: arn:aws:acm:us-east-1:210987654321:certificate/abc

tags:
  team: platform

artifacts:
  backend: s3
  bucket: edgestack-assemblies
"#;
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.stack_name(), "playground-prod");
        assert_eq!(config.network.availability_zones.len(), 2);
        assert_eq!(config.repository_name(), "playground-images");
        assert_eq!(
            config.identity.trust,
            CiTrust::GithubActions {
                repository: Some(String::from("acme/playground"))
            }
        );
        assert_eq!(config.tls.domain_name.as_deref(), Some("example.com"));
        assert_eq!(config.tags.get("team").map(String::as_str), Some("platform"));
    }

    #[test]
    fn test_identity_trust_is_required() {
        let yaml = r"
project:
  name: playground
";
        let result = ConfigParser::new().parse_yaml(yaml, None);
        assert!(matches!(
            result,
            Err(EdgestackError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let yaml = r"
project:
  name: playground
identity:
  trust:
    provider: codebuild
";
        let mut config = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        let vars: HashMap<&str, &str> = [
            ("EDGESTACK_PROJECT_REGION", "us-west-2"),
            ("EDGESTACK_DOMAIN_NAME", "example.com"),
            ("EDGESTACK_CERTIFICATE_ARN", "arn:aws:acm:us-west-2:123456789012:certificate/x"),
        ]
        .into_iter()
        .collect();

        ConfigParser::apply_env_overrides(&mut config, |key| {
            vars.get(key).map(|v| (*v).to_string())
        });

        assert_eq!(config.project.region, "us-west-2");
        assert_eq!(config.tls.domain_name.as_deref(), Some("example.com"));
        assert!(config.tls.certificate_arn.is_some());
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let temp = tempfile::TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("edgestack.yaml"), "project: {}\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, temp.path().join("edgestack.yaml"));
    }
}
