//! Configuration validation for topology configurations.
//!
//! Every configuration error is caught here, before a single declaration is
//! built. Problems the cloud control plane will report on its own (an
//! unusual certificate ARN, a zone outside the region) are warnings.

use crate::error::{ConfigError, EdgestackError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{
    ArtifactBackend, CiTrust, NetworkConfig, ProjectConfig, TopologyConfig,
    WorkloadConfig,
};
use crate::topology::cidr::Ipv4Block;

/// Retention periods accepted by `CloudWatch` Logs.
const LOG_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// Validator for topology configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a topology configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found. Incomplete TLS options are reported
    /// as [`ConfigError::MissingOption`].
    pub fn validate(&self, config: &TopologyConfig) -> Result<ValidationResult> {
        config.tls_binding()?;

        let mut result = ValidationResult::default();

        Self::validate_project(&config.project, &mut result);
        Self::validate_network(&config.network, &config.project.region, &mut result);
        Self::validate_registry(config, &mut result);
        Self::validate_identity(config, &mut result);
        Self::validate_workload(&config.workload, &mut result);
        Self::validate_tls(config, &mut result);
        Self::validate_artifacts(config, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(EdgestackError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates project configuration.
    fn validate_project(project: &ProjectConfig, result: &mut ValidationResult) {
        if project.name.is_empty() {
            result.error("project.name", "Project name cannot be empty");
        } else if !is_valid_name(&project.name) {
            result.error(
                "project.name",
                format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    project.name
                ),
            );
        }

        if project.environment.is_empty() {
            result.error("project.environment", "Environment cannot be empty");
        } else if !is_valid_name(&project.environment) {
            result.error(
                "project.environment",
                format!("Environment '{}' is invalid", project.environment),
            );
        }

        if project.account.len() != 12 || !project.account.chars().all(|c| c.is_ascii_digit()) {
            result.error(
                "project.account",
                format!("Account '{}' must be a 12-digit AWS account id", project.account),
            );
        }

        if project.region.is_empty() {
            result.error("project.region", "Region cannot be empty");
        }
    }

    /// Validates the network layout.
    fn validate_network(network: &NetworkConfig, region: &str, result: &mut ValidationResult) {
        if network.max_azs == 0 {
            result.error("network.max_azs", "At least one availability zone is required");
        } else if network.max_azs < 2 {
            result.warn(
                "network.max_azs: An application load balancer needs subnets in two availability zones",
            );
        }

        if network.nat_gateways == 0 {
            result.error(
                "network.nat_gateways",
                "At least one NAT gateway is required for private subnets with egress",
            );
        } else if network.nat_gateways > network.max_azs {
            result.warn(format!(
                "network.nat_gateways: {} gateways requested for {} zones; extra gateways are not created",
                network.nat_gateways, network.max_azs
            ));
        }

        match Ipv4Block::parse(&network.cidr) {
            None => result.error(
                "network.cidr",
                format!("'{}' is not a valid IPv4 CIDR block", network.cidr),
            ),
            Some(block) => {
                let needed = network.max_azs.saturating_mul(2);
                let fits = u64::try_from(needed)
                    .is_ok_and(|needed| block.capacity(network.subnet_mask) >= needed);
                if network.subnet_mask > 28 || network.subnet_mask < block.prefix() {
                    result.error(
                        "network.subnet_mask",
                        format!(
                            "Subnet mask /{} must be between /{} and /28",
                            network.subnet_mask,
                            block.prefix()
                        ),
                    );
                } else if !fits {
                    result.error(
                        "network.subnet_mask",
                        format!(
                            "{} cannot hold {needed} /{} subnets",
                            network.cidr, network.subnet_mask
                        ),
                    );
                }
            }
        }

        let mut seen = HashSet::new();
        for (i, zone) in network.availability_zones.iter().enumerate() {
            if zone.is_empty() {
                result.error(
                    format!("network.availability_zones[{i}]"),
                    "Availability zone cannot be empty",
                );
            } else if !seen.insert(zone) {
                result.error(
                    format!("network.availability_zones[{i}]"),
                    format!("Duplicate availability zone: {zone}"),
                );
            } else if !zone.starts_with(region) {
                result.warn(format!(
                    "network.availability_zones[{i}]: '{zone}' is not in region {region}"
                ));
            }
        }
    }

    /// Validates the image registry.
    fn validate_registry(config: &TopologyConfig, result: &mut ValidationResult) {
        let registry = &config.registry;
        let name = config.repository_name();
        if !is_valid_repository_name(&name) {
            let field = if registry.name.is_some() { "registry.name" } else { "project.name" };
            result.error(field, format!("Repository name '{name}' is invalid"));
        }

        for (i, principal) in registry.pull_principals.iter().enumerate() {
            if !is_explicit_principal(principal) {
                result.error(
                    format!("registry.pull_principals[{i}]"),
                    ConfigError::InvalidPrincipal {
                        principal: principal.clone(),
                    }
                    .to_string(),
                );
            }
        }
    }

    /// Validates the deployment identity.
    fn validate_identity(config: &TopologyConfig, result: &mut ValidationResult) {
        let role_name = config.role_name();
        if role_name.is_empty() || role_name.len() > 64 {
            result.error(
                "identity.role_name",
                "Role name must be between 1 and 64 characters",
            );
        }

        if let CiTrust::GithubActions {
            repository: Some(repository),
        } = &config.identity.trust
        {
            let valid = repository
                .split_once('/')
                .is_some_and(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'));
            if !valid {
                result.error(
                    "identity.trust.repository",
                    format!("Repository '{repository}' must be in owner/repo form"),
                );
            }
        }
    }

    /// Validates workload naming and logging.
    fn validate_workload(workload: &WorkloadConfig, result: &mut ValidationResult) {
        if workload.container_name.as_ref().is_some_and(String::is_empty) {
            result.error("workload.container_name", "Container name cannot be empty");
        }

        if workload.cluster_name.as_ref().is_some_and(String::is_empty) {
            result.error("workload.cluster_name", "Cluster name cannot be empty");
        }

        if workload.image_tag.is_empty() {
            result.error("workload.image_tag", "Image tag cannot be empty");
        } else if workload.image_tag == "latest" {
            result.warn(
                "workload.image_tag: Using the 'latest' tag is not recommended for production",
            );
        }

        if let Some(days) = workload.log_retention_days
            && !LOG_RETENTION_DAYS.contains(&days) {
                result.error(
                    "workload.log_retention_days",
                    format!("{days} is not a supported log retention period"),
                );
            }
    }

    /// Validates the TLS/DNS options once they are known to be complete.
    fn validate_tls(config: &TopologyConfig, result: &mut ValidationResult) {
        let (Some(domain), Some(arn)) = (&config.tls.domain_name, &config.tls.certificate_arn) else {
            return;
        };

        if !is_valid_domain(domain.trim()) {
            result.error("tls.domain_name", format!("'{domain}' is not a valid domain name"));
        }

        if !arn.trim().starts_with("arn:aws:acm:") {
            result.warn(format!(
                "tls.certificate_arn: '{arn}' does not look like an ACM certificate ARN"
            ));
        }
    }

    /// Validates the artifact store.
    fn validate_artifacts(config: &TopologyConfig, result: &mut ValidationResult) {
        if config.artifacts.backend == ArtifactBackend::S3
            && config.artifacts.bucket.as_ref().is_none_or(String::is_empty)
        {
            result.error(
                "artifacts.bucket",
                "S3 bucket name is required when using S3 backend",
            );
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.ends_with('-')
        && !name.contains("--")
}

/// ECR repository names: lowercase, digits and `._-/` separators.
fn is_valid_repository_name(name: &str) -> bool {
    (2..=256).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(c))
}

/// Principals must be explicit IAM ARNs; wildcards are never accepted.
fn is_explicit_principal(principal: &str) -> bool {
    principal.starts_with("arn:aws:iam::") && !principal.contains('*')
}

fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    domain.contains('.')
        && domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> TopologyConfig {
        ConfigParser::new().parse_yaml(yaml, None).unwrap()
    }

    const MINIMAL: &str = r"
project:
  name: playground
identity:
  trust:
    provider: codebuild
";

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("playground"));
        assert!(is_valid_name("my-stack-123"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Playground"));
        assert!(!is_valid_name("123-stack"));
        assert!(!is_valid_name("my_stack"));
        assert!(!is_valid_name("stack-"));
        assert!(!is_valid_name("my--stack"));
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let config = parse(MINIMAL);
        assert_eq!(config.workload.image_tag, "latest");

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
        // the default image tag is `latest`
        assert!(result.warnings.iter().any(|w| w.contains("latest")));
    }

    #[test]
    fn test_single_letter_project_is_too_short_for_repository() {
        let mut config = parse(MINIMAL);
        config.project.name = String::from("a");

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Repository name 'a' is invalid"));

        config.registry.name = Some(String::from("images"));
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_half_tls_is_missing_option() {
        let mut config = parse(MINIMAL);
        config.tls.certificate_arn = Some(String::from("arn:aws:acm:eu-west-1:123456789012:certificate/x"));

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(matches!(
            err,
            EdgestackError::Config(ConfigError::MissingOption { .. })
        ));
    }

    #[test]
    fn test_wildcard_principal_rejected() {
        let mut config = parse(MINIMAL);
        config.registry.pull_principals = vec![String::from("*")];
        assert!(ConfigValidator::new().validate(&config).is_err());

        config.registry.pull_principals = vec![String::from("arn:aws:iam::*:root")];
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_nat_gateways_required() {
        let mut config = parse(MINIMAL);
        config.network.nat_gateways = 0;
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("NAT gateway"));
    }

    #[test]
    fn test_subnet_space_checked() {
        let mut config = parse(MINIMAL);
        config.network.cidr = String::from("10.0.0.0/23");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_unusual_certificate_arn_is_only_a_warning() {
        let mut config = parse(MINIMAL);
        config.tls.domain_name = Some(String::from("example.com"));
        config.tls.certificate_arn = Some(String::from("arn:...:cert/x"));

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("certificate_arn")));
    }

    #[test]
    fn test_invalid_domain_rejected() {
        let mut config = parse(MINIMAL);
        config.tls.domain_name = Some(String::from("not a domain"));
        config.tls.certificate_arn = Some(String::from("arn:aws:acm:eu-west-1:123456789012:certificate/x"));
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_github_repository_format() {
        let mut config = parse(MINIMAL);
        config.identity.trust = CiTrust::GithubActions {
            repository: Some(String::from("no-slash")),
        };
        assert!(ConfigValidator::new().validate(&config).is_err());

        config.identity.trust = CiTrust::GithubActions {
            repository: Some(String::from("acme/playground")),
        };
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let mut config = parse(MINIMAL);
        config.artifacts.backend = ArtifactBackend::S3;
        assert!(ConfigValidator::new().validate(&config).is_err());
    }
}
