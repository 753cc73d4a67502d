//! Configuration specification types for the topology assembler.
//!
//! This module defines all the structs that map to the `edgestack.yaml` file.
//! Every literal the topology depends on (account, region, availability
//! zones, principals) is a field here with a documented default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Account used when none is configured.
pub const DEFAULT_ACCOUNT: &str = "123456789012";

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// The root configuration structure for a topology.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Network layout.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Image registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// CI deployment identity. The trust provider has no default.
    pub identity: IdentityConfig,
    /// Cluster and workload naming.
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Load balancer settings.
    #[serde(default)]
    pub edge: EdgeConfig,
    /// TLS termination and DNS aliasing (variant B when fully set).
    #[serde(default)]
    pub tls: TlsConfig,
    /// Tags applied to every taggable declaration.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Where synthesized assemblies are published.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// AWS account the stack is deployed into.
    #[serde(default = "default_account")]
    pub account: String,
    /// AWS region the stack is deployed into.
    #[serde(default = "default_region")]
    pub region: String,
}

/// Network layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Maximum number of availability zones to span.
    #[serde(default = "default_max_azs")]
    pub max_azs: usize,
    /// Number of NAT gateways serving the private subnets.
    #[serde(default = "default_nat_gateways")]
    pub nat_gateways: usize,
    /// VPC CIDR block.
    #[serde(default = "default_vpc_cidr")]
    pub cidr: String,
    /// Mask length of every public and private subnet.
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: u8,
    /// Availability zones to place subnets in (defaults to `<region>a/b/c`).
    #[serde(default)]
    pub availability_zones: Vec<String>,
}

/// Image registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Repository name (defaults to the project name).
    #[serde(default)]
    pub name: Option<String>,
    /// Scan images for vulnerabilities on push.
    #[serde(default = "default_true")]
    pub scan_on_push: bool,
    /// Tag mutability mode.
    #[serde(default)]
    pub tag_mutability: TagMutability,
    /// Principals granted read-only pull access (explicit ARNs).
    #[serde(default)]
    pub pull_principals: Vec<String>,
    /// What happens to the repository when the stack is deleted.
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

/// Tag mutability modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagMutability {
    /// Tags can be overwritten.
    #[default]
    #[serde(alias = "mutable")]
    Mutable,
    /// Tags are immutable once pushed.
    #[serde(alias = "immutable")]
    Immutable,
}

/// Removal policy for stateful resources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Keep the resource when the stack is deleted.
    #[default]
    Retain,
    /// Delete the resource with the stack.
    Destroy,
}

/// CI deployment identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Role name (defaults to `<project>-<provider>`).
    #[serde(default)]
    pub role_name: Option<String>,
    /// The CI system trusted to assume the role.
    pub trust: CiTrust,
}

/// CI systems that may assume the deployment role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "kebab-case")]
pub enum CiTrust {
    /// AWS `CodeBuild`, trusted through its service principal.
    Codebuild,
    /// GitHub Actions, trusted through the account's OIDC provider.
    GithubActions {
        /// Restrict the trust to one `owner/repo`.
        #[serde(default)]
        repository: Option<String>,
    },
}

/// Cluster and workload configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Cluster name (defaults to `<project>-cluster`).
    #[serde(default)]
    pub cluster_name: Option<String>,
    /// Container name (defaults to `<project>-container`).
    #[serde(default)]
    pub container_name: Option<String>,
    /// Image tag pulled from the registry.
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    /// Log stream prefix (defaults to the project name).
    #[serde(default)]
    pub log_stream_prefix: Option<String>,
    /// Log group retention in days (unset keeps logs forever).
    #[serde(default)]
    pub log_retention_days: Option<u32>,
}

/// Load balancer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeConfig {
    /// Attach a dedicated security group allowing 80 and 443 from anywhere.
    /// Unset follows the variant: present with TLS, absent without.
    #[serde(default)]
    pub security_group: Option<bool>,
    /// Health check path of the target group.
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
}

/// TLS termination and DNS aliasing options.
///
/// Both fields must be set together; either both absent (variant A) or
/// both present (variant B).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TlsConfig {
    /// Domain name to alias to the load balancer.
    #[serde(default, alias = "domainName")]
    pub domain_name: Option<String>,
    /// ACM certificate ARN attached to the HTTPS listener.
    #[serde(default, alias = "certificateArn")]
    pub certificate_arn: Option<String>,
}

/// A complete TLS/DNS binding, present only for variant B.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsBinding {
    /// Domain name to alias to the load balancer.
    pub domain_name: String,
    /// ACM certificate ARN attached to the HTTPS listener.
    pub certificate_arn: String,
}

/// Topology variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Plain HTTP listener, no DNS alias.
    HttpOnly,
    /// HTTPS listener with a certificate and a DNS alias.
    HttpsWithDns,
}

/// Artifact store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ArtifactsConfig {
    /// Backend type (local or s3).
    #[serde(default)]
    pub backend: ArtifactBackend,
    /// Local output directory (for local backend).
    #[serde(default)]
    pub path: Option<String>,
    /// S3 bucket name (required for s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix (optional).
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
}

/// Artifact backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactBackend {
    /// Local directory.
    #[default]
    Local,
    /// AWS S3 bucket.
    S3,
}

// Default value functions

const fn default_max_azs() -> usize {
    3
}

const fn default_nat_gateways() -> usize {
    1
}

const fn default_subnet_mask() -> u8 {
    24
}

const fn default_true() -> bool {
    true
}

fn default_environment() -> String {
    String::from("dev")
}

fn default_account() -> String {
    String::from(DEFAULT_ACCOUNT)
}

fn default_region() -> String {
    String::from(DEFAULT_REGION)
}

fn default_vpc_cidr() -> String {
    String::from("10.0.0.0/16")
}

fn default_image_tag() -> String {
    String::from("latest")
}

fn default_health_check_path() -> String {
    String::from("/")
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_azs: default_max_azs(),
            nat_gateways: default_nat_gateways(),
            cidr: default_vpc_cidr(),
            subnet_mask: default_subnet_mask(),
            availability_zones: Vec::new(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: None,
            scan_on_push: true,
            tag_mutability: TagMutability::default(),
            pull_principals: Vec::new(),
            removal_policy: RemovalPolicy::default(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            cluster_name: None,
            container_name: None,
            image_tag: default_image_tag(),
            log_stream_prefix: None,
            log_retention_days: None,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            security_group: None,
            health_check_path: default_health_check_path(),
        }
    }
}

impl TopologyConfig {
    /// Returns the stack name (`<project>-<environment>`).
    #[must_use]
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.project.name, self.project.environment)
    }

    /// Resolves the TLS/DNS options into a binding.
    ///
    /// # Errors
    ///
    /// Returns an error if only one of the two options is set, or if a set
    /// option is blank.
    pub fn tls_binding(&self) -> Result<Option<TlsBinding>, ConfigError> {
        let domain = self.tls.domain_name.as_deref().map(str::trim);
        let certificate = self.tls.certificate_arn.as_deref().map(str::trim);

        match (domain, certificate) {
            (None, None) => Ok(None),
            (Some(""), _) => Err(ConfigError::validation(
                "Domain name cannot be empty",
                "tls.domain_name",
            )),
            (_, Some("")) => Err(ConfigError::validation(
                "Certificate ARN cannot be empty",
                "tls.certificate_arn",
            )),
            (Some(domain_name), Some(certificate_arn)) => Ok(Some(TlsBinding {
                domain_name: domain_name.to_string(),
                certificate_arn: certificate_arn.to_string(),
            })),
            (None, Some(_)) => Err(ConfigError::MissingOption {
                option: String::from("tls.domain_name"),
                required_by: String::from("tls.certificate_arn"),
            }),
            (Some(_), None) => Err(ConfigError::MissingOption {
                option: String::from("tls.certificate_arn"),
                required_by: String::from("tls.domain_name"),
            }),
        }
    }

    /// Returns the variant selected by the TLS options.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS options are incomplete.
    pub fn variant(&self) -> Result<Variant, ConfigError> {
        Ok(if self.tls_binding()?.is_some() {
            Variant::HttpsWithDns
        } else {
            Variant::HttpOnly
        })
    }

    /// Returns the repository name.
    #[must_use]
    pub fn repository_name(&self) -> String {
        self.registry
            .name
            .clone()
            .unwrap_or_else(|| self.project.name.clone())
    }

    /// Returns the deploying account's root principal.
    #[must_use]
    pub fn account_root_principal(&self) -> String {
        format!("arn:aws:iam::{}:root", self.project.account)
    }

    /// Returns the principals granted pull access, falling back to the
    /// account root so the policy always has one.
    #[must_use]
    pub fn pull_principals(&self) -> Vec<String> {
        if self.registry.pull_principals.is_empty() {
            vec![self.account_root_principal()]
        } else {
            self.registry.pull_principals.clone()
        }
    }

    /// Returns the deployment role name.
    #[must_use]
    pub fn role_name(&self) -> String {
        self.identity.role_name.clone().unwrap_or_else(|| {
            format!("{}-{}", self.project.name, self.identity.trust.provider_name())
        })
    }

    /// Returns the cluster name.
    #[must_use]
    pub fn cluster_name(&self) -> String {
        self.workload
            .cluster_name
            .clone()
            .unwrap_or_else(|| format!("{}-cluster", self.project.name))
    }

    /// Returns the container name shared by the task and the target group.
    #[must_use]
    pub fn container_name(&self) -> String {
        self.workload
            .container_name
            .clone()
            .unwrap_or_else(|| format!("{}-container", self.project.name))
    }

    /// Returns the log stream prefix.
    #[must_use]
    pub fn log_stream_prefix(&self) -> String {
        self.workload
            .log_stream_prefix
            .clone()
            .unwrap_or_else(|| self.project.name.clone())
    }

    /// Returns whether the load balancer gets a dedicated security group.
    #[must_use]
    pub fn edge_security_group(&self, variant: Variant) -> bool {
        self.edge
            .security_group
            .unwrap_or(variant == Variant::HttpsWithDns)
    }

    /// Returns the tags applied to every taggable declaration.
    #[must_use]
    pub fn stack_tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        tags.insert(String::from("project"), self.project.name.clone());
        tags.insert(String::from("environment"), self.project.environment.clone());
        tags.extend(self.tags.clone());
        tags
    }
}

impl NetworkConfig {
    /// Returns the candidate availability zones for a region.
    #[must_use]
    pub fn candidate_zones(&self, region: &str) -> Vec<String> {
        if self.availability_zones.is_empty() {
            ["a", "b", "c"]
                .iter()
                .map(|suffix| format!("{region}{suffix}"))
                .collect()
        } else {
            self.availability_zones.clone()
        }
    }
}

impl CiTrust {
    /// Returns the short provider name.
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        match self {
            Self::Codebuild => "codebuild",
            Self::GithubActions { .. } => "github-actions",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::HttpOnly => "http-only",
            Self::HttpsWithDns => "https-with-dns",
        };
        write!(f, "{s}")
    }
}
