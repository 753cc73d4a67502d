//! Container image repository.

use tracing::info;

use crate::config::TopologyConfig;
use crate::error::{ConfigError, Result};

use super::resource::{
    LogicalId, PolicyDocument, PolicyStatement, Principal, RepositoryProperties,
    ResourceProperties,
};
use super::stack::StackDeclaration;

/// Actions granted to pull principals by the repository policy.
pub const READ_ONLY_ACTIONS: [&str; 8] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:BatchGetImage",
    "ecr:GetDownloadUrlForLayer",
    "ecr:DescribeImages",
    "ecr:DescribeRepositories",
    "ecr:ListImages",
    "ecr:GetRepositoryPolicy",
    "ecr:GetAuthorizationToken",
];

/// Handle to a declared repository.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    /// Repository logical id.
    pub repository: LogicalId,
    /// Repository name.
    pub repository_name: String,
}

/// Declares the repository and its pull policy.
///
/// # Errors
///
/// Returns an error if a pull principal is not an explicit ARN or the
/// declaration is rejected.
pub fn build(config: &TopologyConfig, stack: &mut StackDeclaration) -> Result<RegistryHandle> {
    let principals = config.pull_principals();

    let mut statement = PolicyStatement::allow(&READ_ONLY_ACTIONS);
    for principal in principals {
        if principal.contains('*') || !principal.starts_with("arn:") {
            return Err(ConfigError::InvalidPrincipal { principal }.into());
        }
        statement = statement.with_principal(Principal::Arn(principal));
    }

    let repository_name = config.repository_name();
    let repository = stack.declare(
        "Repository",
        ResourceProperties::Repository(RepositoryProperties {
            repository_name: repository_name.clone(),
            image_scan_on_push: config.registry.scan_on_push,
            image_tag_mutability: config.registry.tag_mutability,
            repository_policy: PolicyDocument::new(vec![statement]),
            removal_policy: config.registry.removal_policy,
        }),
    )?;

    info!("Declared repository {}", repository_name);

    Ok(RegistryHandle {
        repository,
        repository_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigParser, TagMutability, Variant};

    fn config(extra: &str) -> TopologyConfig {
        let yaml = format!(
            "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n{extra}"
        );
        ConfigParser::new().parse_yaml(&yaml, None).unwrap()
    }

    fn repository(stack: &StackDeclaration) -> &RepositoryProperties {
        match &stack.get("Repository").unwrap().resource {
            ResourceProperties::Repository(r) => r,
            _ => panic!("expected repository"),
        }
    }

    #[test]
    fn test_defaults_scan_and_mutable_tags() {
        let config = config("");
        let mut stack = StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);
        let handle = build(&config, &mut stack).unwrap();

        assert_eq!(handle.repository_name, "playground");
        let repo = repository(&stack);
        assert!(repo.image_scan_on_push);
        assert_eq!(repo.image_tag_mutability, TagMutability::Mutable);
    }

    #[test]
    fn test_policy_grants_read_only_to_account_root() {
        let config = config("");
        let mut stack = StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);
        build(&config, &mut stack).unwrap();

        let statement = &repository(&stack).repository_policy.statements[0];
        assert_eq!(statement.actions.len(), 8);
        assert!(statement.actions.contains(&String::from("ecr:GetAuthorizationToken")));
        assert_eq!(
            statement.principals,
            vec![Principal::Arn(String::from("arn:aws:iam::123456789012:root"))]
        );
    }

    #[test]
    fn test_wildcard_principal_rejected() {
        let mut config = config("");
        config.registry.pull_principals = vec![String::from("*")];
        let mut stack = StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);

        let err = build(&config, &mut stack).unwrap_err();
        assert!(err.to_string().contains("Invalid policy principal"));
        assert_eq!(stack.resource_count(), 0);
    }
}
