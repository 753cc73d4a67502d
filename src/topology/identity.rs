//! CI deployment role.
//!
//! The role carries exactly two statements: the image push actions on `*`,
//! and token issuance scoped to the repository ARN.

use tracing::info;

use crate::config::{CiTrust, TopologyConfig};
use crate::error::Result;

use super::registry::RegistryHandle;
use super::resource::{
    LogicalId, PolicyDocument, PolicyProperties, PolicyStatement, Principal, Reference,
    ResourceProperties, ResourceScope, RoleProperties,
};
use super::stack::StackDeclaration;

/// Actions granted on every resource.
pub const PUSH_ACTIONS: [&str; 7] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:InitiateLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:CompleteLayerUpload",
    "ecr:PutImage",
    "ecr:BatchGetImage",
    "ecr:GetDownloadUrlForLayer",
];

/// Action granted on the repository only.
pub const TOKEN_ACTION: &str = "ecr:GetAuthorizationToken";

const GITHUB_OIDC_HOST: &str = "token.actions.githubusercontent.com";

/// Handle to the declared deployment role.
#[derive(Debug, Clone)]
pub struct IdentityHandle {
    /// Role logical id.
    pub role: LogicalId,
    /// Policy logical id.
    pub policy: LogicalId,
    /// Role name.
    pub role_name: String,
}

/// Builds the trust statement for a CI provider.
#[must_use]
pub fn trust_statement(trust: &CiTrust, account: &str) -> PolicyStatement {
    match trust {
        CiTrust::Codebuild => PolicyStatement::allow(&["sts:AssumeRole"])
            .with_principal(Principal::Service(String::from("codebuild.amazonaws.com"))),
        CiTrust::GithubActions { repository } => {
            let statement = PolicyStatement::allow(&["sts:AssumeRoleWithWebIdentity"])
                .with_principal(Principal::Federated(format!(
                    "arn:aws:iam::{account}:oidc-provider/{GITHUB_OIDC_HOST}"
                )))
                .with_condition(
                    "StringEquals",
                    format!("{GITHUB_OIDC_HOST}:aud"),
                    "sts.amazonaws.com",
                );
            match repository {
                Some(repo) => statement.with_condition(
                    "StringLike",
                    format!("{GITHUB_OIDC_HOST}:sub"),
                    format!("repo:{repo}:*"),
                ),
                None => statement,
            }
        }
    }
}

/// Declares the deployment role and its policy.
///
/// # Errors
///
/// Returns an error if a declaration is rejected.
pub fn build(
    config: &TopologyConfig,
    registry: &RegistryHandle,
    stack: &mut StackDeclaration,
) -> Result<IdentityHandle> {
    let role_name = config.role_name();

    let role = stack.declare(
        "DeploymentRole",
        ResourceProperties::Role(RoleProperties {
            role_name: Some(role_name.clone()),
            assume_role_policy: PolicyDocument::new(vec![trust_statement(
                &config.identity.trust,
                &config.project.account,
            )]),
            description: format!(
                "Pushes images to {} from {}",
                registry.repository_name,
                config.identity.trust.provider_name()
            ),
        }),
    )?;

    let document = PolicyDocument::new(vec![
        PolicyStatement::allow(&PUSH_ACTIONS).on(ResourceScope::Wildcard),
        PolicyStatement::allow(&[TOKEN_ACTION])
            .on(ResourceScope::Reference(Reference::arn(&registry.repository))),
    ]);

    let policy = stack.declare(
        "DeploymentRolePolicy",
        ResourceProperties::Policy(PolicyProperties {
            policy_name: format!("{role_name}-policy"),
            roles: vec![Reference::id(&role)],
            document,
        }),
    )?;

    info!(
        "Declared deployment role {} trusted by {}",
        role_name,
        config.identity.trust.provider_name()
    );

    Ok(IdentityHandle {
        role,
        policy,
        role_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigParser, Variant};
    use crate::topology::registry;
    use crate::topology::resource::Attribute;

    fn config(trust: &str) -> TopologyConfig {
        let yaml = format!("project:\n  name: playground\nidentity:\n  trust:\n{trust}");
        ConfigParser::new().parse_yaml(&yaml, None).unwrap()
    }

    fn assemble(config: &TopologyConfig) -> StackDeclaration {
        let mut stack = StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);
        let registry = registry::build(config, &mut stack).unwrap();
        build(config, &registry, &mut stack).unwrap();
        stack
    }

    fn policy(stack: &StackDeclaration) -> &PolicyDocument {
        match &stack.get("DeploymentRolePolicy").unwrap().resource {
            ResourceProperties::Policy(p) => &p.document,
            _ => panic!("expected policy"),
        }
    }

    #[test]
    fn test_token_statement_scoped_to_repository_arn() {
        let stack = assemble(&config("    provider: codebuild\n"));
        let doc = policy(&stack);

        assert_eq!(doc.statements.len(), 2);
        assert_eq!(doc.statements[0].resources, vec![ResourceScope::Wildcard]);
        assert_eq!(doc.statements[0].actions.len(), 7);

        let token = &doc.statements[1];
        assert_eq!(token.actions, vec![String::from(TOKEN_ACTION)]);
        assert_eq!(
            token.resources,
            vec![ResourceScope::Reference(Reference {
                target: LogicalId::new("Repository"),
                attribute: Attribute::Arn,
            })]
        );
    }

    #[test]
    fn test_codebuild_trust() {
        let stack = assemble(&config("    provider: codebuild\n"));
        match &stack.get("DeploymentRole").unwrap().resource {
            ResourceProperties::Role(role) => {
                assert_eq!(role.role_name.as_deref(), Some("playground-codebuild"));
                assert_eq!(
                    role.assume_role_policy.statements[0].principals,
                    vec![Principal::Service(String::from("codebuild.amazonaws.com"))]
                );
            }
            _ => panic!("expected role"),
        }
    }

    #[test]
    fn test_github_trust_restricts_repository() {
        let statement = trust_statement(
            &CiTrust::GithubActions {
                repository: Some(String::from("acme/app")),
            },
            "123456789012",
        );

        assert_eq!(
            statement.principals,
            vec![Principal::Federated(String::from(
                "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com"
            ))]
        );
        assert_eq!(
            statement.conditions["StringLike"]["token.actions.githubusercontent.com:sub"],
            "repo:acme/app:*"
        );
    }
}
