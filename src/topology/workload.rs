//! Cluster, task definition and service.
//!
//! The service is the one place where placement matters: it must never get
//! a public IP and must only run in private subnets. Both rules are checked
//! here, when the service is declared, not left to the engine.

use tracing::info;

use crate::config::TopologyConfig;
use crate::error::{AssemblyError, Result};

use super::network::NetworkHandle;
use super::registry::RegistryHandle;
use super::resource::{
    Attribute, ClusterProperties, ContainerDefinition, ImageSource, LogConfiguration, LogGroupProperties,
    LogicalId, PolicyDocument, PolicyProperties, PolicyStatement, PortMapping, Principal,
    Reference, ResourceProperties, ResourceScope, RoleProperties, SecurityGroupProperties,
    ServiceProperties, TaskDefinitionProperties,
};
use super::stack::StackDeclaration;

/// Task CPU units.
pub const TASK_CPU: u32 = 256;
/// Task memory in MiB.
pub const TASK_MEMORY_MIB: u32 = 512;
/// Port the container listens on.
pub const CONTAINER_PORT: u16 = 80;
/// Desired replica count.
pub const DESIRED_COUNT: u32 = 1;

const PULL_ACTIONS: [&str; 3] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

const LOG_ACTIONS: [&str; 2] = ["logs:CreateLogStream", "logs:PutLogEvents"];

/// Handle to the declared workload.
#[derive(Debug, Clone)]
pub struct WorkloadHandle {
    /// Cluster logical id.
    pub cluster: LogicalId,
    /// Task definition logical id.
    pub task_definition: LogicalId,
    /// Service logical id.
    pub service: LogicalId,
    /// Security group of the service tasks.
    pub service_security_group: LogicalId,
    /// Name of the container receiving traffic.
    pub container_name: String,
    /// Port of the container receiving traffic.
    pub container_port: u16,
}

/// Desired service placement, checked before the service is declared.
#[derive(Debug, Clone)]
pub struct ServicePlacement<'a> {
    /// Subnets the service runs in.
    pub subnets: Vec<&'a LogicalId>,
    /// Whether tasks get a public IP.
    pub assign_public_ip: bool,
}

impl ServicePlacement<'_> {
    /// Checks the placement against the network.
    ///
    /// # Errors
    ///
    /// Returns a placement violation if a public IP is requested, no subnet
    /// is given, or any subnet is not private.
    pub fn check(&self, network: &NetworkHandle) -> Result<()> {
        if self.assign_public_ip {
            return Err(AssemblyError::placement("Service", "tasks must not get a public IP").into());
        }
        if self.subnets.is_empty() {
            return Err(AssemblyError::placement("Service", "no subnets to place tasks in").into());
        }
        if let Some(subnet) = self.subnets.iter().find(|s| !network.is_private(s)) {
            return Err(AssemblyError::placement(
                "Service",
                format!("subnet '{subnet}' is not a private subnet"),
            )
            .into());
        }
        Ok(())
    }
}

/// Declares the cluster, the task definition and the service.
///
/// # Errors
///
/// Returns an error if a declaration is rejected or the service placement
/// is invalid.
pub fn build(
    config: &TopologyConfig,
    network: &NetworkHandle,
    registry: &RegistryHandle,
    stack: &mut StackDeclaration,
) -> Result<WorkloadHandle> {
    let cluster_name = config.cluster_name();
    let container_name = config.container_name();

    let cluster = stack.declare(
        "Cluster",
        ResourceProperties::Cluster(ClusterProperties {
            cluster_name: cluster_name.clone(),
            vpc: Reference::id(&network.vpc),
        }),
    )?;

    let log_group = stack.declare(
        "ContainerLogGroup",
        ResourceProperties::LogGroup(LogGroupProperties {
            retention_days: config.workload.log_retention_days,
        }),
    )?;

    let execution_role = stack.declare(
        "TaskExecutionRole",
        ResourceProperties::Role(RoleProperties {
            role_name: None,
            assume_role_policy: ecs_tasks_trust(),
            description: String::from("Pulls the task image and ships container logs"),
        }),
    )?;

    stack.declare(
        "TaskExecutionRolePolicy",
        ResourceProperties::Policy(PolicyProperties {
            policy_name: format!("{cluster_name}-task-execution"),
            roles: vec![Reference::id(&execution_role)],
            document: PolicyDocument::new(vec![
                PolicyStatement::allow(&PULL_ACTIONS)
                    .on(ResourceScope::Reference(Reference::arn(&registry.repository))),
                PolicyStatement::allow(&["ecr:GetAuthorizationToken"]).on(ResourceScope::Wildcard),
                PolicyStatement::allow(&LOG_ACTIONS)
                    .on(ResourceScope::Reference(Reference::arn(&log_group))),
            ]),
        }),
    )?;

    let task_role = stack.declare(
        "TaskRole",
        ResourceProperties::Role(RoleProperties {
            role_name: None,
            assume_role_policy: ecs_tasks_trust(),
            description: String::from("Assumed by the application container"),
        }),
    )?;

    let task_definition = stack.declare(
        "TaskDefinition",
        ResourceProperties::TaskDefinition(TaskDefinitionProperties {
            family: config.project.name.clone(),
            cpu: TASK_CPU,
            memory_mib: TASK_MEMORY_MIB,
            network_mode: String::from("awsvpc"),
            requires_compatibilities: vec![String::from("FARGATE")],
            execution_role: Reference::arn(&execution_role),
            task_role: Reference::arn(&task_role),
            containers: vec![ContainerDefinition {
                name: container_name.clone(),
                image: ImageSource {
                    repository: Reference::attr(&registry.repository, Attribute::Uri),
                    tag: config.workload.image_tag.clone(),
                },
                essential: true,
                port_mappings: vec![PortMapping {
                    container_port: CONTAINER_PORT,
                    protocol: String::from("tcp"),
                }],
                log_configuration: LogConfiguration {
                    driver: String::from("awslogs"),
                    log_group: Reference::id(&log_group),
                    stream_prefix: config.log_stream_prefix(),
                    region: config.project.region.clone(),
                },
            }],
        }),
    )?;

    let service_security_group = stack.declare(
        "ServiceSecurityGroup",
        ResourceProperties::SecurityGroup(SecurityGroupProperties {
            vpc: Reference::id(&network.vpc),
            description: format!("{} service tasks", config.project.name),
            ingress: Vec::new(),
            allow_all_outbound: true,
        }),
    )?;

    let placement = ServicePlacement {
        subnets: network.private_subnets(),
        assign_public_ip: false,
    };
    placement.check(network)?;

    let service = stack.declare(
        "Service",
        ResourceProperties::Service(ServiceProperties {
            service_name: format!("{}-service", config.project.name),
            cluster: Reference::id(&cluster),
            task_definition: Reference::arn(&task_definition),
            launch_type: String::from("FARGATE"),
            desired_count: DESIRED_COUNT,
            assign_public_ip: placement.assign_public_ip,
            availability_zones: network.availability_zones(),
            subnets: placement.subnets.into_iter().map(Reference::id).collect(),
            security_groups: vec![Reference::attr(&service_security_group, Attribute::Id)],
        }),
    )?;

    info!(
        "Declared service in cluster {} ({} private subnets)",
        cluster_name,
        network.zones.len()
    );

    Ok(WorkloadHandle {
        cluster,
        task_definition,
        service,
        service_security_group,
        container_name,
        container_port: CONTAINER_PORT,
    })
}

fn ecs_tasks_trust() -> PolicyDocument {
    PolicyDocument::new(vec![PolicyStatement::allow(&["sts:AssumeRole"])
        .with_principal(Principal::Service(String::from("ecs-tasks.amazonaws.com")))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigParser, NetworkConfig, Variant};
    use crate::topology::network::NetworkBuilder;
    use crate::topology::registry;

    fn config() -> TopologyConfig {
        ConfigParser::new()
            .parse_yaml(
                "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n",
                None,
            )
            .unwrap()
    }

    fn network(stack: &mut StackDeclaration) -> NetworkHandle {
        NetworkBuilder::new(&NetworkConfig::default(), "eu-west-1")
            .build(stack)
            .unwrap()
    }

    #[test]
    fn test_service_is_private_without_public_ip() {
        let config = config();
        let mut stack = StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);
        let network = network(&mut stack);
        let registry = registry::build(&config, &mut stack).unwrap();
        build(&config, &network, &registry, &mut stack).unwrap();

        match &stack.get("Service").unwrap().resource {
            ResourceProperties::Service(service) => {
                assert!(!service.assign_public_ip);
                assert_eq!(service.desired_count, 1);
                assert_eq!(service.subnets.len(), 3);
                assert!(service.subnets.iter().all(|s| network.is_private(&s.target)));
            }
            _ => panic!("expected service"),
        }
    }

    #[test]
    fn test_task_definition_sizes_and_image() {
        let config = config();
        let mut stack = StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);
        let network = network(&mut stack);
        let registry = registry::build(&config, &mut stack).unwrap();
        let workload = build(&config, &network, &registry, &mut stack).unwrap();

        assert_eq!(workload.container_name, "playground-container");
        match &stack.get("TaskDefinition").unwrap().resource {
            ResourceProperties::TaskDefinition(task) => {
                assert_eq!(task.cpu, 256);
                assert_eq!(task.memory_mib, 512);
                assert_eq!(task.containers.len(), 1);
                let container = &task.containers[0];
                assert_eq!(container.image.repository.target, registry.repository);
                assert_eq!(container.port_mappings[0].container_port, 80);
                assert_eq!(container.log_configuration.driver, "awslogs");
                assert_eq!(container.log_configuration.stream_prefix, "playground");
            }
            _ => panic!("expected task definition"),
        }
    }

    #[test]
    fn test_public_placement_rejected() {
        let mut stack = StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);
        let network = network(&mut stack);

        let public = ServicePlacement {
            subnets: network.public_subnets(),
            assign_public_ip: false,
        };
        assert!(public.check(&network).is_err());

        let with_ip = ServicePlacement {
            subnets: network.private_subnets(),
            assign_public_ip: true,
        };
        let err = with_ip.check(&network).unwrap_err();
        assert!(err.to_string().contains("public IP"));
    }
}
