//! Resource declaration types.
//!
//! A declaration is a desired-state record for one cloud resource: a stable
//! logical id, typed properties, and the reference edges the provisioning
//! engine uses to order its work. Nothing here talks to a cloud API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{RemovalPolicy, TagMutability};

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Stable logical identifier of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Creates a logical id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribute of a declaration consumed through a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Physical id of the resource.
    Id,
    /// ARN of the resource.
    Arn,
    /// Repository URI.
    Uri,
    /// DNS name of a load balancer.
    DnsName,
    /// Canonical hosted zone of a load balancer.
    CanonicalHostedZoneId,
    /// Hosted zone id of a zone lookup.
    HostedZoneId,
    /// Allocation id of an elastic IP.
    AllocationId,
}

impl Attribute {
    /// Attribute name as used in rendered placeholders.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Arn => "arn",
            Self::Uri => "uri",
            Self::DnsName => "dns_name",
            Self::CanonicalHostedZoneId => "canonical_hosted_zone_id",
            Self::HostedZoneId => "hosted_zone_id",
            Self::AllocationId => "allocation_id",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference edge to another declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Referenced declaration.
    pub target: LogicalId,
    /// Attribute of the target being consumed.
    pub attribute: Attribute,
}

impl Reference {
    /// References the physical id of `target`.
    #[must_use]
    pub fn id(target: &LogicalId) -> Self {
        Self::attr(target, Attribute::Id)
    }

    /// References the ARN of `target`.
    #[must_use]
    pub fn arn(target: &LogicalId) -> Self {
        Self::attr(target, Attribute::Arn)
    }

    /// References an arbitrary attribute of `target`.
    #[must_use]
    pub fn attr(target: &LogicalId, attribute: Attribute) -> Self {
        Self {
            target: target.clone(),
            attribute,
        }
    }
}

/// One resource declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Stable logical id.
    pub logical_id: LogicalId,
    /// Typed properties, tagged with the resource type.
    pub resource: ResourceProperties,
    /// Tags applied to the resource.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Declaration {
    /// Returns the cloud resource type name.
    #[must_use]
    pub const fn resource_type(&self) -> &'static str {
        self.resource.resource_type()
    }

    /// Returns the distinct logical ids this declaration depends on, in
    /// first-reference order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<&LogicalId> {
        let mut deps: Vec<&LogicalId> = Vec::new();
        for reference in self.resource.references() {
            if !deps.contains(&&reference.target) {
                deps.push(&reference.target);
            }
        }
        deps
    }
}

/// Typed resource properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties")]
pub enum ResourceProperties {
    /// Virtual network.
    #[serde(rename = "AWS::EC2::VPC")]
    Vpc(VpcProperties),
    /// Internet gateway attached to the VPC.
    #[serde(rename = "AWS::EC2::InternetGateway")]
    InternetGateway(InternetGatewayProperties),
    /// Subnet in one availability zone.
    #[serde(rename = "AWS::EC2::Subnet")]
    Subnet(SubnetProperties),
    /// Route table of one subnet.
    #[serde(rename = "AWS::EC2::RouteTable")]
    RouteTable(RouteTableProperties),
    /// Elastic IP for a NAT gateway.
    #[serde(rename = "AWS::EC2::EIP")]
    ElasticIp(ElasticIpProperties),
    /// NAT gateway.
    #[serde(rename = "AWS::EC2::NatGateway")]
    NatGateway(NatGatewayProperties),
    /// Security group.
    #[serde(rename = "AWS::EC2::SecurityGroup")]
    SecurityGroup(SecurityGroupProperties),
    /// Standalone ingress rule.
    #[serde(rename = "AWS::EC2::SecurityGroupIngress")]
    SecurityGroupIngress(SecurityGroupIngressProperties),
    /// Container image repository.
    #[serde(rename = "AWS::ECR::Repository")]
    Repository(RepositoryProperties),
    /// Assumable role.
    #[serde(rename = "AWS::IAM::Role")]
    Role(RoleProperties),
    /// Inline policy attached to roles.
    #[serde(rename = "AWS::IAM::Policy")]
    Policy(PolicyProperties),
    /// Container cluster.
    #[serde(rename = "AWS::ECS::Cluster")]
    Cluster(ClusterProperties),
    /// Log group.
    #[serde(rename = "AWS::Logs::LogGroup")]
    LogGroup(LogGroupProperties),
    /// Task specification.
    #[serde(rename = "AWS::ECS::TaskDefinition")]
    TaskDefinition(TaskDefinitionProperties),
    /// Running service.
    #[serde(rename = "AWS::ECS::Service")]
    Service(ServiceProperties),
    /// Application load balancer.
    #[serde(rename = "AWS::ElasticLoadBalancingV2::LoadBalancer")]
    LoadBalancer(LoadBalancerProperties),
    /// Target group.
    #[serde(rename = "AWS::ElasticLoadBalancingV2::TargetGroup")]
    TargetGroup(TargetGroupProperties),
    /// Listener.
    #[serde(rename = "AWS::ElasticLoadBalancingV2::Listener")]
    Listener(ListenerProperties),
    /// DNS record.
    #[serde(rename = "AWS::Route53::RecordSet")]
    RecordSet(RecordSetProperties),
}

/// VPC properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcProperties {
    /// VPC CIDR block.
    pub cidr_block: String,
    /// Enable DNS hostnames.
    pub enable_dns_hostnames: bool,
    /// Enable DNS resolution.
    pub enable_dns_support: bool,
}

/// Internet gateway properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternetGatewayProperties {
    /// VPC the gateway is attached to.
    pub vpc: Reference,
}

/// Subnet tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubnetTier {
    /// Routed through the internet gateway.
    Public,
    /// Routed through a NAT gateway.
    PrivateWithEgress,
}

/// Subnet properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetProperties {
    /// Owning VPC.
    pub vpc: Reference,
    /// Availability zone.
    pub availability_zone: String,
    /// Subnet CIDR block.
    pub cidr_block: String,
    /// Subnet tier.
    pub tier: SubnetTier,
    /// Assign public IPs to instances launched here.
    pub map_public_ip_on_launch: bool,
}

/// Route table properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableProperties {
    /// Owning VPC.
    pub vpc: Reference,
    /// Associated subnet.
    pub subnet: Reference,
    /// Target of the `0.0.0.0/0` route.
    pub default_route: Reference,
}

/// Elastic IP properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticIpProperties {
    /// Address domain (`vpc`).
    pub domain: String,
}

/// NAT gateway properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatGatewayProperties {
    /// Public subnet hosting the gateway.
    pub subnet: Reference,
    /// Elastic IP allocation.
    pub allocation: Reference,
}

/// Source of an ingress rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressSource {
    /// An IPv4 CIDR block.
    Cidr(String),
    /// Members of another security group.
    SecurityGroup(Reference),
}

/// One inbound rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    /// Traffic source.
    pub source: IngressSource,
    /// IP protocol.
    pub protocol: String,
    /// Destination port.
    pub port: u16,
    /// Rule description.
    pub description: String,
}

impl IngressRule {
    /// TCP rule on one port.
    #[must_use]
    pub fn tcp(source: IngressSource, port: u16, description: impl Into<String>) -> Self {
        Self {
            source,
            protocol: String::from("tcp"),
            port,
            description: description.into(),
        }
    }
}

/// Security group properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupProperties {
    /// Owning VPC.
    pub vpc: Reference,
    /// Group description.
    pub description: String,
    /// Inbound rules.
    pub ingress: Vec<IngressRule>,
    /// Allow all outbound traffic.
    pub allow_all_outbound: bool,
}

/// Standalone ingress rule properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupIngressProperties {
    /// Group receiving the rule.
    pub group: Reference,
    /// The rule.
    pub rule: IngressRule,
}

/// Repository properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryProperties {
    /// Repository name.
    pub repository_name: String,
    /// Scan on push.
    pub image_scan_on_push: bool,
    /// Tag mutability.
    pub image_tag_mutability: TagMutability,
    /// Resource policy.
    pub repository_policy: PolicyDocument,
    /// Removal policy.
    pub removal_policy: RemovalPolicy,
}

/// Policy statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the actions.
    Allow,
    /// Deny the actions.
    Deny,
}

/// Principal of a policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// Explicit IAM ARN.
    Arn(String),
    /// AWS service principal.
    Service(String),
    /// Federated identity provider.
    Federated(String),
}

/// Resource scope of a policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// Every resource (`*`).
    Wildcard,
    /// A declared resource.
    Reference(Reference),
}

/// One policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Statement effect.
    pub effect: Effect,
    /// Principals (resource and trust policies only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<Principal>,
    /// Actions.
    pub actions: Vec<String>,
    /// Resources (identity policies only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceScope>,
    /// Conditions: operator -> key -> value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, BTreeMap<String, String>>,
}

impl PolicyStatement {
    /// Creates an allow statement for `actions`.
    #[must_use]
    pub fn allow(actions: &[&str]) -> Self {
        Self {
            effect: Effect::Allow,
            principals: Vec::new(),
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            resources: Vec::new(),
            conditions: BTreeMap::new(),
        }
    }

    /// Adds a principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    /// Adds a resource scope.
    #[must_use]
    pub fn on(mut self, scope: ResourceScope) -> Self {
        self.resources.push(scope);
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.conditions
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }
}

/// Policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Policy language version.
    pub version: String,
    /// Statements.
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    /// Creates a document from statements.
    #[must_use]
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: String::from(POLICY_VERSION),
            statements,
        }
    }
}

/// Role properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProperties {
    /// Explicit role name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    /// Trust policy.
    pub assume_role_policy: PolicyDocument,
    /// Role description.
    pub description: String,
}

/// Inline policy properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyProperties {
    /// Policy name.
    pub policy_name: String,
    /// Roles the policy is attached to.
    pub roles: Vec<Reference>,
    /// Policy document.
    pub document: PolicyDocument,
}

/// Cluster properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProperties {
    /// Cluster name.
    pub cluster_name: String,
    /// VPC the cluster's tasks run in.
    pub vpc: Reference,
}

/// Log group properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroupProperties {
    /// Retention in days; unset keeps logs forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

/// Image source of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    /// Repository URI.
    pub repository: Reference,
    /// Image tag.
    pub tag: String,
}

/// Container port mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port inside the container.
    pub container_port: u16,
    /// Protocol.
    pub protocol: String,
}

/// Log sink of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfiguration {
    /// Log driver.
    pub driver: String,
    /// Destination log group.
    pub log_group: Reference,
    /// Stream prefix.
    pub stream_prefix: String,
    /// Region of the log group.
    pub region: String,
}

/// Container definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    /// Container name.
    pub name: String,
    /// Image source.
    pub image: ImageSource,
    /// Whether the task stops when this container stops.
    pub essential: bool,
    /// Port mappings.
    pub port_mappings: Vec<PortMapping>,
    /// Log configuration.
    pub log_configuration: LogConfiguration,
}

/// Task definition properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionProperties {
    /// Task family.
    pub family: String,
    /// CPU units.
    pub cpu: u32,
    /// Memory in MiB.
    pub memory_mib: u32,
    /// Network mode.
    pub network_mode: String,
    /// Launch types the task is compatible with.
    pub requires_compatibilities: Vec<String>,
    /// Role used to pull images and ship logs.
    pub execution_role: Reference,
    /// Role assumed by the application.
    pub task_role: Reference,
    /// Containers.
    pub containers: Vec<ContainerDefinition>,
}

/// Service properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProperties {
    /// Service name.
    pub service_name: String,
    /// Cluster.
    pub cluster: Reference,
    /// Task definition.
    pub task_definition: Reference,
    /// Launch type.
    pub launch_type: String,
    /// Desired replica count.
    pub desired_count: u32,
    /// Assign public IPs to tasks.
    pub assign_public_ip: bool,
    /// Zones the service is placed in.
    pub availability_zones: Vec<String>,
    /// Subnets the service is placed in.
    pub subnets: Vec<Reference>,
    /// Security groups of the tasks.
    pub security_groups: Vec<Reference>,
}

/// Load balancer properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerProperties {
    /// Load balancer type.
    pub load_balancer_type: String,
    /// Internet-facing (true) or internal.
    pub internet_facing: bool,
    /// Zones the load balancer spans.
    pub availability_zones: Vec<String>,
    /// Subnets the load balancer is placed in.
    pub subnets: Vec<Reference>,
    /// Security groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<Reference>,
}

/// Listener and target protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListenerProtocol {
    /// Plain HTTP.
    Http,
    /// TLS-terminated HTTPS.
    Https,
}

impl fmt::Display for ListenerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("HTTP"),
            Self::Https => f.write_str("HTTPS"),
        }
    }
}

/// A service registered as a load balancer target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    /// Registered service.
    pub service: Reference,
    /// Container receiving traffic.
    pub container_name: String,
    /// Container port receiving traffic.
    pub container_port: u16,
}

/// Target group properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupProperties {
    /// Owning VPC.
    pub vpc: Reference,
    /// Target port.
    pub port: u16,
    /// Target protocol.
    pub protocol: ListenerProtocol,
    /// Target type (`ip` for awsvpc tasks).
    pub target_type: String,
    /// Health check path.
    pub health_check_path: String,
    /// Registered targets.
    pub targets: Vec<ServiceTarget>,
}

/// Listener properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerProperties {
    /// Load balancer.
    pub load_balancer: Reference,
    /// Listener port.
    pub port: u16,
    /// Listener protocol.
    pub protocol: ListenerProtocol,
    /// Certificate ARNs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<String>,
    /// Whether the listener is open to the internet.
    pub open: bool,
    /// Target group receiving forwarded requests.
    pub forward_to: Reference,
}

/// Alias target of a DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTarget {
    /// DNS name of the target.
    pub dns_name: Reference,
    /// Hosted zone of the target.
    pub hosted_zone_id: Reference,
    /// Evaluate target health.
    pub evaluate_target_health: bool,
}

/// DNS record properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSetProperties {
    /// Hosted zone of the record.
    pub hosted_zone: Reference,
    /// Record name.
    pub record_name: String,
    /// Record type.
    pub record_type: String,
    /// Alias target.
    pub alias_target: AliasTarget,
}

impl ResourceProperties {
    /// Returns the cloud resource type name.
    #[must_use]
    pub const fn resource_type(&self) -> &'static str {
        match self {
            Self::Vpc(_) => "AWS::EC2::VPC",
            Self::InternetGateway(_) => "AWS::EC2::InternetGateway",
            Self::Subnet(_) => "AWS::EC2::Subnet",
            Self::RouteTable(_) => "AWS::EC2::RouteTable",
            Self::ElasticIp(_) => "AWS::EC2::EIP",
            Self::NatGateway(_) => "AWS::EC2::NatGateway",
            Self::SecurityGroup(_) => "AWS::EC2::SecurityGroup",
            Self::SecurityGroupIngress(_) => "AWS::EC2::SecurityGroupIngress",
            Self::Repository(_) => "AWS::ECR::Repository",
            Self::Role(_) => "AWS::IAM::Role",
            Self::Policy(_) => "AWS::IAM::Policy",
            Self::Cluster(_) => "AWS::ECS::Cluster",
            Self::LogGroup(_) => "AWS::Logs::LogGroup",
            Self::TaskDefinition(_) => "AWS::ECS::TaskDefinition",
            Self::Service(_) => "AWS::ECS::Service",
            Self::LoadBalancer(_) => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            Self::TargetGroup(_) => "AWS::ElasticLoadBalancingV2::TargetGroup",
            Self::Listener(_) => "AWS::ElasticLoadBalancingV2::Listener",
            Self::RecordSet(_) => "AWS::Route53::RecordSet",
        }
    }

    /// Returns true if a declaration of this type exposes `attribute`.
    ///
    /// Hosted-zone ids only come from lookups, never from declarations.
    #[must_use]
    pub const fn provides(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::Id => true,
            Attribute::Arn => matches!(
                self,
                Self::Repository(_)
                    | Self::Role(_)
                    | Self::Cluster(_)
                    | Self::LogGroup(_)
                    | Self::TaskDefinition(_)
                    | Self::Service(_)
                    | Self::LoadBalancer(_)
                    | Self::TargetGroup(_)
                    | Self::Listener(_)
            ),
            Attribute::Uri => matches!(self, Self::Repository(_)),
            Attribute::DnsName | Attribute::CanonicalHostedZoneId => matches!(self, Self::LoadBalancer(_)),
            Attribute::AllocationId => matches!(self, Self::ElasticIp(_)),
            Attribute::HostedZoneId => false,
        }
    }

    /// Returns true if the resource type accepts tags.
    #[must_use]
    pub const fn is_taggable(&self) -> bool {
        !matches!(
            self,
            Self::RouteTable(_)
                | Self::SecurityGroupIngress(_)
                | Self::Policy(_)
                | Self::Listener(_)
                | Self::RecordSet(_)
        )
    }

    /// Returns every reference edge held by the properties.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        match self {
            Self::Vpc(_) | Self::ElasticIp(_) | Self::LogGroup(_) => Vec::new(),
            Self::InternetGateway(p) => vec![&p.vpc],
            Self::Subnet(p) => vec![&p.vpc],
            Self::RouteTable(p) => vec![&p.vpc, &p.subnet, &p.default_route],
            Self::NatGateway(p) => vec![&p.subnet, &p.allocation],
            Self::SecurityGroup(p) => {
                let mut refs = vec![&p.vpc];
                refs.extend(p.ingress.iter().filter_map(IngressRule::source_reference));
                refs
            }
            Self::SecurityGroupIngress(p) => {
                let mut refs = vec![&p.group];
                refs.extend(p.rule.source_reference());
                refs
            }
            Self::Repository(p) => p.repository_policy.references(),
            Self::Role(p) => p.assume_role_policy.references(),
            Self::Policy(p) => {
                let mut refs: Vec<&Reference> = p.roles.iter().collect();
                refs.extend(p.document.references());
                refs
            }
            Self::Cluster(p) => vec![&p.vpc],
            Self::TaskDefinition(p) => {
                let mut refs = vec![&p.execution_role, &p.task_role];
                for container in &p.containers {
                    refs.push(&container.image.repository);
                    refs.push(&container.log_configuration.log_group);
                }
                refs
            }
            Self::Service(p) => {
                let mut refs = vec![&p.cluster, &p.task_definition];
                refs.extend(&p.subnets);
                refs.extend(&p.security_groups);
                refs
            }
            Self::LoadBalancer(p) => p.subnets.iter().chain(&p.security_groups).collect(),
            Self::TargetGroup(p) => {
                let mut refs = vec![&p.vpc];
                refs.extend(p.targets.iter().map(|t| &t.service));
                refs
            }
            Self::Listener(p) => vec![&p.load_balancer, &p.forward_to],
            Self::RecordSet(p) => vec![
                &p.hosted_zone,
                &p.alias_target.dns_name,
                &p.alias_target.hosted_zone_id,
            ],
        }
    }
}

impl IngressRule {
    fn source_reference(&self) -> Option<&Reference> {
        match &self.source {
            IngressSource::SecurityGroup(reference) => Some(reference),
            IngressSource::Cidr(_) => None,
        }
    }
}

impl PolicyDocument {
    fn references(&self) -> Vec<&Reference> {
        self.statements
            .iter()
            .flat_map(|s| &s.resources)
            .filter_map(|scope| match scope {
                ResourceScope::Reference(reference) => Some(reference),
                ResourceScope::Wildcard => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_serializes_with_resource_type() {
        let decl = Declaration {
            logical_id: LogicalId::new("Vpc"),
            resource: ResourceProperties::Vpc(VpcProperties {
                cidr_block: String::from("10.0.0.0/16"),
                enable_dns_hostnames: true,
                enable_dns_support: true,
            }),
            tags: BTreeMap::new(),
        };

        let json = serde_json::to_value(&decl).unwrap();
        assert_eq!(json["logical_id"], "Vpc");
        assert_eq!(json["resource"]["type"], "AWS::EC2::VPC");
        assert_eq!(json["resource"]["properties"]["cidr_block"], "10.0.0.0/16");
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_only_load_balancers_provide_dns_attributes() {
        let vpc = ResourceProperties::Vpc(VpcProperties {
            cidr_block: String::from("10.0.0.0/16"),
            enable_dns_hostnames: true,
            enable_dns_support: true,
        });
        assert!(vpc.provides(Attribute::Id));
        assert!(!vpc.provides(Attribute::Arn));
        assert!(!vpc.provides(Attribute::DnsName));
        assert!(!vpc.provides(Attribute::HostedZoneId));

        for attribute in [Attribute::DnsName, Attribute::CanonicalHostedZoneId, Attribute::AllocationId] {
            assert_eq!(serde_json::to_value(attribute).unwrap(), attribute.as_str());
        }
    }

    #[test]
    fn test_dependencies_are_distinct() {
        let vpc = LogicalId::new("Vpc");
        let subnet = LogicalId::new("Subnet");
        let decl = Declaration {
            logical_id: LogicalId::new("RouteTable"),
            resource: ResourceProperties::RouteTable(RouteTableProperties {
                vpc: Reference::id(&vpc),
                subnet: Reference::id(&subnet),
                default_route: Reference::id(&vpc),
            }),
            tags: BTreeMap::new(),
        };

        assert_eq!(decl.dependencies(), vec![&vpc, &subnet]);
    }

    #[test]
    fn test_wildcard_scope_is_not_a_reference() {
        let repo = LogicalId::new("Repository");
        let doc = PolicyDocument::new(vec![
            PolicyStatement::allow(&["ecr:PutImage"]).on(ResourceScope::Wildcard),
            PolicyStatement::allow(&["ecr:GetAuthorizationToken"])
                .on(ResourceScope::Reference(Reference::arn(&repo))),
        ]);

        let refs = doc.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, repo);
        assert_eq!(refs[0].attribute, Attribute::Arn);
    }

    #[test]
    fn test_condition_builder_groups_by_operator() {
        let statement = PolicyStatement::allow(&["sts:AssumeRoleWithWebIdentity"])
            .with_condition("StringEquals", "aud", "sts.amazonaws.com")
            .with_condition("StringLike", "sub", "repo:acme/app:*");

        assert_eq!(statement.conditions.len(), 2);
        assert_eq!(statement.conditions["StringLike"]["sub"], "repo:acme/app:*");
    }
}
