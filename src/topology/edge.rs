//! Internet-facing load balancer, listener and target group.
//!
//! Exactly one listener is declared. With a certificate it is 443/HTTPS and
//! open to the internet; otherwise 80/HTTP without a certificate. The target
//! group always forwards to the service container on port 80.

use tracing::info;

use crate::config::{EdgeConfig, TlsBinding};
use crate::error::Result;

use super::network::NetworkHandle;
use super::resource::{
    Attribute, IngressRule, IngressSource, ListenerProperties, ListenerProtocol,
    LoadBalancerProperties, LogicalId, Reference, ResourceProperties,
    SecurityGroupIngressProperties, SecurityGroupProperties, ServiceTarget,
    TargetGroupProperties,
};
use super::stack::StackDeclaration;
use super::workload::WorkloadHandle;

/// Target group port.
pub const TARGET_PORT: u16 = 80;

const ANYWHERE: &str = "0.0.0.0/0";

/// The single listener of the load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    /// Listener port.
    pub port: u16,
    /// Listener protocol.
    pub protocol: ListenerProtocol,
    /// Certificate attached to the listener.
    pub certificate_arn: Option<String>,
    /// Whether the listener is open to the internet.
    pub open: bool,
}

impl ListenerSpec {
    /// Chooses the listener for an optional TLS binding.
    #[must_use]
    pub fn for_tls(tls: Option<&TlsBinding>) -> Self {
        match tls {
            Some(binding) => Self {
                port: 443,
                protocol: ListenerProtocol::Https,
                certificate_arn: Some(binding.certificate_arn.clone()),
                open: true,
            },
            None => Self {
                port: 80,
                protocol: ListenerProtocol::Http,
                certificate_arn: None,
                open: false,
            },
        }
    }
}

/// Handle to the declared edge router.
#[derive(Debug, Clone)]
pub struct EdgeHandle {
    /// Load balancer logical id.
    pub load_balancer: LogicalId,
    /// Load balancer security group, if any.
    pub security_group: Option<LogicalId>,
    /// Listener logical id.
    pub listener: LogicalId,
    /// Target group logical id.
    pub target_group: LogicalId,
    /// The listener that was declared.
    pub listener_spec: ListenerSpec,
}

/// Builder for the edge router.
pub struct EdgeBuilder<'a> {
    config: &'a EdgeConfig,
    tls: Option<&'a TlsBinding>,
    security_group: bool,
}

impl<'a> EdgeBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub const fn new(config: &'a EdgeConfig, tls: Option<&'a TlsBinding>, security_group: bool) -> Self {
        Self {
            config,
            tls,
            security_group,
        }
    }

    /// Declares the edge router into `stack`.
    ///
    /// # Errors
    ///
    /// Returns an error if a declaration is rejected.
    pub fn build(
        &self,
        network: &NetworkHandle,
        workload: &WorkloadHandle,
        stack: &mut StackDeclaration,
    ) -> Result<EdgeHandle> {
        let security_group = if self.security_group {
            Some(stack.declare(
                "LoadBalancerSecurityGroup",
                ResourceProperties::SecurityGroup(SecurityGroupProperties {
                    vpc: Reference::id(&network.vpc),
                    description: String::from("Public HTTP and HTTPS"),
                    ingress: vec![
                        IngressRule::tcp(IngressSource::Cidr(String::from(ANYWHERE)), 80, "HTTP"),
                        IngressRule::tcp(IngressSource::Cidr(String::from(ANYWHERE)), 443, "HTTPS"),
                    ],
                    allow_all_outbound: true,
                }),
            )?)
        } else {
            None
        };

        let load_balancer = stack.declare(
            "LoadBalancer",
            ResourceProperties::LoadBalancer(LoadBalancerProperties {
                load_balancer_type: String::from("application"),
                internet_facing: true,
                availability_zones: network.availability_zones(),
                subnets: network.public_subnets().into_iter().map(Reference::id).collect(),
                security_groups: security_group
                    .iter()
                    .map(|sg| Reference::attr(sg, Attribute::Id))
                    .collect(),
            }),
        )?;

        // Tasks only accept traffic that comes through the load balancer.
        let source = security_group.as_ref().map_or_else(
            || IngressSource::Cidr(network.vpc_cidr.clone()),
            |sg| IngressSource::SecurityGroup(Reference::id(sg)),
        );
        stack.declare(
            "ServiceIngressFromLoadBalancer",
            ResourceProperties::SecurityGroupIngress(SecurityGroupIngressProperties {
                group: Reference::id(&workload.service_security_group),
                rule: IngressRule::tcp(source, workload.container_port, "Load balancer to tasks"),
            }),
        )?;

        let target_group = stack.declare(
            "TargetGroup",
            ResourceProperties::TargetGroup(TargetGroupProperties {
                vpc: Reference::id(&network.vpc),
                port: TARGET_PORT,
                protocol: ListenerProtocol::Http,
                target_type: String::from("ip"),
                health_check_path: self.config.health_check_path.clone(),
                targets: vec![ServiceTarget {
                    service: Reference::id(&workload.service),
                    container_name: workload.container_name.clone(),
                    container_port: TARGET_PORT,
                }],
            }),
        )?;

        let listener_spec = ListenerSpec::for_tls(self.tls);
        let listener = stack.declare(
            "Listener",
            ResourceProperties::Listener(ListenerProperties {
                load_balancer: Reference::arn(&load_balancer),
                port: listener_spec.port,
                protocol: listener_spec.protocol,
                certificates: listener_spec.certificate_arn.iter().cloned().collect(),
                open: listener_spec.open,
                forward_to: Reference::arn(&target_group),
            }),
        )?;

        info!(
            "Declared load balancer with {} listener on port {}",
            listener_spec.protocol, listener_spec.port
        );

        Ok(EdgeHandle {
            load_balancer,
            security_group,
            listener,
            target_group,
            listener_spec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_without_tls_is_plain_http() {
        let spec = ListenerSpec::for_tls(None);
        assert_eq!(spec.port, 80);
        assert_eq!(spec.protocol, ListenerProtocol::Http);
        assert!(spec.certificate_arn.is_none());
        assert!(!spec.open);
    }

    #[test]
    fn test_listener_with_tls_is_open_https() {
        let binding = TlsBinding {
            domain_name: String::from("app.example.com"),
            certificate_arn: String::from("arn:aws:acm:eu-west-1:123456789012:certificate/abc"),
        };
        let spec = ListenerSpec::for_tls(Some(&binding));
        assert_eq!(spec.port, 443);
        assert_eq!(spec.protocol, ListenerProtocol::Https);
        assert_eq!(spec.certificate_arn.as_deref(), Some(binding.certificate_arn.as_str()));
        assert!(spec.open);
    }
}
