//! Hosted-zone lookup and alias record.

use tracing::{info, warn};

use crate::config::TlsBinding;
use crate::context::{LookupContext, ZoneLookup};
use crate::error::{PreconditionError, Result};

use super::edge::EdgeHandle;
use super::resource::{AliasTarget, Attribute, LogicalId, Reference, RecordSetProperties, ResourceProperties};
use super::stack::StackDeclaration;

/// Handle to the declared name binding.
#[derive(Debug, Clone)]
pub struct NameBindingHandle {
    /// Hosted-zone lookup logical id.
    pub hosted_zone: LogicalId,
    /// Alias record logical id.
    pub record: LogicalId,
    /// Record name.
    pub domain_name: String,
}

/// Looks up the hosted zone for the domain and aliases the domain to the
/// load balancer.
///
/// A zone the context reports as absent fails the pass. A zone the context
/// knows nothing about is left for the engine to look up.
///
/// # Errors
///
/// Returns an error if the hosted zone is known to be absent or a
/// declaration is rejected.
pub fn build(
    tls: &TlsBinding,
    edge: &EdgeHandle,
    context: &LookupContext,
    stack: &mut StackDeclaration,
) -> Result<NameBindingHandle> {
    let domain_name = tls.domain_name.clone();

    let resolved = match context.hosted_zone(&domain_name) {
        ZoneLookup::Resolved(zone) => Some(zone),
        ZoneLookup::Absent => {
            return Err(PreconditionError::HostedZoneNotFound { domain_name }.into());
        }
        ZoneLookup::Unknown => {
            warn!("Hosted zone for {} is not in the lookup context; deferring lookup", domain_name);
            None
        }
    };

    let hosted_zone = stack.declare_lookup("HostedZone", domain_name.clone(), resolved)?;

    let record = stack.declare(
        "AliasRecord",
        ResourceProperties::RecordSet(RecordSetProperties {
            hosted_zone: Reference::attr(&hosted_zone, Attribute::HostedZoneId),
            record_name: domain_name.clone(),
            record_type: String::from("A"),
            alias_target: AliasTarget {
                dns_name: Reference::attr(&edge.load_balancer, Attribute::DnsName),
                hosted_zone_id: Reference::attr(&edge.load_balancer, Attribute::CanonicalHostedZoneId),
                evaluate_target_health: false,
            },
        }),
    )?;

    info!("Declared alias record {} -> load balancer", domain_name);

    Ok(NameBindingHandle {
        hosted_zone,
        record,
        domain_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;
    use crate::error::EdgestackError;
    use crate::topology::edge::ListenerSpec;
    use crate::topology::resource::LoadBalancerProperties;
    use crate::topology::ResolvedZone;

    fn binding() -> TlsBinding {
        TlsBinding {
            domain_name: String::from("example.com"),
            certificate_arn: String::from("arn:aws:acm:eu-west-1:123456789012:certificate/x"),
        }
    }

    fn edge_stack() -> (StackDeclaration, EdgeHandle) {
        let mut stack = StackDeclaration::new("playground-dev", "123456789012", "eu-west-1", Variant::HttpsWithDns);
        let load_balancer = stack
            .declare(
                "LoadBalancer",
                ResourceProperties::LoadBalancer(LoadBalancerProperties {
                    load_balancer_type: String::from("application"),
                    internet_facing: true,
                    availability_zones: vec![String::from("eu-west-1a")],
                    subnets: vec![],
                    security_groups: vec![],
                }),
            )
            .unwrap();

        let handle = EdgeHandle {
            load_balancer,
            security_group: None,
            listener: LogicalId::new("Listener"),
            target_group: LogicalId::new("TargetGroup"),
            listener_spec: ListenerSpec::for_tls(Some(&binding())),
        };
        (stack, handle)
    }

    fn record(stack: &StackDeclaration) -> &RecordSetProperties {
        match &stack.get("AliasRecord").unwrap().resource {
            ResourceProperties::RecordSet(r) => r,
            _ => panic!("expected record set"),
        }
    }

    #[test]
    fn test_unknown_zone_is_deferred() {
        let (mut stack, edge) = edge_stack();
        let handle = build(&binding(), &edge, &LookupContext::new(), &mut stack).unwrap();

        assert_eq!(handle.domain_name, "example.com");
        assert!(stack.lookup("HostedZone").unwrap().is_deferred());

        let record = record(&stack);
        assert_eq!(record.record_name, "example.com");
        assert_eq!(record.record_type, "A");
        assert_eq!(record.hosted_zone.target, handle.hosted_zone);
        assert_eq!(record.alias_target.dns_name.target, edge.load_balancer);
        assert_eq!(record.alias_target.dns_name.attribute, Attribute::DnsName);
        assert_eq!(
            record.alias_target.hosted_zone_id.attribute,
            Attribute::CanonicalHostedZoneId
        );
    }

    #[test]
    fn test_cached_zone_is_attached_to_lookup() {
        let (mut stack, edge) = edge_stack();
        let mut context = LookupContext::new();
        context.record_hosted_zone(
            "example.com",
            Some(ResolvedZone {
                zone_id: String::from("Z42"),
                name: String::from("example.com"),
            }),
        );

        build(&binding(), &edge, &context, &mut stack).unwrap();

        let lookup = stack.lookup("HostedZone").unwrap();
        assert!(!lookup.is_deferred());
        assert_eq!(lookup.resolved.as_ref().unwrap().zone_id, "Z42");
    }

    #[test]
    fn test_absent_zone_declares_nothing() {
        let (mut stack, edge) = edge_stack();
        let mut context = LookupContext::new();
        context.record_hosted_zone("example.com", None);

        let err = build(&binding(), &edge, &context, &mut stack).unwrap_err();

        assert!(matches!(
            err,
            EdgestackError::Precondition(PreconditionError::HostedZoneNotFound { ref domain_name })
                if domain_name == "example.com"
        ));
        assert!(stack.lookup("HostedZone").is_none());
        assert!(stack.get("AliasRecord").is_none());
    }
}
