//! One assembly pass: configuration in, declaration tree out.
//!
//! The builders run in a fixed order (network, registry, identity,
//! workload, edge, name binding), each taking the handles of what it
//! references. Any error aborts the pass; no partial tree is returned.

use tracing::{debug, info, warn};

use crate::config::{ConfigValidator, TopologyConfig};
use crate::context::LookupContext;
use crate::error::Result;

use super::dns::{self, NameBindingHandle};
use super::edge::{EdgeBuilder, EdgeHandle};
use super::identity::{self, IdentityHandle};
use super::network::{NetworkBuilder, NetworkHandle};
use super::registry::{self, RegistryHandle};
use super::resource::{Attribute, Reference};
use super::stack::{OutputPart, StackDeclaration};
use super::workload::{self, WorkloadHandle};

/// The result of one assembly pass.
#[derive(Debug, Clone)]
pub struct AssembledTopology {
    /// The declaration tree.
    pub stack: StackDeclaration,
    /// Network handle.
    pub network: NetworkHandle,
    /// Registry handle.
    pub registry: RegistryHandle,
    /// Deployment identity handle.
    pub identity: IdentityHandle,
    /// Workload handle.
    pub workload: WorkloadHandle,
    /// Edge router handle.
    pub edge: EdgeHandle,
    /// Name binding handle, present for the HTTPS variant only.
    pub name_binding: Option<NameBindingHandle>,
}

/// Assembles a topology from configuration.
pub struct TopologyAssembler<'a> {
    config: &'a TopologyConfig,
    context: Option<&'a LookupContext>,
}

impl<'a> TopologyAssembler<'a> {
    /// Creates an assembler without a lookup context.
    #[must_use]
    pub const fn new(config: &'a TopologyConfig) -> Self {
        Self {
            config,
            context: None,
        }
    }

    /// Uses a lookup context for zones and hosted zones.
    #[must_use]
    pub const fn with_context(mut self, context: &'a LookupContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Runs the assembly pass.
    ///
    /// # Errors
    ///
    /// Returns the first configuration, assembly or precondition error.
    pub fn assemble(&self) -> Result<AssembledTopology> {
        let config = self.config;
        let validation = ConfigValidator::new().validate(config)?;
        for warning in &validation.warnings {
            warn!("{}", warning);
        }

        let tls = config.tls_binding()?;
        let variant = config.variant()?;
        let empty = LookupContext::default();
        let context = self.context.unwrap_or(&empty);

        info!(
            "Assembling stack {} ({}) in {}/{}",
            config.stack_name(),
            variant,
            config.project.account,
            config.project.region
        );

        let mut stack = StackDeclaration::new(
            config.stack_name(),
            config.project.account.clone(),
            config.project.region.clone(),
            variant,
        )
        .with_tags(config.stack_tags());

        let network = NetworkBuilder::new(&config.network, &config.project.region)
            .with_available_zones(context.available_zones(&config.project.region))
            .build(&mut stack)?;
        let registry = registry::build(config, &mut stack)?;
        let identity = identity::build(config, &registry, &mut stack)?;
        let workload = workload::build(config, &network, &registry, &mut stack)?;
        let edge = EdgeBuilder::new(
            &config.edge,
            tls.as_ref(),
            config.edge_security_group(variant),
        )
        .build(&network, &workload, &mut stack)?;

        let name_binding = match &tls {
            Some(binding) => Some(dns::build(binding, &edge, context, &mut stack)?),
            None => None,
        };

        stack.add_output(
            "LoadBalancerDnsName",
            "DNS name of the load balancer",
            vec![OutputPart::Reference(Reference::attr(
                &edge.load_balancer,
                Attribute::DnsName,
            ))],
        )?;
        stack.add_output(
            "RepositoryUri",
            "URI of the image repository",
            vec![OutputPart::Reference(Reference::attr(
                &registry.repository,
                Attribute::Uri,
            ))],
        )?;
        let service_url = match &name_binding {
            Some(binding) => vec![OutputPart::Literal(format!("https://{}", binding.domain_name))],
            None => vec![
                OutputPart::Literal(String::from("http://")),
                OutputPart::Reference(Reference::attr(&edge.load_balancer, Attribute::DnsName)),
            ],
        };
        stack.add_output("ServiceUrl", "Public URL of the service", service_url)?;

        debug!(
            "Assembled {} declarations and {} lookups",
            stack.resource_count(),
            stack.lookups.len()
        );

        Ok(AssembledTopology {
            stack,
            network,
            registry,
            identity,
            workload,
            edge,
            name_binding,
        })
    }
}
