//! VPC, subnets, gateways and routing.
//!
//! Every zone gets one public and one private subnet. Blocks are carved
//! sequentially from the VPC CIDR: all public blocks first, then all
//! private blocks. NAT gateways live in the first N public subnets and
//! private subnet `i` routes through gateway `i mod N`.

use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::error::{AssemblyError, ConfigError, Result};

use super::cidr::Ipv4Block;
use super::resource::{
    Attribute, ElasticIpProperties, InternetGatewayProperties, LogicalId, NatGatewayProperties,
    Reference, ResourceProperties, RouteTableProperties, SubnetProperties, SubnetTier,
    VpcProperties,
};
use super::stack::StackDeclaration;

/// The pair of subnets created in one availability zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSubnets {
    /// Availability zone.
    pub availability_zone: String,
    /// Public subnet (load balancer, NAT gateways).
    pub public_subnet: LogicalId,
    /// Private subnet with egress (service tasks).
    pub private_subnet: LogicalId,
}

/// Handle to a declared network.
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    /// VPC logical id.
    pub vpc: LogicalId,
    /// VPC CIDR block.
    pub vpc_cidr: String,
    /// Subnets of every zone actually created, in zone order.
    pub zones: Vec<ZoneSubnets>,
    /// NAT gateways.
    pub nat_gateways: Vec<LogicalId>,
}

impl NetworkHandle {
    /// Zones actually created.
    #[must_use]
    pub fn availability_zones(&self) -> Vec<String> {
        self.zones
            .iter()
            .map(|z| z.availability_zone.clone())
            .collect()
    }

    /// Public subnets, in zone order.
    #[must_use]
    pub fn public_subnets(&self) -> Vec<&LogicalId> {
        self.zones.iter().map(|z| &z.public_subnet).collect()
    }

    /// Private subnets, in zone order.
    #[must_use]
    pub fn private_subnets(&self) -> Vec<&LogicalId> {
        self.zones.iter().map(|z| &z.private_subnet).collect()
    }

    /// Returns true if `subnet` is one of the private subnets.
    #[must_use]
    pub fn is_private(&self, subnet: &LogicalId) -> bool {
        self.zones.iter().any(|z| &z.private_subnet == subnet)
    }
}

/// Builder for the network topology.
pub struct NetworkBuilder<'a> {
    config: &'a NetworkConfig,
    region: &'a str,
    available_zones: Option<&'a [String]>,
}

impl<'a> NetworkBuilder<'a> {
    /// Creates a builder for `region`.
    #[must_use]
    pub const fn new(config: &'a NetworkConfig, region: &'a str) -> Self {
        Self {
            config,
            region,
            available_zones: None,
        }
    }

    /// Restricts zone selection to the zones the account actually has.
    #[must_use]
    pub const fn with_available_zones(mut self, zones: Option<&'a [String]>) -> Self {
        self.available_zones = zones;
        self
    }

    /// Selects the zones to span.
    ///
    /// # Errors
    ///
    /// Returns an error if no zone survives selection.
    pub fn select_zones(&self) -> Result<Vec<String>> {
        let candidates = self.config.candidate_zones(self.region);
        let zones: Vec<String> = candidates
            .iter()
            .filter(|zone| self.available_zones.is_none_or(|available| available.contains(*zone)))
            .take(self.config.max_azs)
            .cloned()
            .collect();

        if zones.is_empty() {
            return Err(AssemblyError::NoAvailabilityZones {
                region: self.region.to_string(),
            }
            .into());
        }

        if zones.len() < self.config.max_azs.min(candidates.len()) {
            warn!(
                "Only {} of {} requested availability zones are available in {}",
                zones.len(),
                self.config.max_azs,
                self.region
            );
        }

        Ok(zones)
    }

    /// Declares the network into `stack`.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIDR is invalid, the address space is too
    /// small, no zone is available, or a declaration is rejected.
    pub fn build(&self, stack: &mut StackDeclaration) -> Result<NetworkHandle> {
        let zones = self.select_zones()?;
        let (public_blocks, private_blocks) = self.carve(zones.len())?;

        let vpc = stack.declare(
            "Vpc",
            ResourceProperties::Vpc(VpcProperties {
                cidr_block: self.config.cidr.clone(),
                enable_dns_hostnames: true,
                enable_dns_support: true,
            }),
        )?;

        let igw = stack.declare(
            "VpcInternetGateway",
            ResourceProperties::InternetGateway(InternetGatewayProperties {
                vpc: Reference::id(&vpc),
            }),
        )?;

        let mut public_subnets = Vec::with_capacity(zones.len());
        for (i, (zone, block)) in zones.iter().zip(&public_blocks).enumerate() {
            let n = i + 1;
            let subnet = stack.declare(
                format!("VpcPublicSubnet{n}"),
                ResourceProperties::Subnet(SubnetProperties {
                    vpc: Reference::id(&vpc),
                    availability_zone: zone.clone(),
                    cidr_block: block.to_string(),
                    tier: SubnetTier::Public,
                    map_public_ip_on_launch: true,
                }),
            )?;
            stack.declare(
                format!("VpcPublicSubnet{n}RouteTable"),
                ResourceProperties::RouteTable(RouteTableProperties {
                    vpc: Reference::id(&vpc),
                    subnet: Reference::id(&subnet),
                    default_route: Reference::id(&igw),
                }),
            )?;
            public_subnets.push(subnet);
        }

        let nat_count = self.config.nat_gateways.min(zones.len());
        let mut nat_gateways = Vec::with_capacity(nat_count);
        for (i, public_subnet) in public_subnets.iter().take(nat_count).enumerate() {
            let n = i + 1;
            let eip = stack.declare(
                format!("VpcNatEip{n}"),
                ResourceProperties::ElasticIp(ElasticIpProperties {
                    domain: String::from("vpc"),
                }),
            )?;
            let nat = stack.declare(
                format!("VpcNatGateway{n}"),
                ResourceProperties::NatGateway(NatGatewayProperties {
                    subnet: Reference::id(public_subnet),
                    allocation: Reference::attr(&eip, Attribute::AllocationId),
                }),
            )?;
            nat_gateways.push(nat);
        }

        if nat_gateways.is_empty() {
            warn!("No NAT gateway configured; private subnets have no egress");
        }

        let mut handle_zones = Vec::with_capacity(zones.len());
        for (i, ((zone, block), public_subnet)) in zones
            .iter()
            .zip(&private_blocks)
            .zip(public_subnets)
            .enumerate()
        {
            let n = i + 1;
            let subnet = stack.declare(
                format!("VpcPrivateSubnet{n}"),
                ResourceProperties::Subnet(SubnetProperties {
                    vpc: Reference::id(&vpc),
                    availability_zone: zone.clone(),
                    cidr_block: block.to_string(),
                    tier: SubnetTier::PrivateWithEgress,
                    map_public_ip_on_launch: false,
                }),
            )?;

            if let Some(nat) = nat_gateways.get(i % nat_gateways.len().max(1)) {
                stack.declare(
                    format!("VpcPrivateSubnet{n}RouteTable"),
                    ResourceProperties::RouteTable(RouteTableProperties {
                        vpc: Reference::id(&vpc),
                        subnet: Reference::id(&subnet),
                        default_route: Reference::id(nat),
                    }),
                )?;
            }

            handle_zones.push(ZoneSubnets {
                availability_zone: zone.clone(),
                public_subnet,
                private_subnet: subnet,
            });
        }

        info!(
            "Declared VPC {} across {} zones with {} NAT gateway(s)",
            self.config.cidr,
            handle_zones.len(),
            nat_gateways.len()
        );

        Ok(NetworkHandle {
            vpc,
            vpc_cidr: self.config.cidr.clone(),
            zones: handle_zones,
            nat_gateways,
        })
    }

    fn carve(&self, zone_count: usize) -> Result<(Vec<Ipv4Block>, Vec<Ipv4Block>)> {
        let vpc = Ipv4Block::parse(&self.config.cidr).ok_or_else(|| ConfigError::InvalidCidr {
            cidr: self.config.cidr.clone(),
            reason: String::from("expected a.b.c.d/n"),
        })?;
        let mask = self.config.subnet_mask;
        let needed = zone_count * 2;

        let exhausted = || AssemblyError::SubnetSpaceExhausted {
            cidr: self.config.cidr.clone(),
            mask,
            needed,
        };

        let blocks = (0..needed as u64)
            .map(|index| vpc.subdivide(mask, index))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(exhausted)?;

        let (public, private) = blocks.split_at(zone_count);
        if public.iter().any(|p| private.iter().any(|q| p.overlaps(q))) {
            return Err(AssemblyError::placement("Vpc", "public and private subnets overlap").into());
        }

        Ok((public.to_vec(), private.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;

    fn stack() -> StackDeclaration {
        StackDeclaration::new("playground-dev", "123456789012", "eu-west-1", Variant::HttpOnly)
    }

    fn cidr_of(stack: &StackDeclaration, id: &LogicalId) -> String {
        match &stack.get(id.as_str()).unwrap().resource {
            ResourceProperties::Subnet(s) => s.cidr_block.clone(),
            other => panic!("expected subnet, got {}", other.resource_type()),
        }
    }

    #[test]
    fn test_default_network_spans_three_zones() {
        let config = NetworkConfig::default();
        let mut stack = stack();
        let network = NetworkBuilder::new(&config, "eu-west-1")
            .build(&mut stack)
            .unwrap();

        assert_eq!(
            network.availability_zones(),
            vec!["eu-west-1a", "eu-west-1b", "eu-west-1c"]
        );
        assert_eq!(network.nat_gateways.len(), 1);
        assert_eq!(cidr_of(&stack, &network.zones[0].public_subnet), "10.0.0.0/24");
        assert_eq!(cidr_of(&stack, &network.zones[2].public_subnet), "10.0.2.0/24");
        assert_eq!(cidr_of(&stack, &network.zones[0].private_subnet), "10.0.3.0/24");
        assert_eq!(cidr_of(&stack, &network.zones[2].private_subnet), "10.0.5.0/24");
    }

    #[test]
    fn test_single_nat_serves_all_private_subnets() {
        let config = NetworkConfig::default();
        let mut stack = stack();
        NetworkBuilder::new(&config, "eu-west-1")
            .build(&mut stack)
            .unwrap();

        for n in 1..=3 {
            let table = stack.get(&format!("VpcPrivateSubnet{n}RouteTable")).unwrap();
            match &table.resource {
                ResourceProperties::RouteTable(rt) => {
                    assert_eq!(rt.default_route.target.as_str(), "VpcNatGateway1");
                }
                _ => panic!("expected route table"),
            }
        }
    }

    #[test]
    fn test_nat_round_robin() {
        let config = NetworkConfig {
            nat_gateways: 2,
            ..NetworkConfig::default()
        };
        let mut stack = stack();
        NetworkBuilder::new(&config, "eu-west-1")
            .build(&mut stack)
            .unwrap();

        let route = |n: usize| match &stack
            .get(&format!("VpcPrivateSubnet{n}RouteTable"))
            .unwrap()
            .resource
        {
            ResourceProperties::RouteTable(rt) => rt.default_route.target.to_string(),
            _ => unreachable!(),
        };
        assert_eq!(route(1), "VpcNatGateway1");
        assert_eq!(route(2), "VpcNatGateway2");
        assert_eq!(route(3), "VpcNatGateway1");
    }

    #[test]
    fn test_available_zones_limit_selection() {
        let config = NetworkConfig::default();
        let available = vec![String::from("eu-west-1a"), String::from("eu-west-1b")];
        let zones = NetworkBuilder::new(&config, "eu-west-1")
            .with_available_zones(Some(available.as_slice()))
            .select_zones()
            .unwrap();

        assert_eq!(zones, available);
    }

    #[test]
    fn test_no_available_zone_is_an_error() {
        let config = NetworkConfig::default();
        let available = vec![String::from("us-east-1a")];
        let err = NetworkBuilder::new(&config, "eu-west-1")
            .with_available_zones(Some(available.as_slice()))
            .select_zones()
            .unwrap_err();

        assert!(err.to_string().contains("No availability zones"));
    }

    #[test]
    fn test_small_cidr_is_exhausted() {
        let config = NetworkConfig {
            cidr: String::from("10.0.0.0/23"),
            ..NetworkConfig::default()
        };
        let mut stack = stack();
        let err = NetworkBuilder::new(&config, "eu-west-1")
            .build(&mut stack)
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::EdgestackError::Assembly(AssemblyError::SubnetSpaceExhausted { needed: 6, .. })
        ));
    }
}
