//! Declarative topology: resource declarations and the builders that
//! produce them.
//!
//! Builders run in dependency order and hand typed handles to the builders
//! that come after them:
//! - [`network`]: VPC, subnets, gateways and routing
//! - [`registry`]: image repository and pull policy
//! - [`identity`]: CI deployment role
//! - [`workload`]: cluster, task definition and service
//! - [`edge`]: load balancer, listener and target group
//! - [`dns`]: hosted-zone lookup and alias record (HTTPS variant only)

pub mod cidr;
pub mod dns;
pub mod edge;
pub mod identity;
pub mod network;
pub mod registry;
pub mod resource;
pub mod workload;

mod assembler;
mod stack;

pub use assembler::{AssembledTopology, TopologyAssembler};
pub use resource::{Attribute, Declaration, LogicalId, Reference, ResourceProperties};
pub use stack::{HostedZoneLookup, OutputPart, ResolvedZone, StackDeclaration, StackOutput};
