// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Edgestack
//!
//! A declarative topology assembler for a load-balanced container service
//! on AWS.
//!
//! ## Overview
//!
//! Edgestack turns a small YAML file into a declaration tree: a virtual
//! network with public and private subnets, an image registry, a CI
//! deployment role, a cluster running one service, a load balancer in
//! front of it and, when TLS is configured, a DNS alias. The tree is
//! handed to a provisioning engine; nothing here talks to the cloud
//! control plane except the optional S3 artifact store.
//!
//! ## Architecture
//!
//! 1. **Configuration**: `edgestack.yaml`, validated before anything is built
//! 2. **Assembly**: builders declare resources in a fixed order, each
//!    reference checked against what was already declared
//! 3. **Planning**: the tree is diffed against the last published one and
//!    ordered into dependency waves
//! 4. **Publishing**: template and manifest are written to a local
//!    directory or an S3 bucket
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`context`]: Cached lookups (availability zones, hosted zones)
//! - [`topology`]: Resource model and topology builders
//! - [`planner`]: Diff computation and wave planning
//! - [`assembly`]: Cloud assemblies and artifact stores (local, S3)
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: playground
//!   account: "123456789012"
//!   region: eu-west-1
//!
//! identity:
//!   trust:
//!     provider: codebuild
//!
//! tls:
//!   domain_name: app.example.com
//!   certificate_arn: arn:aws:acm:eu-west-1:123456789012:certificate/abc
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod assembly;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod planner;
pub mod topology;

// ============================================================================
// Re-exports
// ============================================================================

pub use assembly::{ArtifactStore, CloudAssembly, LocalArtifactStore, S3ArtifactStore};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, TopologyConfig};
pub use context::LookupContext;
pub use error::{EdgestackError, Result};
pub use planner::{DeploymentPlan, DiffEngine};
pub use topology::{StackDeclaration, TopologyAssembler};
