//! Planning module for deployment operations.
//!
//! This module compares the desired declaration tree with the last
//! published one and orders the resulting actions into dependency waves.

mod diff;
mod plan;

pub use diff::{DiffEngine, DiffResult, DiffType, ResourceDiff};
pub use plan::{ActionType, DeploymentPlan, PlannedAction};
