//! Deployment plan types and construction.
//!
//! A plan orders the declarations of a tree into waves. Every declaration
//! in a wave only references declarations (or lookups) of earlier waves, so
//! the provisioning engine may work through each wave concurrently.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

use crate::error::{AssemblyError, Result};
use crate::topology::StackDeclaration;

use super::diff::{DiffResult, DiffType};

/// A complete deployment plan.
#[derive(Debug)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Stack the plan applies to.
    pub stack_name: String,
    /// Tree hash this plan is based on.
    pub tree_hash: String,
    /// Planned actions, in declaration order (lookups first).
    pub actions: Vec<PlannedAction>,
    /// Action indices grouped into waves.
    pub waves: Vec<Vec<usize>>,
}

/// A single planned action.
#[derive(Debug, Clone)]
pub struct PlannedAction {
    /// Action type.
    pub action_type: ActionType,
    /// Logical id.
    pub logical_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Reason for this action.
    pub reason: String,
    /// Dependencies (action indices that must complete first).
    pub dependencies: Vec<usize>,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Look up an existing resource.
    Lookup,
    /// Create a new resource.
    Create,
    /// Replace a changed resource.
    Replace,
    /// Delete a resource that is no longer declared.
    Delete,
    /// No operation (for tracking).
    Noop,
}

impl DeploymentPlan {
    /// Creates a plan that creates every declaration of `stack`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference edges form a cycle or point at an
    /// unknown logical id.
    pub fn from_stack(stack: &StackDeclaration, tree_hash: &str) -> Result<Self> {
        Self::build(stack, None, tree_hash)
    }

    /// Creates a plan from a diff against the published tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference edges form a cycle or point at an
    /// unknown logical id.
    pub fn from_diff(stack: &StackDeclaration, diff: &DiffResult, tree_hash: &str) -> Result<Self> {
        Self::build(stack, Some(diff), tree_hash)
    }

    fn build(stack: &StackDeclaration, diff: Option<&DiffResult>, tree_hash: &str) -> Result<Self> {
        let mut actions = Vec::with_capacity(stack.lookups.len() + stack.resources.len());
        let mut index: HashMap<&str, usize> = HashMap::new();

        for lookup in &stack.lookups {
            index.insert(lookup.logical_id.as_str(), actions.len());
            let reason = if lookup.is_deferred() {
                format!("Hosted zone for {} (deferred)", lookup.domain_name)
            } else {
                format!("Hosted zone for {} (cached)", lookup.domain_name)
            };
            actions.push(PlannedAction {
                action_type: ActionType::Lookup,
                logical_id: lookup.logical_id.to_string(),
                resource_type: String::from("AWS::Route53::HostedZone"),
                reason,
                dependencies: vec![],
            });
        }

        for decl in &stack.resources {
            index.insert(decl.logical_id.as_str(), actions.len());
            let (action_type, reason) = match diff.and_then(|d| d.get(decl.logical_id.as_str())) {
                Some(d) if d.diff_type == DiffType::NoChange => {
                    (ActionType::Noop, String::from("Unchanged since last publish"))
                }
                Some(d) if d.diff_type == DiffType::Replace => {
                    (ActionType::Replace, String::from("Declaration changed"))
                }
                _ => (ActionType::Create, String::from("Declared in topology")),
            };
            actions.push(PlannedAction {
                action_type,
                logical_id: decl.logical_id.to_string(),
                resource_type: decl.resource_type().to_string(),
                reason,
                dependencies: vec![],
            });
        }

        let offset = stack.lookups.len();
        for (i, decl) in stack.resources.iter().enumerate() {
            let mut deps = Vec::new();
            for dep in decl.dependencies() {
                let Some(&dep_idx) = index.get(dep.as_str()) else {
                    return Err(AssemblyError::UnresolvedReference {
                        from: decl.logical_id.to_string(),
                        target: dep.to_string(),
                    }
                    .into());
                };
                deps.push(dep_idx);
            }
            actions[offset + i].dependencies = deps;
        }

        let mut waves = Self::compute_waves(&actions)?;

        // Deletes run after everything else, in reverse publish order.
        if let Some(diff) = diff {
            let first_delete = actions.len();
            for d in diff.diffs.iter().filter(|d| d.diff_type == DiffType::Delete) {
                actions.push(PlannedAction {
                    action_type: ActionType::Delete,
                    logical_id: d.logical_id.clone(),
                    resource_type: d.resource_type.clone(),
                    reason: String::from("Removed from topology"),
                    dependencies: vec![],
                });
            }
            if actions.len() > first_delete {
                waves.push((first_delete..actions.len()).rev().collect());
            }
        }

        Ok(Self {
            created_at: Utc::now(),
            stack_name: stack.stack_name.clone(),
            tree_hash: tree_hash.to_string(),
            actions,
            waves,
        })
    }

    /// Groups actions into waves with Kahn's algorithm.
    fn compute_waves(actions: &[PlannedAction]) -> Result<Vec<Vec<usize>>> {
        let mut remaining: Vec<usize> = actions.iter().map(|a| a.dependencies.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); actions.len()];
        for (i, action) in actions.iter().enumerate() {
            for &dep in &action.dependencies {
                dependents[dep].push(i);
            }
        }

        let mut ready: VecDeque<usize> = (0..actions.len()).filter(|&i| remaining[i] == 0).collect();
        let mut waves = Vec::new();
        let mut placed = 0;

        while !ready.is_empty() {
            let mut wave: Vec<usize> = ready.drain(..).collect();
            wave.sort_unstable();
            for &i in &wave {
                for &next in &dependents[i] {
                    remaining[next] -= 1;
                    if remaining[next] == 0 {
                        ready.push_back(next);
                    }
                }
            }
            placed += wave.len();
            waves.push(wave);
        }

        if placed < actions.len() {
            let cycle: Vec<&str> = actions
                .iter()
                .enumerate()
                .filter(|(i, _)| remaining[*i] > 0)
                .map(|(_, a)| a.logical_id.as_str())
                .collect();
            return Err(AssemblyError::CircularDependency {
                cycle: cycle.join(" -> "),
            }
            .into());
        }

        Ok(waves)
    }

    /// Returns true if the plan has nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions
            .iter()
            .all(|a| matches!(a.action_type, ActionType::Noop | ActionType::Lookup))
    }

    /// Returns the number of actions.
    #[must_use]
    pub const fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of actions of a type.
    #[must_use]
    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }

    /// Returns the wave an action belongs to.
    #[must_use]
    pub fn wave_of(&self, logical_id: &str) -> Option<usize> {
        let idx = self.actions.iter().position(|a| a.logical_id == logical_id)?;
        self.waves.iter().position(|w| w.contains(&idx))
    }

    /// Returns actions that can be executed immediately (no dependencies).
    #[must_use]
    pub fn ready_actions(&self) -> Vec<&PlannedAction> {
        self.actions
            .iter()
            .filter(|a| a.dependencies.is_empty() && a.action_type != ActionType::Delete)
            .collect()
    }
}

impl PlannedAction {
    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action_type {
            ActionType::Lookup => format!("Look up {} '{}'", self.resource_type, self.logical_id),
            ActionType::Create => format!("Create {} '{}'", self.resource_type, self.logical_id),
            ActionType::Replace => format!("Replace {} '{}'", self.resource_type, self.logical_id),
            ActionType::Delete => format!("Delete {} '{}'", self.resource_type, self.logical_id),
            ActionType::Noop => format!("No change for '{}'", self.logical_id),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lookup => "lookup",
            Self::Create => "create",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Noop => "noop",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action_type, self.logical_id)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(
            f,
            "Deployment Plan for {} ({} actions, {} waves):",
            self.stack_name,
            self.actions.len(),
            self.waves.len()
        )?;
        for (n, wave) in self.waves.iter().enumerate() {
            writeln!(f, "  Wave {}:", n + 1)?;
            for &i in wave {
                writeln!(f, "    - {}", self.actions[i])?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigParser, Variant};
    use crate::planner::DiffEngine;
    use crate::topology::{ResourceProperties, TopologyAssembler};
    use crate::topology::resource::{InternetGatewayProperties, Reference, VpcProperties};

    fn tls_stack() -> StackDeclaration {
        let yaml = "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n\
                    tls:\n  domain_name: app.example.com\n  certificate_arn: arn:aws:acm:eu-west-1:123456789012:certificate/abc\n";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        TopologyAssembler::new(&config).assemble().unwrap().stack
    }

    #[test]
    fn test_waves_respect_references() {
        let stack = tls_stack();
        let plan = DeploymentPlan::from_stack(&stack, "hash").unwrap();

        assert_eq!(plan.action_count(), stack.resource_count() + 1);
        assert_eq!(plan.count(ActionType::Lookup), 1);
        for (wave_idx, wave) in plan.waves.iter().enumerate() {
            for &i in wave {
                for &dep in &plan.actions[i].dependencies {
                    assert!(plan.waves[..wave_idx].iter().any(|w| w.contains(&dep)));
                }
            }
        }
        assert_eq!(plan.wave_of("Vpc"), Some(0));
        assert!(plan.wave_of("Listener") > plan.wave_of("TargetGroup"));
        assert!(plan.wave_of("AliasRecord") > plan.wave_of("LoadBalancer"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut stack =
            StackDeclaration::new("s", "123456789012", "eu-west-1", Variant::HttpOnly);
        let vpc = stack
            .declare(
                "Vpc",
                ResourceProperties::Vpc(VpcProperties {
                    cidr_block: String::from("10.0.0.0/16"),
                    enable_dns_hostnames: true,
                    enable_dns_support: true,
                }),
            )
            .unwrap();
        let igw = stack
            .declare(
                "Gateway",
                ResourceProperties::InternetGateway(InternetGatewayProperties {
                    vpc: Reference::id(&vpc),
                }),
            )
            .unwrap();
        // Rewire the VPC as a gateway pointing at the second gateway.
        stack.resources[0].resource =
            ResourceProperties::InternetGateway(InternetGatewayProperties {
                vpc: Reference::id(&igw),
            });

        let err = DeploymentPlan::from_stack(&stack, "hash").unwrap_err();
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_unchanged_tree_plans_nothing() {
        let stack = tls_stack();
        let diff = DiffEngine::new().compute_diff(&stack, Some(&stack)).unwrap();
        let plan = DeploymentPlan::from_diff(&stack, &diff, "hash").unwrap();

        assert_eq!(plan.count(ActionType::Noop), stack.resource_count());
        assert_eq!(plan.count(ActionType::Create), 0);
        assert!(plan.is_empty());
    }
}
