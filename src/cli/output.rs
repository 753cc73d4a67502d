//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::assembly::AssemblyManifest;
use crate::config::ValidationResult;
use crate::context::LookupContext;
use crate::planner::{ActionType, DeploymentPlan, DiffResult, DiffType};
use crate::topology::StackDeclaration;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Declaration row for table display.
#[derive(Tabled)]
struct DeclarationRow {
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "Wave")]
    wave: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Output row for table display.
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a declaration tree summary.
    #[must_use]
    pub fn format_stack(&self, stack: &StackDeclaration) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(stack).unwrap_or_default(),
            OutputFormat::Text => Self::format_stack_text(stack),
        }
    }

    fn format_stack_text(stack: &StackDeclaration) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\n🏗  Stack: {} ({})\n   Target: {}/{}\n\n",
            stack.stack_name.bold(),
            stack.variant,
            stack.account,
            stack.region
        );

        let rows: Vec<DeclarationRow> = stack
            .resources
            .iter()
            .map(|d| DeclarationRow {
                logical_id: d.logical_id.to_string(),
                resource_type: d.resource_type().to_string(),
                depends_on: Self::truncate(
                    &d.dependencies()
                        .iter()
                        .map(|id| id.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    50,
                ),
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        for lookup in &stack.lookups {
            let state = if lookup.is_deferred() {
                "deferred".yellow().to_string()
            } else {
                "resolved".green().to_string()
            };
            let _ = writeln!(
                output,
                "   lookup {} -> {} ({state})",
                lookup.logical_id, lookup.domain_name
            );
        }

        let _ = write!(
            output,
            "\n{} declarations, {} lookups, {} outputs\n",
            stack.resource_count(),
            stack.lookups.len(),
            stack.outputs.len()
        );

        output
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    fn format_plan_text(plan: &DeploymentPlan) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - published assembly is up to date.\n",
                "✓".green()
            );
        }

        let mut output = String::new();

        let _ = write!(output, "\n📋 Deployment Plan: {}\n", plan.stack_name);
        let _ = write!(
            output,
            "   Tree hash: {}\n\n",
            &plan.tree_hash[..8.min(plan.tree_hash.len())]
        );

        let mut rows = Vec::with_capacity(plan.actions.len());
        for (n, wave) in plan.waves.iter().enumerate() {
            for &i in wave {
                let action = &plan.actions[i];
                if action.action_type == ActionType::Noop {
                    continue;
                }
                rows.push(PlanActionRow {
                    wave: (n + 1).to_string(),
                    action: Self::format_action_type(action.action_type),
                    logical_id: action.logical_id.clone(),
                    resource_type: action.resource_type.clone(),
                    reason: Self::truncate(&action.reason, 40),
                });
            }
        }

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to replace, {} to delete ({} waves)\n",
            plan.count(ActionType::Create).to_string().green(),
            plan.count(ActionType::Replace).to_string().yellow(),
            plan.count(ActionType::Delete).to_string().red(),
            plan.waves.len()
        );

        output
    }

    /// Formats a diff result.
    #[must_use]
    pub fn format_diff(&self, diff: &DiffResult) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&DiffJson::from(diff)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::from("\nDetailed changes:\n");
                for d in diff.diffs.iter().filter(|d| d.diff_type != DiffType::NoChange) {
                    let short = |h: Option<&String>| {
                        h.map_or_else(|| String::from("-"), |h| h[..8.min(h.len())].to_string())
                    };
                    let _ = writeln!(
                        output,
                        "  {} {} ({}) {} -> {}",
                        Self::format_diff_type(d.diff_type),
                        d.logical_id,
                        d.resource_type,
                        short(d.old_hash.as_ref()),
                        short(d.new_hash.as_ref())
                    );
                }
                let _ = writeln!(output, "\n{diff}");
                output
            }
        }
    }

    /// Formats the stack outputs.
    #[must_use]
    pub fn format_outputs(&self, stack: &StackDeclaration) -> String {
        match self.format {
            OutputFormat::Json => {
                let outputs: serde_json::Map<String, serde_json::Value> = stack
                    .outputs
                    .iter()
                    .map(|o| (o.name.clone(), serde_json::Value::String(o.render())))
                    .collect();
                serde_json::to_string_pretty(&outputs).unwrap_or_default()
            }
            OutputFormat::Text => {
                if stack.outputs.is_empty() {
                    return String::from("   No outputs declared.\n");
                }
                let rows: Vec<OutputRow> = stack
                    .outputs
                    .iter()
                    .map(|o| OutputRow {
                        name: o.name.clone(),
                        value: o.render(),
                        description: o.description.clone(),
                    })
                    .collect();
                format!("\n{}\n", Table::new(rows))
            }
        }
    }

    /// Formats an assembly manifest.
    #[must_use]
    pub fn format_manifest(&self, manifest: &AssemblyManifest) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(manifest).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = write!(output, "\n📦 Assembly: {}\n\n", manifest.stack_name);
                let _ = writeln!(output, "   Id: {}", manifest.assembly_id);
                let _ = writeln!(output, "   Variant: {}", manifest.variant);
                let _ = writeln!(output, "   Declarations: {}", manifest.resource_count);
                let _ = writeln!(
                    output,
                    "   Tree hash: {}",
                    &manifest.tree_hash[..8.min(manifest.tree_hash.len())]
                );
                let _ = writeln!(
                    output,
                    "   Config hash: {}",
                    &manifest.config_hash[..8.min(manifest.config_hash.len())]
                );
                let _ = writeln!(
                    output,
                    "   Synthesized: {} by {}",
                    manifest.synthesized_at.format("%Y-%m-%d %H:%M"),
                    manifest.synthesized_by
                );
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a lookup context.
    #[must_use]
    pub fn format_context(&self, context: &LookupContext) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(context).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::from("\nAvailability zones:\n");
                if context.availability_zones.is_empty() {
                    output.push_str("   (none recorded)\n");
                }
                for (region, zones) in &context.availability_zones {
                    let _ = writeln!(output, "   {region}: {}", zones.join(", "));
                }

                output.push_str("\nHosted zones:\n");
                if context.hosted_zones.is_empty() {
                    output.push_str("   (none recorded)\n");
                }
                for (domain, zone) in &context.hosted_zones {
                    match zone {
                        Some(z) => {
                            let _ = writeln!(output, "   {domain}: {} ({})", z.zone_id, z.name);
                        }
                        None => {
                            let _ = writeln!(output, "   {domain}: {}", "absent".red());
                        }
                    }
                }
                output
            }
        }
    }

    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Lookup => "?lookup".cyan().to_string(),
            ActionType::Create => "+create".green().to_string(),
            ActionType::Replace => "~replace".yellow().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
            ActionType::Noop => "noop".dimmed().to_string(),
        }
    }

    fn format_diff_type(diff_type: DiffType) -> String {
        match diff_type {
            DiffType::Create => "+".green().to_string(),
            DiffType::Replace => "~".yellow().to_string(),
            DiffType::Delete => "-".red().to_string(),
            DiffType::NoChange => " ".to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "success", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✓".green()),
        }
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "warning", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "⚠".yellow()),
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    stack_name: String,
    tree_hash: String,
    action_count: usize,
    creates: usize,
    replaces: usize,
    deletes: usize,
    waves: Vec<Vec<ActionJson>>,
}

#[derive(serde::Serialize)]
struct ActionJson {
    action_type: String,
    logical_id: String,
    resource_type: String,
    reason: String,
}

impl From<&DeploymentPlan> for PlanJson {
    fn from(plan: &DeploymentPlan) -> Self {
        Self {
            stack_name: plan.stack_name.clone(),
            tree_hash: plan.tree_hash.clone(),
            action_count: plan.action_count(),
            creates: plan.count(ActionType::Create),
            replaces: plan.count(ActionType::Replace),
            deletes: plan.count(ActionType::Delete),
            waves: plan
                .waves
                .iter()
                .map(|wave| {
                    wave.iter()
                        .map(|&i| {
                            let a = &plan.actions[i];
                            ActionJson {
                                action_type: a.action_type.to_string(),
                                logical_id: a.logical_id.clone(),
                                resource_type: a.resource_type.clone(),
                                reason: a.reason.clone(),
                            }
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct DiffJson {
    creates: usize,
    replaces: usize,
    deletes: usize,
    unchanged: usize,
    changes: Vec<DiffEntryJson>,
}

#[derive(serde::Serialize)]
struct DiffEntryJson {
    logical_id: String,
    resource_type: String,
    change: String,
}

impl From<&DiffResult> for DiffJson {
    fn from(diff: &DiffResult) -> Self {
        Self {
            creates: diff.creates,
            replaces: diff.replaces,
            deletes: diff.deletes,
            unchanged: diff.unchanged,
            changes: diff
                .diffs
                .iter()
                .filter(|d| d.diff_type != DiffType::NoChange)
                .map(|d| DiffEntryJson {
                    logical_id: d.logical_id.clone(),
                    resource_type: d.resource_type.clone(),
                    change: d.diff_type.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::topology::TopologyAssembler;

    fn stack() -> StackDeclaration {
        let config = ConfigParser::new()
            .parse_yaml(
                "project:\n  name: playground\nidentity:\n  trust:\n    provider: codebuild\n",
                None,
            )
            .unwrap();
        TopologyAssembler::new(&config).assemble().unwrap().stack
    }

    #[test]
    fn test_outputs_json_renders_placeholders() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_outputs(&stack())).unwrap();

        assert_eq!(json["ServiceUrl"], "http://${LoadBalancer.dns_name}");
    }

    #[test]
    fn test_plan_json_groups_waves() {
        let stack = stack();
        let plan = DeploymentPlan::from_stack(&stack, "abcdef0123456789").unwrap();
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&formatter.format_plan(&plan)).unwrap();

        assert_eq!(json["creates"], stack.resource_count());
        assert_eq!(json["waves"][0][0]["logical_id"], "Vpc");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("a-much-longer-value", 10), "a-much-...");
    }
}
