//! The declaration tree produced by one assembly pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::Variant;
use crate::error::{AssemblyError, Result};

use super::resource::{Attribute, Declaration, LogicalId, Reference, ResourceProperties};

/// A hosted zone resolved from the lookup context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedZone {
    /// Hosted zone id.
    pub zone_id: String,
    /// Zone name.
    pub name: String,
}

/// A hosted-zone lookup. Lookups are never created, only found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZoneLookup {
    /// Logical id of the lookup.
    pub logical_id: LogicalId,
    /// Domain name to look up.
    pub domain_name: String,
    /// The zone, when the context already knows it. `None` defers the
    /// lookup to the provisioning engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedZone>,
}

impl HostedZoneLookup {
    /// Returns true if the lookup is left to the provisioning engine.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        self.resolved.is_none()
    }
}

/// One part of an output value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPart {
    /// Literal text.
    Literal(String),
    /// Attribute of a declaration.
    Reference(Reference),
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Output name.
    pub name: String,
    /// Output description.
    pub description: String,
    /// Value, as a concatenation of parts.
    pub value: Vec<OutputPart>,
}

impl StackOutput {
    /// Renders the value with `${LogicalId.attribute}` placeholders.
    #[must_use]
    pub fn render(&self) -> String {
        self.value
            .iter()
            .map(|part| match part {
                OutputPart::Literal(text) => text.clone(),
                OutputPart::Reference(r) => format!("${{{}.{}}}", r.target, r.attribute),
            })
            .collect()
    }
}

/// The full declaration tree of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDeclaration {
    /// Stack name.
    pub stack_name: String,
    /// Target account.
    pub account: String,
    /// Target region.
    pub region: String,
    /// Selected variant.
    pub variant: Variant,
    /// Declarations, in declaration order.
    pub resources: Vec<Declaration>,
    /// Hosted-zone lookups.
    #[serde(default)]
    pub lookups: Vec<HostedZoneLookup>,
    /// Stack outputs.
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
    #[serde(skip)]
    tags: BTreeMap<String, String>,
}

impl StackDeclaration {
    /// Creates an empty stack.
    #[must_use]
    pub fn new(
        stack_name: impl Into<String>,
        account: impl Into<String>,
        region: impl Into<String>,
        variant: Variant,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            account: account.into(),
            region: region.into(),
            variant,
            resources: Vec::new(),
            lookups: Vec::new(),
            outputs: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Sets the tags applied to every taggable declaration.
    #[must_use]
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Declares a resource.
    ///
    /// Every reference held by `resource` must point at a logical id that is
    /// already declared (or looked up), with an attribute that the target
    /// can provide.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken, a reference is unresolved, or a
    /// reference asks for an attribute its target does not provide.
    pub fn declare(
        &mut self,
        logical_id: impl Into<String>,
        resource: ResourceProperties,
    ) -> Result<LogicalId> {
        let logical_id = LogicalId::new(logical_id);

        if self.contains(&logical_id) {
            return Err(AssemblyError::DuplicateLogicalId {
                logical_id: logical_id.to_string(),
            }
            .into());
        }

        for reference in resource.references() {
            self.check_reference(logical_id.as_str(), reference)?;
        }

        let tags = if resource.is_taggable() {
            self.tags.clone()
        } else {
            BTreeMap::new()
        };

        debug!("Declared {} ({})", logical_id, resource.resource_type());
        self.resources.push(Declaration {
            logical_id: logical_id.clone(),
            resource,
            tags,
        });
        Ok(logical_id)
    }

    /// Declares a hosted-zone lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken.
    pub fn declare_lookup(
        &mut self,
        logical_id: impl Into<String>,
        domain_name: impl Into<String>,
        resolved: Option<ResolvedZone>,
    ) -> Result<LogicalId> {
        let logical_id = LogicalId::new(logical_id);
        if self.contains(&logical_id) {
            return Err(AssemblyError::DuplicateLogicalId {
                logical_id: logical_id.to_string(),
            }
            .into());
        }

        self.lookups.push(HostedZoneLookup {
            logical_id: logical_id.clone(),
            domain_name: domain_name.into(),
            resolved,
        });
        Ok(logical_id)
    }

    /// Adds a stack output.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced declaration is missing.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        value: Vec<OutputPart>,
    ) -> Result<()> {
        let name = name.into();
        for part in &value {
            if let OutputPart::Reference(reference) = part {
                self.check_reference(&name, reference)?;
            }
        }

        self.outputs.push(StackOutput {
            name,
            description: description.into(),
            value,
        });
        Ok(())
    }

    /// Returns the declaration with the given logical id.
    #[must_use]
    pub fn get(&self, logical_id: &str) -> Option<&Declaration> {
        self.resources
            .iter()
            .find(|d| d.logical_id.as_str() == logical_id)
    }

    /// Returns the lookup with the given logical id.
    #[must_use]
    pub fn lookup(&self, logical_id: &str) -> Option<&HostedZoneLookup> {
        self.lookups
            .iter()
            .find(|l| l.logical_id.as_str() == logical_id)
    }

    /// Returns true if a declaration or lookup uses the logical id.
    #[must_use]
    pub fn contains(&self, logical_id: &LogicalId) -> bool {
        self.get(logical_id.as_str()).is_some() || self.lookup(logical_id.as_str()).is_some()
    }

    /// Returns the number of declarations (lookups excluded).
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Returns all declarations of a resource type.
    pub fn of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Declaration> + 'a {
        self.resources
            .iter()
            .filter(move |d| d.resource_type() == resource_type)
    }

    fn check_reference(&self, from: &str, reference: &Reference) -> Result<()> {
        let target = reference.target.as_str();
        let provided = if self.lookup(target).is_some() {
            reference.attribute == Attribute::HostedZoneId
        } else if let Some(decl) = self.get(target) {
            decl.resource.provides(reference.attribute)
        } else {
            return Err(AssemblyError::UnresolvedReference {
                from: from.to_string(),
                target: target.to_string(),
            }
            .into());
        };

        if provided {
            Ok(())
        } else {
            Err(AssemblyError::UnsupportedAttribute {
                from: from.to_string(),
                target: target.to_string(),
                attribute: reference.attribute.to_string(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::resource::{InternetGatewayProperties, VpcProperties};

    fn vpc() -> ResourceProperties {
        ResourceProperties::Vpc(VpcProperties {
            cidr_block: String::from("10.0.0.0/16"),
            enable_dns_hostnames: true,
            enable_dns_support: true,
        })
    }

    fn stack() -> StackDeclaration {
        StackDeclaration::new("playground-dev", "123456789012", "eu-west-1", Variant::HttpOnly)
    }

    #[test]
    fn test_declare_applies_tags() {
        let mut tags = BTreeMap::new();
        tags.insert(String::from("project"), String::from("playground"));
        let mut stack = stack().with_tags(tags);

        stack.declare("Vpc", vpc()).unwrap();
        assert_eq!(stack.get("Vpc").unwrap().tags["project"], "playground");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut stack = stack();
        stack.declare("Vpc", vpc()).unwrap();
        let err = stack.declare("Vpc", vpc()).unwrap_err();
        assert!(err.to_string().contains("Duplicate logical id"));
    }

    #[test]
    fn test_unresolved_reference_rejected() {
        let mut stack = stack();
        let missing = LogicalId::new("Vpc");
        let err = stack
            .declare(
                "VpcInternetGateway",
                ResourceProperties::InternetGateway(InternetGatewayProperties {
                    vpc: Reference::id(&missing),
                }),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::EdgestackError::Assembly(AssemblyError::UnresolvedReference { ref target, .. })
                if target == "Vpc"
        ));
        assert_eq!(stack.resource_count(), 0);
    }

    #[test]
    fn test_lookup_only_provides_zone_id() {
        let mut stack = stack();
        let zone = stack.declare_lookup("HostedZone", "example.com", None).unwrap();
        assert!(stack.lookup("HostedZone").unwrap().is_deferred());

        let err = stack
            .declare(
                "VpcInternetGateway",
                ResourceProperties::InternetGateway(InternetGatewayProperties {
                    vpc: Reference::id(&zone),
                }),
            )
            .unwrap_err();
        assert!(err.to_string().contains("HostedZone"));
    }

    #[test]
    fn test_attribute_must_be_provided_by_target() {
        let mut stack = stack();
        let vpc = stack.declare("Vpc", vpc()).unwrap();

        let err = stack
            .declare(
                "VpcInternetGateway",
                ResourceProperties::InternetGateway(InternetGatewayProperties {
                    vpc: Reference::attr(&vpc, Attribute::HostedZoneId),
                }),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::EdgestackError::Assembly(AssemblyError::UnsupportedAttribute { ref attribute, .. })
                if attribute == "hosted_zone_id"
        ));

        let err = stack
            .add_output(
                "VpcDns",
                "test",
                vec![OutputPart::Reference(Reference::attr(&vpc, Attribute::DnsName))],
            )
            .unwrap_err();
        assert!(err.to_string().contains("Vpc.dns_name"));
        assert_eq!(stack.resource_count(), 1);
        assert!(stack.outputs.is_empty());
    }

    #[test]
    fn test_output_render() {
        let mut stack = stack();
        let id = stack.declare("Vpc", vpc()).unwrap();
        stack
            .add_output(
                "VpcUrl",
                "test",
                vec![
                    OutputPart::Literal(String::from("http://")),
                    OutputPart::Reference(Reference::id(&id)),
                ],
            )
            .unwrap();

        assert_eq!(stack.outputs[0].render(), "http://${Vpc.id}");
    }
}
