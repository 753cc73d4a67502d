//! Cached lookup context.
//!
//! Answers to environment questions the assembler cannot compute itself:
//! which availability zones a region actually offers, and which hosted zone
//! serves a domain. The file is written by hand or by `edgestack context`,
//! and read on every pass so assembly stays deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{ArtifactError, ConfigError, Result};
use crate::topology::ResolvedZone;

/// Default context file name.
pub const DEFAULT_CONTEXT_FILE: &str = "edgestack.context.json";

/// Result of looking up a hosted zone in the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneLookup {
    /// The zone exists.
    Resolved(ResolvedZone),
    /// The zone is known not to exist.
    Absent,
    /// The context has no entry for the domain.
    Unknown,
}

/// The lookup context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupContext {
    /// Available zones per region.
    #[serde(default)]
    pub availability_zones: BTreeMap<String, Vec<String>>,
    /// Hosted zones per domain; `null` records a zone known to be absent.
    #[serde(default)]
    pub hosted_zones: BTreeMap<String, Option<ResolvedZone>>,
}

impl LookupContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the context from a file. A missing file is an empty context.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No lookup context at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let context = Self::parse(&content).map_err(|e| match e {
            crate::error::EdgestackError::Config(ConfigError::ParseError { message, .. }) => {
                ConfigError::ParseError {
                    message,
                    location: Some(path.display().to_string()),
                }
                .into()
            }
            other => other,
        })?;
        debug!(
            "Loaded lookup context: {} region(s), {} hosted zone(s)",
            context.availability_zones.len(),
            context.hosted_zones.len()
        );
        Ok(context)
    }

    /// Parses a context from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            ConfigError::ParseError {
                message: e.to_string(),
                location: None,
            }
            .into()
        })
    }

    /// Saves the context to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be serialized or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ArtifactError::serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Returns the zones known for a region, if any.
    #[must_use]
    pub fn available_zones(&self, region: &str) -> Option<&[String]> {
        self.availability_zones.get(region).map(Vec::as_slice)
    }

    /// Looks up the hosted zone of a domain.
    #[must_use]
    pub fn hosted_zone(&self, domain_name: &str) -> ZoneLookup {
        match self.hosted_zones.get(domain_name) {
            Some(Some(zone)) => ZoneLookup::Resolved(zone.clone()),
            Some(None) => ZoneLookup::Absent,
            None => ZoneLookup::Unknown,
        }
    }

    /// Records the zones available in a region.
    pub fn record_zones(&mut self, region: impl Into<String>, zones: Vec<String>) {
        self.availability_zones.insert(region.into(), zones);
    }

    /// Records a hosted zone, or its absence when `zone` is `None`.
    pub fn record_hosted_zone(&mut self, domain_name: impl Into<String>, zone: Option<ResolvedZone>) {
        self.hosted_zones.insert(domain_name.into(), zone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let context = LookupContext::load(dir.path().join(DEFAULT_CONTEXT_FILE)).unwrap();
        assert_eq!(context, LookupContext::new());
        assert_eq!(context.hosted_zone("example.com"), ZoneLookup::Unknown);
    }

    #[test]
    fn test_null_zone_is_absent() {
        let context = LookupContext::parse(
            r#"{"hosted_zones": {"missing.example.com": null, "example.com": {"zone_id": "Z123", "name": "example.com"}}}"#,
        )
        .unwrap();

        assert_eq!(context.hosted_zone("missing.example.com"), ZoneLookup::Absent);
        assert!(matches!(
            context.hosted_zone("example.com"),
            ZoneLookup::Resolved(ref zone) if zone.zone_id == "Z123"
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONTEXT_FILE);

        let mut context = LookupContext::new();
        context.record_zones("eu-west-1", vec![String::from("eu-west-1a")]);
        context.record_hosted_zone("gone.example.com", None);
        context.save(&path).unwrap();

        let loaded = LookupContext::load(&path).unwrap();
        assert_eq!(loaded, context);
        assert_eq!(loaded.available_zones("eu-west-1").unwrap().len(), 1);
        assert!(loaded.available_zones("us-east-1").is_none());
    }

    #[test]
    fn test_invalid_file_reports_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONTEXT_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let err = LookupContext::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
