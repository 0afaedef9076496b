//! Unit manifest declaration and validation.
//!
//! A unit is what discovery finds on disk: a standalone `<name>.json` file or
//! a package directory with `extension.json`. The manifest names the compiled
//! unit and the exports it publishes; the catalog maps those names to
//! constructors.

use crate::extension::capability::{parse_capability, Capability, CapabilityParseError};
use crate::extension::descriptor::is_valid_extension_id;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Export name preferred when a unit publishes several.
pub const WELL_KNOWN_EXPORT: &str = "Extension";
/// Manifest file name inside a package directory.
pub const PACKAGE_MANIFEST_FILE: &str = "extension.json";

static EXPORT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("export name regex must compile")
});

/// Declarative unit manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitManifest {
    /// Catalog unit name; defaults to the file stem or directory name.
    #[serde(default)]
    pub unit: Option<String>,
    /// Export names the unit publishes.
    #[serde(default)]
    pub exports: Vec<String>,
    /// Extra capabilities granted on top of the role-derived grant.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl UnitManifest {
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let manifest: Self =
            serde_json::from_str(raw).map_err(|err| ManifestError::Json(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ManifestError::Io(err.to_string()))?;
        Self::parse(&raw)
    }

    /// Validates declaration-level manifest invariants.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if let Some(unit) = self.unit.as_deref() {
            if unit.trim().is_empty() {
                return Err(ManifestError::EmptyUnit);
            }
            if !is_valid_extension_id(unit.trim()) {
                return Err(ManifestError::InvalidUnit(unit.to_string()));
            }
        }

        if self.exports.is_empty() {
            return Err(ManifestError::MissingExports);
        }
        let mut dedup = BTreeSet::new();
        for export in &self.exports {
            let normalized = export.trim();
            if !EXPORT_NAME_RE.is_match(normalized) {
                return Err(ManifestError::InvalidExport(export.clone()));
            }
            if !dedup.insert(normalized) {
                return Err(ManifestError::DuplicateExport(normalized.to_string()));
            }
        }

        self.requested_capabilities()?;
        Ok(())
    }

    /// Unit name, falling back to `default_name`.
    pub fn unit_name(&self, default_name: &str) -> String {
        self.unit
            .as_deref()
            .map(str::trim)
            .unwrap_or(default_name)
            .to_string()
    }

    pub fn requested_capabilities(&self) -> Result<Vec<Capability>, ManifestError> {
        self.capabilities
            .iter()
            .map(|raw| parse_capability(raw).map_err(ManifestError::Capability))
            .collect()
    }
}

/// Manifest parse and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    Io(String),
    Json(String),
    EmptyUnit,
    InvalidUnit(String),
    MissingExports,
    InvalidExport(String),
    DuplicateExport(String),
    Capability(CapabilityParseError),
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "manifest unreadable: {err}"),
            Self::Json(err) => write!(f, "manifest is not valid json: {err}"),
            Self::EmptyUnit => write!(f, "manifest unit must not be empty"),
            Self::InvalidUnit(value) => write!(f, "manifest unit is invalid: {value}"),
            Self::MissingExports => write!(f, "manifest exports must not be empty"),
            Self::InvalidExport(value) => write!(f, "manifest export name is invalid: {value}"),
            Self::DuplicateExport(value) => {
                write!(f, "manifest export is duplicated: {value}")
            }
            Self::Capability(err) => write!(f, "manifest capability rejected: {err}"),
        }
    }
}

impl Error for ManifestError {}
