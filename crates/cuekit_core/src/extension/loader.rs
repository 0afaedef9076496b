//! Discovery and loading of extension units.
//!
//! # Responsibility
//! - Enumerate candidates in each configured location: standalone
//!   `<name>.json` manifests first, then package directories holding
//!   `extension.json`, each group sorted by path.
//! - Turn one candidate into a constructed instance: read the manifest,
//!   resolve the entry point in the catalog, construct in isolation, apply
//!   the API version gate.
//!
//! # Invariants
//! - A failing candidate yields a `LoadError` and never aborts the scan.
//! - Names starting with `_` or `.` are never candidates.
//!
//! # See also
//! - `extension::host::ExtensionHost::load_all` for registration and counts.

use crate::extension::capability::Capability;
use crate::extension::catalog::{EntryPoint, ExtensionCatalog};
use crate::extension::context::ApiVersionRange;
use crate::extension::events::panic_message;
use crate::extension::manifest::{ManifestError, UnitManifest, PACKAGE_MANIFEST_FILE};
use crate::extension::registry::RegistryError;
use crate::extension::roles::Extension;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

/// Where a location comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Builtin,
    External,
    User,
}

impl LocationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::External => "external",
            Self::User => "user",
        }
    }
}

/// One configured directory scanned for extension units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionLocation {
    pub kind: LocationKind,
    pub path: PathBuf,
}

impl ExtensionLocation {
    pub fn new(kind: LocationKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateShape {
    Standalone,
    Package,
}

/// One unit found on disk, not yet loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub manifest_path: PathBuf,
    /// Originating directory; becomes the extension's resource root.
    pub resource_root: PathBuf,
    /// Unit name used when the manifest does not declare one.
    pub default_unit: String,
    pub shape: CandidateShape,
    pub location: LocationKind,
}

/// A constructed instance ready for registration.
pub struct LoadedUnit {
    pub extension: Box<dyn Extension>,
    pub resource_root: PathBuf,
    pub unit: String,
    pub export: String,
    pub extra_capabilities: Vec<Capability>,
}

/// Enumerates candidates across `locations`, in location order.
pub fn discover(locations: &[ExtensionLocation]) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for location in locations {
        let found = scan_location(location);
        log::debug!(
            "event=discovery_scan module=loader status=ok location={} kind={} candidates={}",
            location.path.display(),
            location.kind.as_str(),
            found.len()
        );
        candidates.extend(found);
    }
    candidates
}

fn scan_location(location: &ExtensionLocation) -> Vec<Candidate> {
    let entries = match std::fs::read_dir(&location.path) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!(
                "event=discovery_scan module=loader status=skipped location={} kind={} error={}",
                location.path.display(),
                location.kind.as_str(),
                err
            );
            return Vec::new();
        }
    };

    let mut standalone = Vec::new();
    let mut packages = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            let manifest_path = path.join(PACKAGE_MANIFEST_FILE);
            if manifest_path.is_file() {
                packages.push(Candidate {
                    manifest_path,
                    resource_root: path.clone(),
                    default_unit: name,
                    shape: CandidateShape::Package,
                    location: location.kind,
                });
            }
            continue;
        }
        if path.extension().is_some_and(|ext| ext == "json") {
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            standalone.push(Candidate {
                default_unit: stem.to_string(),
                manifest_path: path.clone(),
                resource_root: location.path.clone(),
                shape: CandidateShape::Standalone,
                location: location.kind,
            });
        }
    }
    standalone.sort_by(|a, b| a.manifest_path.cmp(&b.manifest_path));
    packages.sort_by(|a, b| a.manifest_path.cmp(&b.manifest_path));
    standalone.extend(packages);
    standalone
}

/// Loads candidates against a catalog and the host API range.
pub struct ExtensionLoader<'a> {
    catalog: &'a ExtensionCatalog,
    api: ApiVersionRange,
}

impl<'a> ExtensionLoader<'a> {
    pub fn new(catalog: &'a ExtensionCatalog, api: ApiVersionRange) -> Self {
        Self { catalog, api }
    }

    /// Brings one candidate into memory. Panics in the constructor are
    /// contained and reported as `ConstructionPanicked`.
    pub fn load(&self, candidate: &Candidate) -> Result<LoadedUnit, LoadError> {
        let raw = std::fs::read_to_string(&candidate.manifest_path)
            .map_err(|err| LoadError::Io(err.to_string()))?;
        let manifest = UnitManifest::parse(&raw).map_err(LoadError::Manifest)?;
        let extra_capabilities = manifest
            .requested_capabilities()
            .map_err(LoadError::Manifest)?;
        let unit = manifest.unit_name(&candidate.default_unit);

        let export = match self.catalog.resolve_entry_point(&unit, &manifest.exports) {
            EntryPoint::Resolved(export) => export,
            EntryPoint::NotFound => return Err(LoadError::NoEntryPoint { unit }),
            EntryPoint::Ambiguous(exports) => {
                return Err(LoadError::AmbiguousEntryPoint { unit, exports })
            }
        };
        let factory = self
            .catalog
            .factory(&unit, &export)
            .ok_or_else(|| LoadError::NoEntryPoint { unit: unit.clone() })?;

        let extension = catch_unwind(AssertUnwindSafe(factory)).map_err(|payload| {
            LoadError::ConstructionPanicked {
                unit: unit.clone(),
                message: panic_message(payload.as_ref()),
            }
        })?;

        self.check_api_version(extension.as_ref())?;
        Ok(LoadedUnit {
            extension,
            resource_root: candidate.resource_root.clone(),
            unit,
            export,
            extra_capabilities,
        })
    }

    /// Newer than the host: refused. Older than the minimum: loaded with a
    /// warning.
    fn check_api_version(&self, extension: &dyn Extension) -> Result<(), LoadError> {
        let descriptor = extension.descriptor();
        let required = descriptor.api_version;
        if required > self.api.current {
            return Err(LoadError::ApiIncompatible {
                id: descriptor.id.clone(),
                required,
                current: self.api.current,
            });
        }
        if required < self.api.minimum {
            log::warn!(
                "event=api_version_check module=loader status=degraded extension_id={} required={} minimum={}",
                descriptor.id,
                required,
                self.api.minimum
            );
        }
        Ok(())
    }
}

/// Failure to load or register one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Io(String),
    Manifest(ManifestError),
    NoEntryPoint {
        unit: String,
    },
    AmbiguousEntryPoint {
        unit: String,
        exports: Vec<String>,
    },
    ConstructionPanicked {
        unit: String,
        message: String,
    },
    ApiIncompatible {
        id: String,
        required: u32,
        current: u32,
    },
    Registration(RegistryError),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "candidate unreadable: {err}"),
            Self::Manifest(err) => write!(f, "{err}"),
            Self::NoEntryPoint { unit } => write!(f, "unit `{unit}` has no resolvable export"),
            Self::AmbiguousEntryPoint { unit, exports } => write!(
                f,
                "unit `{unit}` has several resolvable exports: {}",
                exports.join(", ")
            ),
            Self::ConstructionPanicked { unit, message } => {
                write!(f, "unit `{unit}` panicked during construction: {message}")
            }
            Self::ApiIncompatible {
                id,
                required,
                current,
            } => write!(
                f,
                "extension `{id}` targets api {required}, host provides {current}"
            ),
            Self::Registration(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Manifest(err) => Some(err),
            Self::Registration(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ManifestError> for LoadError {
    fn from(value: ManifestError) -> Self {
        Self::Manifest(value)
    }
}

impl From<RegistryError> for LoadError {
    fn from(value: RegistryError) -> Self {
        Self::Registration(value)
    }
}
