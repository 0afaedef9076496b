//! Extension descriptor declaration and validation.
//!
//! # Responsibility
//! - Define the immutable identity/metadata record every extension publishes.
//! - Validate declaration-level invariants before registration.
//!
//! # Invariants
//! - A descriptor is built once by the extension author and never mutated by
//!   the host; the registry only reads it through `Extension::descriptor()`.
//! - `id` is globally unique across one host run.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Host API version a descriptor targets when the author does not say.
pub const DEFAULT_TARGET_API_VERSION: u32 = 1;

/// Declared third-party dependency of an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Package name as published by its ecosystem.
    pub package: String,
    /// Minimum version (`major.minor.patch`), when the author pins one.
    pub min_version: Option<String>,
    pub optional: bool,
}

impl Dependency {
    pub fn required(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            min_version: None,
            optional: false,
        }
    }

    pub fn optional(package: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(package)
        }
    }

    pub fn with_min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = Some(version.into());
        self
    }
}

/// Immutable identity/metadata record of one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Stable extension identifier, e.g. `builtin.export.csv`.
    pub id: String,
    pub name: String,
    /// Semantic version string (`major.minor.patch`).
    pub version: String,
    pub author: String,
    /// Short, one-line description.
    pub description: String,
    pub dependencies: Vec<Dependency>,
    pub homepage: String,
    /// Emoji or relative icon path.
    pub icon: String,
    /// Readme path relative to the extension's resource root.
    pub readme_path: Option<PathBuf>,
    /// Host API version this extension was written against.
    pub api_version: u32,
}

impl Descriptor {
    /// Creates a descriptor with required identity fields; the rest default.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            author: String::new(),
            description: String::new(),
            dependencies: Vec::new(),
            homepage: String::new(),
            icon: String::new(),
            readme_path: None,
            api_version: DEFAULT_TARGET_API_VERSION,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = homepage.into();
        self
    }

    pub fn with_readme(mut self, relative_path: impl Into<PathBuf>) -> Self {
        self.readme_path = Some(relative_path.into());
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Dependencies the extension cannot run without.
    pub fn required_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|dep| !dep.optional)
    }

    /// Validates declaration-level descriptor invariants.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.id.trim().is_empty() {
            return Err(DescriptorError::EmptyId);
        }
        if !is_valid_extension_id(self.id.as_str()) {
            return Err(DescriptorError::InvalidId(self.id.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if self.version.trim().is_empty() {
            return Err(DescriptorError::EmptyVersion);
        }
        if !is_semver_triplet(self.version.trim()) {
            return Err(DescriptorError::InvalidVersion(self.version.clone()));
        }
        for dependency in &self.dependencies {
            if dependency.package.trim().is_empty() {
                return Err(DescriptorError::EmptyDependency);
            }
            if let Some(min) = dependency.min_version.as_deref() {
                if !is_semver_triplet(min.trim()) {
                    return Err(DescriptorError::InvalidVersion(min.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl Display for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.author.is_empty() {
            write!(f, "{} v{}", self.name, self.version)
        } else {
            write!(f, "{} v{} by {}", self.name, self.version, self.author)
        }
    }
}

/// Returns whether `value` is a valid extension/unit identifier.
///
/// Lowercase ASCII letters and digits, separated by single `.`, `_` or `-`.
pub(crate) fn is_valid_extension_id(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }

    let mut prev_separator = false;
    for c in chars {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prev_separator = false;
            continue;
        }
        if c == '.' || c == '_' || c == '-' {
            if prev_separator {
                return false;
            }
            prev_separator = true;
            continue;
        }
        return false;
    }
    !prev_separator
}

fn is_semver_triplet(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() != 3 {
        return false;
    }
    parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    EmptyId,
    InvalidId(String),
    EmptyName,
    EmptyVersion,
    InvalidVersion(String),
    EmptyDependency,
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "descriptor id must not be empty"),
            Self::InvalidId(value) => write!(f, "descriptor id is invalid: {value}"),
            Self::EmptyName => write!(f, "descriptor name must not be empty"),
            Self::EmptyVersion => write!(f, "descriptor version must not be empty"),
            Self::InvalidVersion(value) => write!(
                f,
                "descriptor version is invalid: {value} (expected major.minor.patch)"
            ),
            Self::EmptyDependency => write!(f, "descriptor dependency package must not be empty"),
        }
    }
}

impl Error for DescriptorError {}

#[cfg(test)]
mod tests {
    use super::{is_valid_extension_id, Dependency, Descriptor, DescriptorError};

    fn valid_descriptor() -> Descriptor {
        Descriptor::new("builtin.export.csv", "CSV Export", "1.1.0")
            .with_author("cuekit")
            .with_description("Export cues as CSV")
    }

    #[test]
    fn validates_baseline_descriptor() {
        assert!(valid_descriptor().validate().is_ok());
    }

    #[test]
    fn rejects_invalid_id_format() {
        let mut descriptor = valid_descriptor();
        descriptor.id = "Builtin CSV".to_string();
        let err = descriptor.validate().unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidId(_)));
    }

    #[test]
    fn rejects_invalid_version_format() {
        let mut descriptor = valid_descriptor();
        descriptor.version = "v1".to_string();
        let err = descriptor.validate().unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidVersion(_)));
    }

    #[test]
    fn rejects_dependency_with_bad_min_version() {
        let descriptor = valid_descriptor()
            .with_dependency(Dependency::required("python-docx").with_min_version("1.x"));
        let err = descriptor.validate().unwrap_err();
        assert_eq!(err, DescriptorError::InvalidVersion("1.x".to_string()));
    }

    #[test]
    fn separates_required_from_optional_dependencies() {
        let descriptor = valid_descriptor()
            .with_dependency(Dependency::required("a"))
            .with_dependency(Dependency::optional("b"));
        let required: Vec<&str> = descriptor
            .required_dependencies()
            .map(|dep| dep.package.as_str())
            .collect();
        assert_eq!(required, vec!["a"]);
    }

    #[test]
    fn id_rules_reject_trailing_and_double_separators() {
        assert!(is_valid_extension_id("csv_x"));
        assert!(!is_valid_extension_id("csv_"));
        assert!(!is_valid_extension_id("csv..x"));
        assert!(!is_valid_extension_id(""));
    }

    #[test]
    fn display_includes_author_when_present() {
        assert_eq!(valid_descriptor().to_string(), "CSV Export v1.1.0 by cuekit");
    }
}
