//! Host configuration.
//!
//! Every field is optional in the JSON form; missing fields take the
//! defaults below.

use crate::extension::context::{ApiVersionRange, ContextSeed, DEFAULT_JOURNAL_LIMIT};
use crate::extension::loader::{ExtensionLocation, LocationKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Directory name used under the platform data directory.
const USER_DIR_NAME: &str = "cuekit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub app_name: String,
    pub app_version: String,
    pub locations: Vec<ExtensionLocation>,
    pub api_version: u32,
    pub api_version_min: u32,
    pub journal_limit: usize,
    pub settings_db: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            app_name: crate::APP_NAME.to_string(),
            app_version: crate::APP_VERSION.to_string(),
            locations: Vec::new(),
            api_version: 1,
            api_version_min: 1,
            journal_limit: DEFAULT_JOURNAL_LIMIT,
            settings_db: None,
            log_level: None,
            log_dir: None,
        }
    }
}

impl HostConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Json(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version_min > self.api_version {
            return Err(ConfigError::InvertedApiRange {
                minimum: self.api_version_min,
                current: self.api_version,
            });
        }
        Ok(())
    }

    pub fn api_range(&self) -> ApiVersionRange {
        ApiVersionRange {
            minimum: self.api_version_min,
            current: self.api_version,
        }
    }

    pub fn context_seed(&self) -> ContextSeed {
        ContextSeed {
            app_name: self.app_name.clone(),
            app_version: self.app_version.clone(),
            api: self.api_range(),
            journal_limit: self.journal_limit,
        }
    }

    /// Built-in, external and user-writable locations for an install rooted
    /// at `app_dir`. The user location is skipped when the platform has no
    /// data directory.
    pub fn default_locations(app_dir: &Path) -> Vec<ExtensionLocation> {
        let mut locations = vec![
            ExtensionLocation::new(
                LocationKind::Builtin,
                app_dir.join("extensions").join("builtin"),
            ),
            ExtensionLocation::new(
                LocationKind::External,
                app_dir.join("extensions").join("external"),
            ),
        ];
        if let Some(data_dir) = dirs::data_dir() {
            locations.push(ExtensionLocation::new(
                LocationKind::User,
                data_dir.join(USER_DIR_NAME).join("extensions"),
            ));
        }
        locations
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Json(String),
    InvertedApiRange { minimum: u32, current: u32 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "cannot read config {}: {message}", path.display())
            }
            Self::Json(message) => write!(f, "invalid config json: {message}"),
            Self::InvertedApiRange { minimum, current } => write!(
                f,
                "api_version_min {minimum} is greater than api_version {current}"
            ),
        }
    }
}

impl Error for ConfigError {}
