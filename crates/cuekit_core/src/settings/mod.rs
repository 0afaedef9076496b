//! Settings collaborator: persisted enabled ids and per-extension blobs.
//!
//! # Responsibility
//! - Define the store contract the host reads at discovery start and writes
//!   on explicit save and at teardown.
//! - Provide an in-memory store and a SQLite-backed store.
//!
//! # Invariants
//! - Blobs are opaque `serde_json::Value`s; the store never interprets them.
//! - `save_*` replaces the previous persisted state entirely.

use crate::db::DbError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

pub use sqlite::SqliteSettingsStore;

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Persistence contract for extension enablement and settings.
pub trait SettingsStore {
    fn load_enabled(&self) -> SettingsResult<BTreeSet<String>>;

    fn load_settings(&self) -> SettingsResult<BTreeMap<String, Value>>;

    fn save_enabled(&mut self, enabled: &BTreeSet<String>) -> SettingsResult<()>;

    fn save_settings(&mut self, settings: &BTreeMap<String, Value>) -> SettingsResult<()>;
}

/// Store that keeps everything in process memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySettingsStore {
    enabled: BTreeSet<String>,
    settings: BTreeMap<String, Value>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the persisted enabled set.
    pub fn with_enabled<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Seeds one persisted settings blob.
    pub fn with_settings(mut self, extension_id: &str, settings: Value) -> Self {
        self.settings.insert(extension_id.to_string(), settings);
        self
    }

    pub fn enabled(&self) -> &BTreeSet<String> {
        &self.enabled
    }

    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_enabled(&self) -> SettingsResult<BTreeSet<String>> {
        Ok(self.enabled.clone())
    }

    fn load_settings(&self) -> SettingsResult<BTreeMap<String, Value>> {
        Ok(self.settings.clone())
    }

    fn save_enabled(&mut self, enabled: &BTreeSet<String>) -> SettingsResult<()> {
        self.enabled = enabled.clone();
        Ok(())
    }

    fn save_settings(&mut self, settings: &BTreeMap<String, Value>) -> SettingsResult<()> {
        self.settings = settings.clone();
        Ok(())
    }
}

/// Settings persistence errors.
#[derive(Debug)]
pub enum SettingsError {
    Db(DbError),
    InvalidJson {
        extension_id: String,
        message: String,
    },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidJson {
                extension_id,
                message,
            } => write!(f, "stored settings for `{extension_id}` are invalid: {message}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidJson { .. } => None,
        }
    }
}

impl From<DbError> for SettingsError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SettingsError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
