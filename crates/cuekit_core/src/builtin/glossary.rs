//! Glossary extension (`builtin.ui.glossary`).
//!
//! # Responsibility
//! - Keep a user glossary (source term, target term, notes) and persist it
//!   through the extension settings blob.
//! - Import and export glossary files (`.glossync`, plain JSON).
//! - Point out glossary terms found in the selected cue.
//!
//! # Invariants
//! - Source terms are unique ignoring case; importing an existing term
//!   updates it in place.
//! - Entries without a source or target term are never stored.

use crate::extension::context::ContextHandle;
use crate::extension::descriptor::Descriptor;
use crate::extension::roles::{
    ActionContribution, DockArea, Extension, PanelContribution, UiExtension,
};
use crate::model::cue::Cue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::rc::Rc;

pub const GLOSSARY_ID: &str = "builtin.ui.glossary";
/// File extension used by glossary import/export.
pub const GLOSSARY_FILE_EXTENSION: &str = "glossync";
const SETTINGS_KEY: &str = "glossary";
const STATUS_TIMEOUT_MS: u32 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub notes: String,
}

impl GlossaryEntry {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    fn is_complete(&self) -> bool {
        !self.source.trim().is_empty() && !self.target.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Glossary {
    pub name: String,
    pub source_lang: String,
    pub target_lang: String,
    pub entries: Vec<GlossaryEntry>,
}

impl Default for Glossary {
    fn default() -> Self {
        Self {
            name: "New glossary".to_string(),
            source_lang: "en".to_string(),
            target_lang: "hu".to_string(),
            entries: Vec::new(),
        }
    }
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, source: &str) -> Option<usize> {
        let wanted = source.trim().to_lowercase();
        self.entries
            .iter()
            .position(|entry| entry.source.trim().to_lowercase() == wanted)
    }

    /// Adds `entry`, or updates the entry with the same source term.
    ///
    /// Returns `false` when the entry lacks a source or target term.
    pub fn upsert(&mut self, entry: GlossaryEntry) -> bool {
        if !entry.is_complete() {
            return false;
        }
        match self.position(&entry.source) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
        true
    }

    pub fn remove(&mut self, source: &str) -> bool {
        match self.position(source) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Target term for an exact (case-insensitive) source match.
    pub fn find_translation(&self, text: &str) -> Option<&str> {
        self.position(text).map(|index| self.entries[index].target.as_str())
    }

    /// Entries whose source, target or notes contain `query`, ignoring case.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&GlossaryEntry> {
        let query = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                query.is_empty()
                    || entry.source.to_lowercase().contains(&query)
                    || entry.target.to_lowercase().contains(&query)
                    || entry.notes.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Entries whose source term occurs in `text`, ignoring case.
    pub fn terms_in(&self, text: &str) -> Vec<&GlossaryEntry> {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                let source = entry.source.trim().to_lowercase();
                !source.is_empty() && text.contains(&source)
            })
            .collect()
    }

    /// Upserts every complete entry of `other`; returns how many were taken.
    pub fn merge(&mut self, other: Glossary) -> usize {
        other
            .entries
            .into_iter()
            .filter(|entry| self.upsert(entry.clone()))
            .count()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, GlossaryFileError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), GlossaryFileError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

/// Error while reading or writing a glossary file.
#[derive(Debug)]
pub enum GlossaryFileError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for GlossaryFileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "invalid glossary json: {err}"),
        }
    }
}

impl Error for GlossaryFileError {}

impl From<std::io::Error> for GlossaryFileError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for GlossaryFileError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Shared, single-threaded handle to the glossary data.
pub type SharedGlossary = Rc<RefCell<Glossary>>;

pub struct GlossaryExtension {
    descriptor: Descriptor,
    glossary: SharedGlossary,
    context: Option<ContextHandle>,
}

impl Default for GlossaryExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl GlossaryExtension {
    pub fn new() -> Self {
        Self {
            descriptor: Descriptor::new(GLOSSARY_ID, "Glossary", "1.0.0")
                .with_author("cuekit")
                .with_description("Personal translation glossary with .glossync import/export")
                .with_icon("📖")
                .with_readme("README.md"),
            glossary: Rc::new(RefCell::new(Glossary::new())),
            context: None,
        }
    }

    /// Handle the host UI edits the glossary through.
    pub fn glossary(&self) -> SharedGlossary {
        self.glossary.clone()
    }
}

impl Extension for GlossaryExtension {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn attach_context(&mut self, context: ContextHandle) {
        self.context = Some(context);
    }

    fn load_settings(&mut self, settings: &Value) {
        let Some(stored) = settings.get(SETTINGS_KEY) else {
            return;
        };
        match Glossary::deserialize(stored) {
            Ok(glossary) => *self.glossary.borrow_mut() = glossary,
            Err(err) => log::warn!(
                "event=settings_apply module=glossary status=skipped extension_id={GLOSSARY_ID} error={err}"
            ),
        }
    }

    fn save_settings(&self) -> Option<Value> {
        match serde_json::to_value(&*self.glossary.borrow()) {
            Ok(glossary) => {
                let mut settings = Map::new();
                settings.insert(SETTINGS_KEY.to_string(), glossary);
                Some(Value::Object(settings))
            }
            Err(err) => {
                log::error!(
                    "event=settings_collect module=glossary status=error extension_id={GLOSSARY_ID} error={err}"
                );
                None
            }
        }
    }

    fn as_ui(&self) -> Option<&dyn UiExtension> {
        Some(self)
    }
}

impl UiExtension for GlossaryExtension {
    fn dock_panel(&self) -> Option<PanelContribution> {
        Some(PanelContribution {
            id: "glossaryDock".to_string(),
            title: "Glossary".to_string(),
            area: DockArea::Left,
        })
    }

    fn menu_items(&self) -> Vec<ActionContribution> {
        vec![ActionContribution::new("glossary.toggle_panel", "Glossary Panel").checkable()]
    }

    fn on_cue_selected(&self, cue: &Cue) {
        let Some(context) = self.context.as_ref() else {
            return;
        };
        let glossary = self.glossary.borrow();
        let found: Vec<String> = glossary
            .terms_in(&cue.source_text)
            .into_iter()
            .map(|entry| format!("{} → {}", entry.source, entry.target))
            .collect();
        if !found.is_empty() {
            context.show_status(&format!("Glossary: {}", found.join(", ")), STATUS_TIMEOUT_MS);
        }
    }
}
