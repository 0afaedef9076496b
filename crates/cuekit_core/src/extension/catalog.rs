//! Compiled-in extension catalog: unit name -> export name -> constructor.
//!
//! Discovery never loads code from disk. A manifest found on disk selects a
//! unit and its exports; this catalog supplies the constructors.

use crate::extension::manifest::WELL_KNOWN_EXPORT;
use crate::extension::roles::Extension;
use std::collections::BTreeMap;

/// Zero-argument constructor published under one export name.
pub type ExtensionFactory = fn() -> Box<dyn Extension>;

#[derive(Debug, Clone, Default)]
pub struct ExtensionCatalog {
    units: BTreeMap<String, BTreeMap<String, ExtensionFactory>>,
}

/// Outcome of entry point resolution for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    Resolved(String),
    NotFound,
    Ambiguous(Vec<String>),
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`Self::add_export`].
    pub fn with_export(mut self, unit: &str, export: &str, factory: ExtensionFactory) -> Self {
        self.add_export(unit, export, factory);
        self
    }

    /// Publishes `factory` as `unit::export`. Returns `false` if the export
    /// already existed (the first one stays).
    pub fn add_export(&mut self, unit: &str, export: &str, factory: ExtensionFactory) -> bool {
        let exports = self.units.entry(unit.to_string()).or_default();
        if exports.contains_key(export) {
            log::warn!(
                "event=catalog_add module=catalog status=skipped unit={unit} export={export} reason=duplicate"
            );
            return false;
        }
        exports.insert(export.to_string(), factory);
        true
    }

    /// Merges every export of `other` that is not already present.
    pub fn extend(&mut self, other: ExtensionCatalog) {
        for (unit, exports) in other.units {
            for (export, factory) in exports {
                self.add_export(&unit, &export, factory);
            }
        }
    }

    pub fn contains_unit(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn factory(&self, unit: &str, export: &str) -> Option<ExtensionFactory> {
        self.units.get(unit)?.get(export).copied()
    }

    /// Picks the entry point among `declared` exports of `unit`.
    ///
    /// The well-known export wins when it resolves; otherwise exactly one
    /// declared export must resolve.
    pub fn resolve_entry_point(&self, unit: &str, declared: &[String]) -> EntryPoint {
        let Some(exports) = self.units.get(unit) else {
            return EntryPoint::NotFound;
        };
        let resolvable: Vec<String> = declared
            .iter()
            .map(|name| name.trim())
            .filter(|name| exports.contains_key(*name))
            .map(str::to_string)
            .collect();
        if resolvable.iter().any(|name| name == WELL_KNOWN_EXPORT) {
            return EntryPoint::Resolved(WELL_KNOWN_EXPORT.to_string());
        }
        match resolvable.len() {
            0 => EntryPoint::NotFound,
            1 => EntryPoint::Resolved(resolvable.into_iter().next().unwrap_or_default()),
            _ => EntryPoint::Ambiguous(resolvable),
        }
    }
}
