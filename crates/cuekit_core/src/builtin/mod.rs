//! Extensions shipped with the host.
//!
//! Each one is published in [`catalog`] under its unit name with the
//! well-known export, so a built-in location only needs manifests.

pub mod basic_qa;
pub mod csv_export;
pub mod glossary;
pub mod language_pack;
pub mod translator;

use crate::extension::catalog::ExtensionCatalog;
use crate::extension::manifest::WELL_KNOWN_EXPORT;
use crate::extension::roles::Extension;

pub use basic_qa::{BasicQa, BASIC_QA_ID};
pub use csv_export::{CsvExport, CsvOptions, CSV_EXPORT_ID};
pub use glossary::{Glossary, GlossaryEntry, GlossaryExtension, SharedGlossary, GLOSSARY_ID};
pub use language_pack::{GermanLanguage, GERMAN_LANGUAGE_ID};
pub use translator::{
    GlossaryBackend, TranslationBackend, Translator, UnconfiguredBackend, TRANSLATOR_ID,
};

pub const CSV_EXPORT_UNIT: &str = "csv_export";
pub const BASIC_QA_UNIT: &str = "basic_qa";
pub const GERMAN_LANGUAGE_UNIT: &str = "language_de";
pub const GLOSSARY_UNIT: &str = "glossary";
pub const TRANSLATOR_UNIT: &str = "translator";

fn csv_export() -> Box<dyn Extension> {
    Box::new(CsvExport::new())
}

fn basic_qa() -> Box<dyn Extension> {
    Box::new(BasicQa::new())
}

fn german_language() -> Box<dyn Extension> {
    Box::new(GermanLanguage::new())
}

fn glossary() -> Box<dyn Extension> {
    Box::new(GlossaryExtension::new())
}

fn translator() -> Box<dyn Extension> {
    Box::new(Translator::new())
}

/// Catalog of every built-in unit.
///
/// Catalog factories share no state, so the translator built here has no
/// backend until one is configured.
pub fn catalog() -> ExtensionCatalog {
    ExtensionCatalog::new()
        .with_export(CSV_EXPORT_UNIT, WELL_KNOWN_EXPORT, csv_export)
        .with_export(BASIC_QA_UNIT, WELL_KNOWN_EXPORT, basic_qa)
        .with_export(GERMAN_LANGUAGE_UNIT, WELL_KNOWN_EXPORT, german_language)
        .with_export(GLOSSARY_UNIT, WELL_KNOWN_EXPORT, glossary)
        .with_export(TRANSLATOR_UNIT, WELL_KNOWN_EXPORT, translator)
}

/// Fresh instances of every built-in, in catalog order.
///
/// The translator answers from the glossary instance created alongside it.
pub fn extensions() -> Vec<Box<dyn Extension>> {
    let glossary = GlossaryExtension::new();
    let backend = GlossaryBackend::new(glossary.glossary());
    vec![
        csv_export(),
        basic_qa(),
        german_language(),
        Box::new(glossary),
        Box::new(Translator::with_backend(Box::new(backend))),
    ]
}
