//! Localization collaborator.
//!
//! # Responsibility
//! - Keep the available UI languages and the current language.
//! - Hold application and per-extension translation tables with `en` fallback.
//! - Load locale JSON files (nested objects flattened to dotted keys).
//!
//! # Invariants
//! - The fallback language `en` is always registered.
//! - Lookups never fail: a missing key resolves to `None` (or the key itself
//!   at the Context surface).
//!
//! # See also
//! - `extension::roles::register_language` for the Language role hook.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Language every lookup falls back to.
pub const FALLBACK_LANGUAGE: &str = "en";

/// Flat key -> text table for one language.
pub type TranslationTable = BTreeMap<String, String>;

/// Shared, single-threaded handle to the localization collaborator.
pub type SharedLocalization = Rc<RefCell<dyn Localization>>;

/// One UI language as pushed by the host or a Language extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRegistration {
    pub code: String,
    /// Native name, e.g. `Magyar`.
    pub display_name: String,
    pub english_name: String,
    pub flag: String,
    pub rtl: bool,
    pub translations_path: Option<PathBuf>,
    /// Table shipped inside the binary; the file at `translations_path`
    /// overrides its keys.
    pub translations: TranslationTable,
}

impl LanguageRegistration {
    pub fn new(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            code: code.into(),
            english_name: display_name.clone(),
            display_name,
            flag: String::new(),
            rtl: false,
            translations_path: None,
            translations: TranslationTable::new(),
        }
    }

    /// Label shown in language pickers.
    pub fn label(&self) -> String {
        if self.flag.is_empty() {
            self.display_name.clone()
        } else {
            format!("{} {}", self.flag, self.display_name)
        }
    }
}

/// Contract the host and extensions use for UI text.
pub trait Localization {
    /// Adds a UI language. Returns `false` if the code already exists.
    fn register_language(&mut self, registration: LanguageRegistration) -> bool;

    /// Replaces the table of `extension_id` for `language`.
    fn register_extension_translations(
        &mut self,
        extension_id: &str,
        language: &str,
        table: TranslationTable,
    );

    fn current_language(&self) -> String;

    /// Switches the current language. Returns `false` for unknown codes.
    fn set_current_language(&mut self, code: &str) -> bool;

    fn available_languages(&self) -> Vec<LanguageRegistration>;

    /// Application-level lookup with fallback.
    fn text(&self, key: &str) -> Option<String>;

    /// Extension-scoped lookup, falling back to application text.
    fn extension_text(&self, extension_id: &str, key: &str) -> Option<String>;

    /// Drops every table an extension registered.
    fn forget_extension(&mut self, extension_id: &str);
}

/// In-memory localization catalog.
#[derive(Debug, Clone)]
pub struct LocaleCatalog {
    languages: BTreeMap<String, LanguageRegistration>,
    current: String,
    tables: BTreeMap<String, TranslationTable>,
    extension_tables: BTreeMap<String, BTreeMap<String, TranslationTable>>,
}

impl Default for LocaleCatalog {
    fn default() -> Self {
        let mut english = LanguageRegistration::new(FALLBACK_LANGUAGE, "English");
        english.flag = "🇬🇧".to_string();
        let mut languages = BTreeMap::new();
        languages.insert(FALLBACK_LANGUAGE.to_string(), english);
        Self {
            languages,
            current: FALLBACK_LANGUAGE.to_string(),
            tables: BTreeMap::new(),
            extension_tables: BTreeMap::new(),
        }
    }
}

impl LocaleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh catalog into the shared handle.
    pub fn shared() -> SharedLocalization {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Replaces the application table for `language`.
    pub fn set_application_table(&mut self, language: &str, table: TranslationTable) {
        self.tables.insert(language.to_string(), table);
    }

    fn lookup(
        tables: &BTreeMap<String, TranslationTable>,
        current: &str,
        key: &str,
    ) -> Option<String> {
        if let Some(text) = tables.get(current).and_then(|table| table.get(key)) {
            return Some(text.clone());
        }
        if current == FALLBACK_LANGUAGE {
            return None;
        }
        tables
            .get(FALLBACK_LANGUAGE)
            .and_then(|table| table.get(key))
            .cloned()
    }
}

impl Localization for LocaleCatalog {
    fn register_language(&mut self, registration: LanguageRegistration) -> bool {
        if self.languages.contains_key(&registration.code) {
            return false;
        }
        let mut table = registration.translations.clone();
        if let Some(path) = registration.translations_path.as_deref() {
            match read_locale_file(path) {
                Ok(from_file) => table.extend(from_file),
                Err(err) => log::warn!(
                    "event=locale_load module=i18n status=error code={} path={} error={}",
                    registration.code,
                    path.display(),
                    err
                ),
            }
        }
        if !table.is_empty() {
            self.tables
                .entry(registration.code.clone())
                .or_default()
                .extend(table);
        }
        log::info!(
            "event=language_register module=i18n status=ok code={}",
            registration.code
        );
        self.languages.insert(registration.code.clone(), registration);
        true
    }

    fn register_extension_translations(
        &mut self,
        extension_id: &str,
        language: &str,
        table: TranslationTable,
    ) {
        self.extension_tables
            .entry(extension_id.to_string())
            .or_default()
            .insert(language.to_string(), table);
    }

    fn current_language(&self) -> String {
        self.current.clone()
    }

    fn set_current_language(&mut self, code: &str) -> bool {
        if !self.languages.contains_key(code) {
            log::warn!("event=language_switch module=i18n status=skipped code={code}");
            return false;
        }
        self.current = code.to_string();
        true
    }

    fn available_languages(&self) -> Vec<LanguageRegistration> {
        self.languages.values().cloned().collect()
    }

    fn text(&self, key: &str) -> Option<String> {
        Self::lookup(&self.tables, &self.current, key)
    }

    fn extension_text(&self, extension_id: &str, key: &str) -> Option<String> {
        self.extension_tables
            .get(extension_id)
            .and_then(|tables| Self::lookup(tables, &self.current, key))
            .or_else(|| self.text(key))
    }

    fn forget_extension(&mut self, extension_id: &str) {
        self.extension_tables.remove(extension_id);
    }
}

/// Error while reading one locale file.
#[derive(Debug)]
pub enum LocaleFileError {
    Io(std::io::Error),
    Json(serde_json::Error),
    NotAnObject,
}

impl std::fmt::Display for LocaleFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "invalid json: {err}"),
            Self::NotAnObject => write!(f, "locale root must be a JSON object"),
        }
    }
}

impl std::error::Error for LocaleFileError {}

impl From<std::io::Error> for LocaleFileError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for LocaleFileError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Reads one locale JSON file into a flat table.
pub fn read_locale_file(path: &Path) -> Result<TranslationTable, LocaleFileError> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    if !value.is_object() {
        return Err(LocaleFileError::NotAnObject);
    }
    Ok(flatten_translations(&value))
}

/// Reads every `<code>.json` in `locales_dir`, keyed by the file stem.
///
/// Unreadable files are logged and skipped. A missing directory yields an
/// empty map.
pub fn read_locale_dir(locales_dir: &Path) -> BTreeMap<String, TranslationTable> {
    let mut tables = BTreeMap::new();
    let entries = match std::fs::read_dir(locales_dir) {
        Ok(entries) => entries,
        Err(_) => return tables,
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        let Some(code) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        match read_locale_file(&path) {
            Ok(table) => {
                tables.insert(code.to_string(), table);
            }
            Err(err) => log::warn!(
                "event=locale_load module=i18n status=error path={} error={}",
                path.display(),
                err
            ),
        }
    }
    tables
}

/// Substitutes `{name}` placeholders in `template` with `args`.
///
/// Placeholders without a matching argument, and unbalanced braces, are kept
/// as written. Inserted values are not scanned again.
pub fn format_text(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match args.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Flattens nested JSON objects into dotted keys.
///
/// `{"menu": {"file": "File"}}` becomes `menu.file = File`. Non-string leaves
/// keep their JSON text.
pub fn flatten_translations(value: &Value) -> TranslationTable {
    let mut table = TranslationTable::new();
    flatten_into(value, "", &mut table);
    table
}

fn flatten_into(value: &Value, prefix: &str, table: &mut TranslationTable) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let next = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &next, table);
            }
        }
        Value::String(text) => {
            table.insert(prefix.to_string(), text.clone());
        }
        other => {
            table.insert(prefix.to_string(), other.to_string());
        }
    }
}
