//! Capability interfaces: the base lifecycle contract plus the role traits an
//! extension may satisfy.
//!
//! # Responsibility
//! - Define the fixed role vocabulary (Export, QA, UI, Service, Translation,
//!   Language) as traits layered on `Extension`.
//! - Let one instance declare any combination of roles through the `as_*`
//!   accessors; the registry classifies by those answers, never by a tag.
//!
//! # Invariants
//! - Role membership is read once, at registration time.
//! - Every Translation extension is also a Service extension.

use crate::extension::context::ContextHandle;
use crate::extension::descriptor::Descriptor;
use crate::i18n::{LanguageRegistration, Localization, SharedLocalization, TranslationTable};
use crate::model::cue::{Cue, CueId};
use crate::model::project::Project;
use serde_json::Value;
use std::cell::RefMut;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Free-form options handed to an export call.
pub type ExportOptions = serde_json::Map<String, Value>;

/// Functional roles an extension may satisfy, zero or more at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtensionRole {
    Export,
    Qa,
    Ui,
    Service,
    Translation,
    Language,
}

impl ExtensionRole {
    pub const ALL: [ExtensionRole; 6] = [
        Self::Export,
        Self::Qa,
        Self::Ui,
        Self::Service,
        Self::Translation,
        Self::Language,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Qa => "qa",
            Self::Ui => "ui",
            Self::Service => "service",
            Self::Translation => "translation",
            Self::Language => "language",
        }
    }
}

/// Failure reported by extension code (initialize, export, translate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionError {
    message: String,
}

impl ExtensionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ExtensionError {}

impl From<std::io::Error> for ExtensionError {
    fn from(value: std::io::Error) -> Self {
        Self::new(format!("io error: {value}"))
    }
}

/// What an extension sees while `initialize()` runs.
pub struct InitEnv<'a> {
    extension_id: &'a str,
    resource_root: Option<&'a Path>,
    localization: &'a SharedLocalization,
}

impl<'a> InitEnv<'a> {
    pub(crate) fn new(
        extension_id: &'a str,
        resource_root: Option<&'a Path>,
        localization: &'a SharedLocalization,
    ) -> Self {
        Self {
            extension_id,
            resource_root,
            localization,
        }
    }

    pub fn extension_id(&self) -> &str {
        self.extension_id
    }

    /// Directory the extension was loaded from, if it came from disk.
    pub fn resource_root(&self) -> Option<&Path> {
        self.resource_root
    }

    /// One-way access to the localization collaborator.
    pub fn localization(&self) -> RefMut<'a, dyn Localization> {
        self.localization.borrow_mut()
    }
}

/// Severity of one QA finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// One QA finding. Produced fresh per check call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaIssue {
    pub cue_id: CueId,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
}

impl QaIssue {
    pub fn new(cue_id: CueId, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            cue_id,
            severity,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Dock area a contributed panel prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockArea {
    Left,
    Right,
    Bottom,
}

/// Panel an extension hands back to the host for placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelContribution {
    /// Stable object name, unique per extension.
    pub id: String,
    pub title: String,
    pub area: DockArea,
}

/// Menu or toolbar action an extension hands back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContribution {
    pub id: String,
    pub label: String,
    pub shortcut: Option<String>,
    pub checkable: bool,
}

impl ActionContribution {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            shortcut: None,
            checkable: false,
        }
    }

    pub fn with_shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }

    pub fn checkable(mut self) -> Self {
        self.checkable = true;
        self
    }
}

/// Supported translation direction of a translation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
    pub display_name: String,
}

/// Base lifecycle contract every extension satisfies.
pub trait Extension {
    fn descriptor(&self) -> &Descriptor;

    /// Called once during registration. An error aborts registration.
    fn initialize(&mut self, _env: &InitEnv<'_>) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Called exactly once per successful `initialize()`.
    fn shutdown(&mut self) {}

    /// Hands the extension its own Context after registration succeeded.
    fn attach_context(&mut self, _context: ContextHandle) {}

    fn load_settings(&mut self, _settings: &Value) {}

    /// Settings to persist; `None` keeps only the Context namespace.
    fn save_settings(&self) -> Option<Value> {
        None
    }

    /// Configuration surface for the host's settings dialog.
    fn settings_panel(&self) -> Option<PanelContribution> {
        None
    }

    /// Long description: readme under the resource root, else the short one.
    fn long_description(&self, resource_root: Option<&Path>) -> String {
        read_long_description(self.descriptor(), resource_root)
    }

    fn as_export(&self) -> Option<&dyn ExportExtension> {
        None
    }

    fn as_qa(&self) -> Option<&dyn QaExtension> {
        None
    }

    fn as_ui(&self) -> Option<&dyn UiExtension> {
        None
    }

    /// Translation extensions are services without further declaration.
    fn as_service(&self) -> Option<&dyn ServiceExtension> {
        self.as_translation()
            .map(|translation| translation as &dyn ServiceExtension)
    }

    fn as_translation(&self) -> Option<&dyn TranslationExtension> {
        None
    }

    fn as_language(&self) -> Option<&dyn LanguageExtension> {
        None
    }
}

/// Export role: writes the project in a custom format.
pub trait ExportExtension: Extension {
    fn file_extension(&self) -> &str {
        ".txt"
    }

    /// File-dialog filter string, e.g. `CSV file (*.csv)`.
    fn file_filter(&self) -> String {
        format!("Text file (*{})", self.file_extension())
    }

    fn export(
        &self,
        output: &Path,
        project: &Project,
        cues: &[Cue],
        options: &ExportOptions,
    ) -> Result<(), ExtensionError>;
}

/// QA role: checks cues and reports findings in a stable order.
pub trait QaExtension: Extension {
    fn check(&self, project: &Project, cues: &[Cue]) -> Vec<QaIssue>;
}

/// UI role: contributes panels and actions, and observes host notifications.
pub trait UiExtension: Extension {
    fn dock_panel(&self) -> Option<PanelContribution> {
        None
    }

    fn menu_items(&self) -> Vec<ActionContribution> {
        Vec::new()
    }

    fn toolbar_items(&self) -> Vec<ActionContribution> {
        Vec::new()
    }

    fn on_cue_selected(&self, _cue: &Cue) {}

    fn on_project_opened(&self, _project: &Project) {}

    fn on_project_closed(&self) {}
}

/// Service role: a named background service with an availability check.
pub trait ServiceExtension: Extension {
    fn service_name(&self) -> String;

    fn is_available(&self) -> bool {
        true
    }

    fn status(&self) -> String {
        if self.is_available() {
            "OK".to_string()
        } else {
            "Unavailable".to_string()
        }
    }
}

/// Translation role, a specialised service.
pub trait TranslationExtension: ServiceExtension {
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ExtensionError>;

    fn supported_languages(&self) -> Vec<LanguagePair> {
        Vec::new()
    }
}

/// Language role: contributes one UI language.
pub trait LanguageExtension: Extension {
    fn language_code(&self) -> &str;

    /// Native display name, e.g. `Deutsch`.
    fn display_name(&self) -> &str;

    /// English name, e.g. `German`.
    fn english_name(&self) -> &str {
        self.display_name()
    }

    fn flag(&self) -> &str {
        ""
    }

    fn is_rtl(&self) -> bool {
        false
    }

    /// Translations resource relative to the resource root.
    fn translations_resource(&self) -> Option<PathBuf> {
        Some(PathBuf::from("locales").join(format!("{}.json", self.language_code())))
    }

    /// Application texts compiled into the extension. Keys found in the
    /// translations resource take precedence.
    fn bundled_translations(&self) -> TranslationTable {
        TranslationTable::new()
    }
}

/// Default service name for translation services: `translator_<id>`.
pub fn translation_service_name(descriptor: &Descriptor) -> String {
    format!("translator_{}", descriptor.id)
}

/// Pushes the UI language registration of `language` to localization.
///
/// Language extensions call this from `initialize()`. Returns `false` when
/// the code was already registered.
pub fn register_language(language: &dyn LanguageExtension, env: &InitEnv<'_>) -> bool {
    let translations_path = match (env.resource_root(), language.translations_resource()) {
        (Some(root), Some(relative)) => Some(root.join(relative)),
        _ => None,
    };
    let registered = env.localization().register_language(LanguageRegistration {
        code: language.language_code().to_string(),
        display_name: language.display_name().to_string(),
        english_name: language.english_name().to_string(),
        flag: language.flag().to_string(),
        rtl: language.is_rtl(),
        translations_path,
        translations: language.bundled_translations(),
    });
    if !registered {
        log::warn!(
            "event=language_register module=extension status=skipped extension_id={} code={}",
            env.extension_id(),
            language.language_code()
        );
    }
    registered
}

/// Classifies an instance by the roles it answers for.
pub fn detect_roles(extension: &dyn Extension) -> BTreeSet<ExtensionRole> {
    let mut roles = BTreeSet::new();
    if extension.as_export().is_some() {
        roles.insert(ExtensionRole::Export);
    }
    if extension.as_qa().is_some() {
        roles.insert(ExtensionRole::Qa);
    }
    if extension.as_ui().is_some() {
        roles.insert(ExtensionRole::Ui);
    }
    if extension.as_translation().is_some() {
        roles.insert(ExtensionRole::Translation);
        roles.insert(ExtensionRole::Service);
    }
    if extension.as_service().is_some() {
        roles.insert(ExtensionRole::Service);
    }
    if extension.as_language().is_some() {
        roles.insert(ExtensionRole::Language);
    }
    roles
}

fn read_long_description(descriptor: &Descriptor, resource_root: Option<&Path>) -> String {
    if let (Some(root), Some(readme)) = (resource_root, descriptor.readme_path.as_deref()) {
        let path = root.join(readme);
        match std::fs::read_to_string(&path) {
            Ok(content) => return content,
            Err(err) => log::debug!(
                "event=readme_read module=extension status=skipped extension_id={} path={} error={}",
                descriptor.id,
                path.display(),
                err
            ),
        }
    }
    descriptor.description.clone()
}

#[cfg(test)]
mod tests {
    use super::{
        detect_roles, Extension, ExtensionError, ExtensionRole, ServiceExtension,
        TranslationExtension,
    };
    use crate::extension::descriptor::Descriptor;
    use std::collections::BTreeSet;

    struct Plain {
        descriptor: Descriptor,
    }

    impl Extension for Plain {
        fn descriptor(&self) -> &Descriptor {
            &self.descriptor
        }
    }

    struct Translator {
        descriptor: Descriptor,
    }

    impl Extension for Translator {
        fn descriptor(&self) -> &Descriptor {
            &self.descriptor
        }

        fn as_translation(&self) -> Option<&dyn TranslationExtension> {
            Some(self)
        }
    }

    impl ServiceExtension for Translator {
        fn service_name(&self) -> String {
            super::translation_service_name(&self.descriptor)
        }
    }

    impl TranslationExtension for Translator {
        fn translate(&self, text: &str, _: &str, _: &str) -> Result<String, ExtensionError> {
            Ok(text.to_uppercase())
        }
    }

    #[test]
    fn plain_extension_has_no_roles() {
        let plain = Plain {
            descriptor: Descriptor::new("plain", "Plain", "1.0.0"),
        };
        assert!(detect_roles(&plain).is_empty());
    }

    #[test]
    fn translation_implies_service() {
        let translator = Translator {
            descriptor: Descriptor::new("deepl", "DeepL", "1.0.0"),
        };
        assert_eq!(
            detect_roles(&translator),
            BTreeSet::from([ExtensionRole::Service, ExtensionRole::Translation])
        );
        let service = translator.as_service().expect("translation is a service");
        assert_eq!(service.service_name(), "translator_deepl");
        assert_eq!(service.status(), "OK");
    }

    #[test]
    fn long_description_falls_back_to_short_description() {
        let plain = Plain {
            descriptor: Descriptor::new("plain", "Plain", "1.0.0")
                .with_description("short")
                .with_readme("README.md"),
        };
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(plain.long_description(Some(dir.path())), "short");
        assert_eq!(plain.long_description(None), "short");

        std::fs::write(dir.path().join("README.md"), "# Plain\nlong text").expect("write readme");
        assert_eq!(plain.long_description(Some(dir.path())), "# Plain\nlong text");
    }
}
