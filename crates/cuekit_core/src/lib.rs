//! Extension host core for the cuekit dubbing editor.
//!
//! Owns extension discovery, the registry, per-extension Contexts with their
//! capability gate, event dispatch, and the settings/localization
//! collaborators. Everything runs on the host thread.

pub mod builtin;
pub mod config;
pub mod db;
pub mod extension;
pub mod i18n;
pub mod logging;
pub mod model;
pub mod settings;

pub use config::{ConfigError, HostConfig};
pub use extension::capability::{Capability, CapabilityGrant};
pub use extension::catalog::{ExtensionCatalog, ExtensionFactory};
pub use extension::context::{
    ApiVersionRange, ContextHandle, ContextLogEntry, HostWindow, MessageLevel,
};
pub use extension::context_manager::ContextManager;
pub use extension::descriptor::{Dependency, Descriptor, DescriptorError};
pub use extension::events::{
    DispatchReport, EventHandler, HandlerError, HandlerFailure, HostEvent, HostEventKind,
};
pub use extension::host::{ExportRunError, ExtensionHost, QaReport, UiContributions};
pub use extension::loader::{ExtensionLocation, LoadError, LocationKind};
pub use extension::manifest::{ManifestError, UnitManifest};
pub use extension::registry::{ExtensionRegistry, RegistryError, RegistrySnapshot};
pub use extension::roles::{
    ActionContribution, DockArea, ExportExtension, ExportOptions, Extension, ExtensionError,
    ExtensionRole, InitEnv, LanguageExtension, LanguagePair, PanelContribution, QaExtension,
    QaIssue, ServiceExtension, Severity, TranslationExtension, UiExtension,
};
pub use i18n::{
    format_text, LanguageRegistration, LocaleCatalog, Localization, SharedLocalization,
    TranslationTable,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cue::{format_timecode, Cue, CueId, CueStatus};
pub use model::project::{Project, SharedProject};
pub use settings::{MemorySettingsStore, SettingsError, SettingsStore, SqliteSettingsStore};

/// Application name reported to extensions by default.
pub const APP_NAME: &str = "CueKit";
/// Application version reported to extensions by default.
pub const APP_VERSION: &str = "1.0.0";

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
