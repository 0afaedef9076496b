//! Extension registry: id -> instance store with incremental role indices.
//!
//! # Responsibility
//! - Admit extensions through `register` (validate, reject duplicates,
//!   run `initialize`) and remove them through `unregister` (run `shutdown`).
//! - Keep the enabled-id set and per-role indices consistent with the store.
//! - Hold the opaque per-id settings blobs handed in by the host.
//!
//! # Invariants
//! - An id enters only via a successful `register` and leaves only via
//!   `unregister` or `shutdown_all`.
//! - `shutdown` runs exactly once per successful `initialize`.
//! - enabled ids are always a subset of registered ids.
//! - Role indices list ids in registration order and are never rebuilt on
//!   query.
//! - enable/disable never touch role indices and never call lifecycle hooks.

use crate::extension::descriptor::DescriptorError;
use crate::extension::events::panic_message;
use crate::extension::roles::{
    detect_roles, ExportExtension, Extension, ExtensionRole, InitEnv, LanguageExtension,
    QaExtension, ServiceExtension, TranslationExtension, UiExtension,
};
use crate::i18n::{read_locale_dir, LocaleCatalog, SharedLocalization};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Locale folder name under an extension's resource root.
pub const LOCALES_DIR: &str = "locales";

/// One admitted extension plus what the registry learned about it.
pub struct RegisteredExtension {
    extension: Box<dyn Extension>,
    roles: BTreeSet<ExtensionRole>,
    resource_root: Option<PathBuf>,
}

impl RegisteredExtension {
    pub fn extension(&self) -> &dyn Extension {
        self.extension.as_ref()
    }

    pub fn roles(&self) -> &BTreeSet<ExtensionRole> {
        &self.roles
    }

    pub fn resource_root(&self) -> Option<&Path> {
        self.resource_root.as_deref()
    }
}

/// Comparable copy of every registry map, used to assert "no mutation".
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub ids: Vec<String>,
    pub roles: BTreeMap<ExtensionRole, Vec<String>>,
    pub enabled: BTreeSet<String>,
    pub settings: BTreeMap<String, Value>,
}

pub struct ExtensionRegistry {
    localization: SharedLocalization,
    entries: BTreeMap<String, RegisteredExtension>,
    order: Vec<String>,
    role_index: BTreeMap<ExtensionRole, Vec<String>>,
    enabled: BTreeSet<String>,
    settings: BTreeMap<String, Value>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new(LocaleCatalog::shared())
    }
}

impl ExtensionRegistry {
    pub fn new(localization: SharedLocalization) -> Self {
        Self {
            localization,
            entries: BTreeMap::new(),
            order: Vec::new(),
            role_index: BTreeMap::new(),
            enabled: BTreeSet::new(),
            settings: BTreeMap::new(),
        }
    }

    /// Registers a compiled-in extension with no resource root.
    pub fn register(
        &mut self,
        extension: Box<dyn Extension>,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.register_with_root(extension, enabled, None)
    }

    /// Validates, initializes and indexes one extension.
    ///
    /// A duplicate id fails before `initialize` runs. An `initialize`
    /// failure (error or panic) discards the instance without state change.
    pub fn register_with_root(
        &mut self,
        mut extension: Box<dyn Extension>,
        enabled: bool,
        resource_root: Option<PathBuf>,
    ) -> Result<(), RegistryError> {
        let descriptor = extension.descriptor();
        let id = descriptor.id.clone();
        descriptor
            .validate()
            .map_err(|error| RegistryError::InvalidDescriptor {
                id: id.clone(),
                error,
            })?;
        if self.entries.contains_key(&id) {
            log::warn!(
                "event=extension_register module=registry status=error extension_id={id} reason=duplicate"
            );
            return Err(RegistryError::DuplicateId(id));
        }

        if let Some(root) = resource_root.as_deref() {
            self.load_extension_locales(&id, root);
        }
        let outcome = {
            let env = InitEnv::new(&id, resource_root.as_deref(), &self.localization);
            catch_unwind(AssertUnwindSafe(|| extension.initialize(&env)))
        };
        let reason = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
        };
        if let Some(reason) = reason {
            log::error!(
                "event=extension_register module=registry status=error extension_id={id} reason=initialize_failed error={reason}"
            );
            self.localization.borrow_mut().forget_extension(&id);
            return Err(RegistryError::InitializationRejected { id, reason });
        }

        let roles = detect_roles(extension.as_ref());
        for role in &roles {
            self.role_index.entry(*role).or_default().push(id.clone());
        }
        if enabled {
            self.enabled.insert(id.clone());
        }
        self.order.push(id.clone());
        self.entries.insert(
            id.clone(),
            RegisteredExtension {
                extension,
                roles,
                resource_root,
            },
        );
        log::info!(
            "event=extension_register module=registry status=ok extension_id={id} enabled={enabled}"
        );
        Ok(())
    }

    /// Pushes `<root>/locales/<code>.json` tables for `extension_id`.
    fn load_extension_locales(&self, extension_id: &str, root: &Path) {
        let tables = read_locale_dir(&root.join(LOCALES_DIR));
        if tables.is_empty() {
            return;
        }
        let mut localization = self.localization.borrow_mut();
        for (language, table) in tables {
            log::debug!(
                "event=locale_load module=registry status=ok extension_id={extension_id} language={language} keys={}",
                table.len()
            );
            localization.register_extension_translations(extension_id, &language, table);
        }
    }

    /// Shuts down and removes one extension. Unknown ids change nothing.
    pub fn unregister(&mut self, extension_id: &str) -> Result<(), RegistryError> {
        let Some(mut entry) = self.entries.remove(extension_id) else {
            return Err(RegistryError::UnknownId(extension_id.to_string()));
        };
        run_shutdown(extension_id, entry.extension.as_mut());

        self.order.retain(|id| id != extension_id);
        for ids in self.role_index.values_mut() {
            ids.retain(|id| id != extension_id);
        }
        self.role_index.retain(|_, ids| !ids.is_empty());
        self.enabled.remove(extension_id);
        self.localization
            .borrow_mut()
            .forget_extension(extension_id);
        log::info!(
            "event=extension_unregister module=registry status=ok extension_id={extension_id}"
        );
        Ok(())
    }

    pub fn enable(&mut self, extension_id: &str) -> Result<(), RegistryError> {
        if !self.entries.contains_key(extension_id) {
            return Err(RegistryError::UnknownId(extension_id.to_string()));
        }
        self.enabled.insert(extension_id.to_string());
        Ok(())
    }

    /// Removes the id from the enabled set. Never fails, including for ids
    /// that were never registered. Returns whether membership changed.
    pub fn disable(&mut self, extension_id: &str) -> bool {
        self.enabled.remove(extension_id)
    }

    /// Replaces the enabled set; ids that are not registered are dropped.
    pub fn set_enabled_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.enabled = ids
            .into_iter()
            .filter(|id| self.entries.contains_key(id.as_ref()))
            .map(|id| id.as_ref().to_string())
            .collect();
    }

    pub fn is_enabled(&self, extension_id: &str) -> bool {
        self.enabled.contains(extension_id)
    }

    pub fn enabled_ids(&self) -> &BTreeSet<String> {
        &self.enabled
    }

    pub fn contains(&self, extension_id: &str) -> bool {
        self.entries.contains_key(extension_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, extension_id: &str) -> Option<&RegisteredExtension> {
        self.entries.get(extension_id)
    }

    pub(crate) fn extension_mut(
        &mut self,
        extension_id: &str,
    ) -> Option<&mut (dyn Extension + 'static)> {
        self.entries
            .get_mut(extension_id)
            .map(|entry| entry.extension.as_mut())
    }

    /// Every registered instance in registration order.
    pub fn all_extensions(&self) -> Vec<&dyn Extension> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.extension.as_ref())
            .collect()
    }

    /// Ids holding `role`, in registration order.
    pub fn ids_with_role(&self, role: ExtensionRole, enabled_only: bool) -> Vec<&str> {
        self.role_index
            .get(&role)
            .map(|ids| {
                ids.iter()
                    .filter(|id| !enabled_only || self.enabled.contains(id.as_str()))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn role_members(&self, role: ExtensionRole, enabled_only: bool) -> Vec<&dyn Extension> {
        self.ids_with_role(role, enabled_only)
            .into_iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.extension.as_ref())
            .collect()
    }

    pub fn export_extensions(&self, enabled_only: bool) -> Vec<&dyn ExportExtension> {
        self.role_members(ExtensionRole::Export, enabled_only)
            .into_iter()
            .filter_map(|extension| extension.as_export())
            .collect()
    }

    pub fn qa_extensions(&self, enabled_only: bool) -> Vec<&dyn QaExtension> {
        self.role_members(ExtensionRole::Qa, enabled_only)
            .into_iter()
            .filter_map(|extension| extension.as_qa())
            .collect()
    }

    pub fn ui_extensions(&self, enabled_only: bool) -> Vec<&dyn UiExtension> {
        self.role_members(ExtensionRole::Ui, enabled_only)
            .into_iter()
            .filter_map(|extension| extension.as_ui())
            .collect()
    }

    pub fn service_extensions(&self, enabled_only: bool) -> Vec<&dyn ServiceExtension> {
        self.role_members(ExtensionRole::Service, enabled_only)
            .into_iter()
            .filter_map(|extension| extension.as_service())
            .collect()
    }

    pub fn translation_extensions(&self, enabled_only: bool) -> Vec<&dyn TranslationExtension> {
        self.role_members(ExtensionRole::Translation, enabled_only)
            .into_iter()
            .filter_map(|extension| extension.as_translation())
            .collect()
    }

    pub fn language_extensions(&self, enabled_only: bool) -> Vec<&dyn LanguageExtension> {
        self.role_members(ExtensionRole::Language, enabled_only)
            .into_iter()
            .filter_map(|extension| extension.as_language())
            .collect()
    }

    /// Opaque settings blob stored for `extension_id`.
    pub fn settings(&self, extension_id: &str) -> Option<&Value> {
        self.settings.get(extension_id)
    }

    pub fn store_settings(&mut self, extension_id: &str, settings: Value) {
        self.settings.insert(extension_id.to_string(), settings);
    }

    pub fn all_settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }

    pub fn replace_all_settings(&mut self, settings: BTreeMap<String, Value>) {
        self.settings = settings;
    }

    /// Long description of one registered extension.
    pub fn long_description(&self, extension_id: &str) -> Option<String> {
        let entry = self.entries.get(extension_id)?;
        Some(
            entry
                .extension
                .long_description(entry.resource_root.as_deref()),
        )
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            ids: self.order.clone(),
            roles: self.role_index.clone(),
            enabled: self.enabled.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Shuts every extension down in registration order, then clears all
    /// maps. Returns how many extensions were shut down.
    pub fn shutdown_all(&mut self) -> usize {
        let order = std::mem::take(&mut self.order);
        let mut count = 0;
        for id in &order {
            if let Some(mut entry) = self.entries.remove(id) {
                run_shutdown(id, entry.extension.as_mut());
                self.localization.borrow_mut().forget_extension(id);
                count += 1;
            }
        }
        self.entries.clear();
        self.role_index.clear();
        self.enabled.clear();
        self.settings.clear();
        log::info!("event=registry_shutdown module=registry status=ok count={count}");
        count
    }
}

fn run_shutdown(extension_id: &str, extension: &mut dyn Extension) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| extension.shutdown())) {
        log::error!(
            "event=extension_shutdown module=registry status=error extension_id={} error={}",
            extension_id,
            panic_message(payload.as_ref())
        );
    }
}

/// Registry operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidDescriptor { id: String, error: DescriptorError },
    DuplicateId(String),
    UnknownId(String),
    InitializationRejected { id: String, reason: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDescriptor { id, error } => {
                write!(f, "invalid descriptor for `{id}`: {error}")
            }
            Self::DuplicateId(id) => write!(f, "extension id already registered: {id}"),
            Self::UnknownId(id) => write!(f, "extension id is not registered: {id}"),
            Self::InitializationRejected { id, reason } => {
                write!(f, "extension `{id}` rejected initialization: {reason}")
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDescriptor { error, .. } => Some(error),
            _ => None,
        }
    }
}
