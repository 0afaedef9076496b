//! Host root object: one explicitly constructed owner of every collaborator.
//!
//! # Responsibility
//! - Own the registry, the Context Manager, localization and the settings
//!   store for one host run.
//! - Drive discovery, installation, project/window changes, QA and export
//!   runs, and persistence.
//!
//! # Invariants
//! - Every registered id has exactly one Context, created after its
//!   `initialize()` succeeded and dropped when it leaves the registry.
//! - Calls into extension code made from here are contained with
//!   `catch_unwind`; failures are logged and reported, never propagated.
//! - `teardown()` runs once; later calls are no-ops.
//!
//! # See also
//! - `extension::registry` for lifecycle rules.
//! - `extension::context_manager` for state pushes and dispatch.

use crate::config::HostConfig;
use crate::extension::capability::{Capability, CapabilityGrant};
use crate::extension::catalog::ExtensionCatalog;
use crate::extension::context::{ContextHandle, HostWindow};
use crate::extension::context_manager::ContextManager;
use crate::extension::events::{panic_message, DispatchReport, HostEvent};
use crate::extension::loader::{discover, ExtensionLoader, LoadError, LoadedUnit};
use crate::extension::registry::{ExtensionRegistry, RegistryError};
use crate::extension::roles::{
    ActionContribution, ExportOptions, Extension, ExtensionError, PanelContribution, QaIssue,
};
use crate::i18n::{LocaleCatalog, SharedLocalization};
use crate::model::cue::CueId;
use crate::model::project::SharedProject;
use crate::settings::{SettingsError, SettingsStore};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use uuid::Uuid;

/// UI contributions of one enabled UI extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiContributions {
    pub extension_id: String,
    pub dock_panel: Option<PanelContribution>,
    pub menu_items: Vec<ActionContribution>,
    pub toolbar_items: Vec<ActionContribution>,
}

/// Findings of one QA extension for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaReport {
    pub extension_id: String,
    pub issues: Vec<QaIssue>,
}

pub struct ExtensionHost {
    config: HostConfig,
    session_id: Uuid,
    localization: SharedLocalization,
    registry: ExtensionRegistry,
    contexts: ContextManager,
    store: Box<dyn SettingsStore>,
    catalog: ExtensionCatalog,
    persisted_enabled: BTreeSet<String>,
    torn_down: bool,
}

impl ExtensionHost {
    pub fn new(
        config: HostConfig,
        catalog: ExtensionCatalog,
        store: Box<dyn SettingsStore>,
    ) -> Self {
        Self::with_localization(config, catalog, store, LocaleCatalog::shared())
    }

    /// Builds the host around a caller-supplied localization collaborator.
    ///
    /// An inverted API range is clamped so the minimum equals the current
    /// version.
    pub fn with_localization(
        mut config: HostConfig,
        catalog: ExtensionCatalog,
        store: Box<dyn SettingsStore>,
        localization: SharedLocalization,
    ) -> Self {
        if let Err(err) = config.validate() {
            log::error!("event=host_start module=host status=degraded error={err}");
            config.api_version_min = config.api_version;
        }
        let session_id = Uuid::new_v4();
        log::info!(
            "event=host_start module=host status=ok session_id={session_id} app={} version={} api_min={} api_current={}",
            config.app_name,
            config.app_version,
            config.api_version_min,
            config.api_version
        );
        let mut host = Self {
            contexts: ContextManager::new(config.context_seed(), localization.clone()),
            registry: ExtensionRegistry::new(localization.clone()),
            config,
            session_id,
            localization,
            store,
            catalog,
            persisted_enabled: BTreeSet::new(),
            torn_down: false,
        };
        host.reload_persisted();
        host
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    pub fn localization(&self) -> SharedLocalization {
        self.localization.clone()
    }

    /// Host-side handle to the Context of `extension_id`.
    pub fn context(&self, extension_id: &str) -> Option<ContextHandle> {
        self.contexts.context(extension_id).cloned()
    }

    /// Whether `extension_id` is enabled in the persisted settings.
    pub fn is_persisted_enabled(&self, extension_id: &str) -> bool {
        self.persisted_enabled.contains(extension_id)
    }

    /// Re-reads enabled ids and settings blobs from the store.
    ///
    /// Blobs already held by the registry are newer than the store and stay;
    /// stored blobs only fill ids the registry does not know yet.
    pub fn reload_persisted(&mut self) {
        match self.store.load_enabled() {
            Ok(enabled) => self.persisted_enabled = enabled,
            Err(err) => log::error!(
                "event=settings_load module=host status=error part=enabled error={err}"
            ),
        }
        match self.store.load_settings() {
            Ok(mut merged) => {
                merged.extend(self.registry.all_settings().clone());
                self.registry.replace_all_settings(merged);
            }
            Err(err) => log::error!(
                "event=settings_load module=host status=error part=settings error={err}"
            ),
        }
    }

    // ---- lifecycle ----

    /// Installs a compiled-in extension with no resource root.
    pub fn install(
        &mut self,
        extension: Box<dyn Extension>,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.install_with(extension, enabled, None, &[])
    }

    /// Registers, creates the Context, attaches it and restores settings.
    pub fn install_with(
        &mut self,
        extension: Box<dyn Extension>,
        enabled: bool,
        resource_root: Option<PathBuf>,
        extra_capabilities: &[Capability],
    ) -> Result<(), RegistryError> {
        let id = extension.descriptor().id.clone();
        let name = extension.descriptor().name.clone();
        self.registry
            .register_with_root(extension, enabled, resource_root)?;

        let mut grant = self
            .registry
            .get(&id)
            .map(|entry| CapabilityGrant::for_roles(entry.roles()))
            .unwrap_or_default();
        for capability in extra_capabilities {
            grant = grant.with(*capability, true);
        }
        let context = self.contexts.create_context(&id, &name, grant);
        let stored = self.registry.settings(&id).cloned();
        if let Some(Value::Object(namespace)) = stored.as_ref() {
            context.replace_settings(namespace.clone());
        }

        if let Some(extension) = self.registry.extension_mut(&id) {
            let attached = catch_unwind(AssertUnwindSafe(|| {
                extension.attach_context(context);
                if let Some(settings) = stored.as_ref() {
                    extension.load_settings(settings);
                }
            }));
            if let Err(payload) = attached {
                log::error!(
                    "event=extension_attach module=host status=error extension_id={id} error={}",
                    panic_message(payload.as_ref())
                );
            }
        }
        log::info!(
            "event=extension_install module=host status=ok extension_id={id} grant={:?}",
            grant.granted()
        );
        Ok(())
    }

    /// Keeps the extension's settings, then unregisters it and drops its
    /// Context.
    pub fn uninstall(&mut self, extension_id: &str) -> Result<(), RegistryError> {
        if !self.registry.contains(extension_id) {
            return Err(RegistryError::UnknownId(extension_id.to_string()));
        }
        self.collect_settings_for(extension_id);
        self.registry.unregister(extension_id)?;
        self.contexts.remove_context(extension_id);
        Ok(())
    }

    pub fn enable(&mut self, extension_id: &str) -> Result<(), RegistryError> {
        self.registry.enable(extension_id)
    }

    pub fn disable(&mut self, extension_id: &str) -> bool {
        self.registry.disable(extension_id)
    }

    /// Discovers every configured location and installs each candidate.
    ///
    /// Returns the number of extensions registered by this call.
    pub fn load_all(&mut self) -> usize {
        self.reload_persisted();
        let candidates = discover(&self.config.locations);
        let api = self.config.api_range();
        let mut loaded = 0;

        for candidate in &candidates {
            let path = candidate.manifest_path.display().to_string();
            let unit = ExtensionLoader::new(&self.catalog, api).load(candidate);
            let result = unit.and_then(|unit| self.install_loaded(unit));
            match result {
                Ok(id) => {
                    loaded += 1;
                    log::info!(
                        "event=extension_load module=host status=ok path={path} extension_id={id}"
                    );
                }
                Err(err) => log::error!(
                    "event=extension_load module=host status=error path={path} error={err}"
                ),
            }
        }
        log::info!(
            "event=discovery module=host status=ok candidates={} loaded={loaded}",
            candidates.len()
        );
        loaded
    }

    fn install_loaded(&mut self, unit: LoadedUnit) -> Result<String, LoadError> {
        let LoadedUnit {
            extension,
            resource_root,
            extra_capabilities,
            ..
        } = unit;
        let id = extension.descriptor().id.clone();
        let enabled = self.persisted_enabled.contains(&id);
        self.install_with(extension, enabled, Some(resource_root), &extra_capabilities)?;
        Ok(id)
    }

    // ---- host state ----

    pub fn set_window(&mut self, window: Option<Rc<dyn HostWindow>>) {
        self.contexts.set_window(window);
    }

    pub fn project(&self) -> Option<SharedProject> {
        self.contexts.project()
    }

    /// Makes `project` current, runs UI hooks and fires `ProjectOpened`.
    pub fn open_project(&mut self, project: SharedProject) -> DispatchReport {
        let snapshot = project.borrow().clone();
        self.contexts.set_project(Some(project));
        for ui in self.registry.ui_extensions(true) {
            let id = ui.descriptor().id.clone();
            contain(&id, "on_project_opened", || ui.on_project_opened(&snapshot));
        }
        self.contexts.dispatch(&HostEvent::ProjectOpened {
            title: snapshot.title.clone(),
            path: snapshot.file_path.clone(),
        })
    }

    pub fn close_project(&mut self) -> DispatchReport {
        for ui in self.registry.ui_extensions(true) {
            let id = ui.descriptor().id.clone();
            contain(&id, "on_project_closed", || ui.on_project_closed());
        }
        self.contexts.set_project(None);
        self.contexts.dispatch(&HostEvent::ProjectClosed)
    }

    pub fn select_cue(&self, cue_id: CueId) -> DispatchReport {
        let cue = self
            .contexts
            .project()
            .and_then(|project| project.borrow().cue(cue_id).cloned());
        if let Some(cue) = cue.as_ref() {
            for ui in self.registry.ui_extensions(true) {
                let id = ui.descriptor().id.clone();
                contain(&id, "on_cue_selected", || ui.on_cue_selected(cue));
            }
        }
        self.contexts.dispatch(&HostEvent::CueSelected { cue_id })
    }

    pub fn notify_cue_changed(&self, cue_id: CueId) -> DispatchReport {
        self.contexts.dispatch(&HostEvent::CueChanged { cue_id })
    }

    /// Fires `event` to every Context.
    pub fn dispatch(&self, event: &HostEvent) -> DispatchReport {
        self.contexts.dispatch(event)
    }

    /// Switches the UI language and fires `LanguageChanged`.
    pub fn set_language(&mut self, code: &str) -> bool {
        let switched = self.localization.borrow_mut().set_current_language(code);
        if switched {
            self.contexts.dispatch(&HostEvent::LanguageChanged {
                code: code.to_string(),
            });
        }
        switched
    }

    // ---- role runs ----

    /// Runs every enabled QA extension against the open project.
    pub fn run_qa(&self) -> Vec<QaReport> {
        let Some(project) = self.contexts.project() else {
            log::warn!("event=qa_run module=host status=skipped reason=no_project");
            return Vec::new();
        };
        let snapshot = project.borrow().clone();

        let mut reports = Vec::new();
        for qa in self.registry.qa_extensions(true) {
            let id = qa.descriptor().id.clone();
            self.contexts.dispatch(&HostEvent::QaCheckStarted {
                extension_id: id.clone(),
            });
            let issues = match catch_unwind(AssertUnwindSafe(|| {
                qa.check(&snapshot, &snapshot.cues)
            })) {
                Ok(issues) => issues,
                Err(payload) => {
                    log::error!(
                        "event=qa_run module=host status=error extension_id={id} error={}",
                        panic_message(payload.as_ref())
                    );
                    continue;
                }
            };
            self.contexts.dispatch(&HostEvent::QaCheckFinished {
                extension_id: id.clone(),
                issue_count: issues.len(),
            });
            reports.push(QaReport {
                extension_id: id,
                issues,
            });
        }
        reports
    }

    /// Exports the open project through one enabled export extension.
    pub fn run_export(
        &self,
        extension_id: &str,
        output: &Path,
        options: &ExportOptions,
    ) -> Result<(), ExportRunError> {
        let entry = self
            .registry
            .get(extension_id)
            .ok_or_else(|| ExportRunError::UnknownExtension(extension_id.to_string()))?;
        let exporter = entry
            .extension()
            .as_export()
            .ok_or_else(|| ExportRunError::NotAnExporter(extension_id.to_string()))?;
        if !self.registry.is_enabled(extension_id) {
            return Err(ExportRunError::Disabled(extension_id.to_string()));
        }
        let project = self.contexts.project().ok_or(ExportRunError::NoProject)?;
        let snapshot = project.borrow().clone();

        self.contexts.dispatch(&HostEvent::ExportStarted {
            extension_id: extension_id.to_string(),
            output: output.to_path_buf(),
        });
        let result = match catch_unwind(AssertUnwindSafe(|| {
            exporter.export(output, &snapshot, &snapshot.cues, options)
        })) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ExportRunError::Failed(err)),
            Err(payload) => Err(ExportRunError::Panicked(panic_message(payload.as_ref()))),
        };
        self.contexts.dispatch(&HostEvent::ExportFinished {
            extension_id: extension_id.to_string(),
            output: output.to_path_buf(),
            success: result.is_ok(),
        });
        match &result {
            Ok(()) => log::info!(
                "event=export_run module=host status=ok extension_id={extension_id} output={}",
                output.display()
            ),
            Err(err) => log::error!(
                "event=export_run module=host status=error extension_id={extension_id} error={err}"
            ),
        }
        result
    }

    /// Panels and actions of every enabled UI extension, in registration
    /// order.
    pub fn ui_contributions(&self) -> Vec<UiContributions> {
        let mut contributions = Vec::new();
        for ui in self.registry.ui_extensions(true) {
            let id = ui.descriptor().id.clone();
            let collected = catch_unwind(AssertUnwindSafe(|| UiContributions {
                extension_id: id.clone(),
                dock_panel: ui.dock_panel(),
                menu_items: ui.menu_items(),
                toolbar_items: ui.toolbar_items(),
            }));
            match collected {
                Ok(collected) => contributions.push(collected),
                Err(payload) => log::error!(
                    "event=ui_contributions module=host status=error extension_id={id} error={}",
                    panic_message(payload.as_ref())
                ),
            }
        }
        contributions
    }

    pub fn long_description(&self, extension_id: &str) -> Option<String> {
        self.registry.long_description(extension_id)
    }

    // ---- persistence ----

    fn collect_settings_for(&mut self, extension_id: &str) {
        let Some(context) = self.contexts.context(extension_id) else {
            return;
        };
        let mut blob: Map<String, Value> = context.settings_snapshot();
        let saved = self.registry.get(extension_id).and_then(|entry| {
            catch_unwind(AssertUnwindSafe(|| entry.extension().save_settings())).unwrap_or_else(
                |payload| {
                    log::error!(
                        "event=settings_collect module=host status=error extension_id={extension_id} error={}",
                        panic_message(payload.as_ref())
                    );
                    None
                },
            )
        });
        let value = match saved {
            Some(Value::Object(own)) => {
                blob.extend(own);
                Value::Object(blob)
            }
            Some(other) if blob.is_empty() => other,
            Some(_) | None => Value::Object(blob),
        };
        self.registry.store_settings(extension_id, value);
    }

    /// Enabled ids to persist: this run's registry state, plus persisted ids
    /// of extensions that did not load this run.
    fn enabled_to_persist(&self) -> BTreeSet<String> {
        let mut enabled: BTreeSet<String> = self
            .persisted_enabled
            .iter()
            .filter(|id| !self.registry.contains(id))
            .cloned()
            .collect();
        enabled.extend(self.registry.enabled_ids().iter().cloned());
        enabled
    }

    /// Writes enabled ids and every settings blob to the store.
    pub fn save_settings(&mut self) -> Result<(), SettingsError> {
        let ids: Vec<String> = self.registry.ids().to_vec();
        for id in &ids {
            self.collect_settings_for(id);
        }
        let enabled = self.enabled_to_persist();
        let settings: BTreeMap<String, Value> = self.registry.all_settings().clone();
        self.store.save_enabled(&enabled)?;
        self.store.save_settings(&settings)?;
        self.persisted_enabled = enabled;
        log::info!(
            "event=settings_save module=host status=ok enabled={} blobs={}",
            self.persisted_enabled.len(),
            settings.len()
        );
        Ok(())
    }

    /// Saves settings, drops every Context and shuts every extension down.
    ///
    /// Returns `false` when the host was already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        if let Err(err) = self.save_settings() {
            log::error!("event=host_teardown module=host status=degraded error={err}");
        }
        self.contexts.clear();
        let count = self.registry.shutdown_all();
        log::info!(
            "event=host_teardown module=host status=ok session_id={} shut_down={count}",
            self.session_id
        );
        true
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for ExtensionHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Runs one extension hook, logging a panic instead of unwinding further.
fn contain(extension_id: &str, hook: &str, call: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(call)) {
        log::error!(
            "event=extension_hook module=host status=error extension_id={extension_id} hook={hook} error={}",
            panic_message(payload.as_ref())
        );
    }
}

/// Why an export run did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRunError {
    UnknownExtension(String),
    NotAnExporter(String),
    Disabled(String),
    NoProject,
    Failed(ExtensionError),
    Panicked(String),
}

impl Display for ExportRunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownExtension(id) => write!(f, "extension is not registered: {id}"),
            Self::NotAnExporter(id) => write!(f, "extension does not export: {id}"),
            Self::Disabled(id) => write!(f, "extension is disabled: {id}"),
            Self::NoProject => write!(f, "no project is open"),
            Self::Failed(err) => write!(f, "export failed: {err}"),
            Self::Panicked(message) => write!(f, "export panicked: {message}"),
        }
    }
}

impl Error for ExportRunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}
