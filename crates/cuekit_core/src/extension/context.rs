//! Per-extension Context: the capability-gated view of host state.
//!
//! # Responsibility
//! - Expose project/cue accessors, a private settings namespace, scoped
//!   logging and a UI surface to exactly one extension.
//! - Hold that extension's event subscriptions and run dispatch with
//!   per-handler failure isolation.
//!
//! # Invariants
//! - A denied capability never raises: the call logs one journal entry and
//!   returns an absent/`false` result.
//! - With `can_show_ui` cleared (or no window), message/status calls never
//!   touch the window and write exactly one journal entry.
//! - Subscribing the same handler twice for one kind is a no-op.
//! - Handlers run in subscription order; a failing handler does not stop the
//!   remaining ones.
//!
//! # See also
//! - `extension::context_manager` for the host side that pushes state in.

use crate::extension::capability::{Capability, CapabilityGrant};
use crate::extension::events::{
    panic_message, DispatchReport, EventHandler, HandlerFailure, HostEvent, HostEventKind,
};
use crate::i18n::{format_text, SharedLocalization};
use crate::model::cue::{Cue, CueId, CueStatus};
use crate::model::project::SharedProject;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::rc::Rc;

/// Default number of journal entries a Context keeps.
pub const DEFAULT_JOURNAL_LIMIT: usize = 1000;

/// Opaque host window collaborator.
pub trait HostWindow {
    fn show_message(&self, title: &str, message: &str, level: MessageLevel);

    fn show_status(&self, message: &str, timeout_ms: u32);
}

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

impl MessageLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    fn log_level(self) -> log::Level {
        match self {
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

/// Host API version window exposed to extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionRange {
    pub minimum: u32,
    pub current: u32,
}

impl Default for ApiVersionRange {
    fn default() -> Self {
        Self {
            minimum: 1,
            current: 1,
        }
    }
}

impl ApiVersionRange {
    /// `minimum <= version <= current`.
    pub fn is_compatible(&self, version: u32) -> bool {
        self.minimum <= version && version <= self.current
    }
}

/// Host-wide values every new Context starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSeed {
    pub app_name: String,
    pub app_version: String,
    pub api: ApiVersionRange,
    pub journal_limit: usize,
}

impl Default for ContextSeed {
    fn default() -> Self {
        Self {
            app_name: crate::APP_NAME.to_string(),
            app_version: crate::APP_VERSION.to_string(),
            api: ApiVersionRange::default(),
            journal_limit: DEFAULT_JOURNAL_LIMIT,
        }
    }
}

/// One entry an extension produced through its Context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLogEntry {
    pub level: log::Level,
    pub message: String,
}

/// Context state. Only reachable through a [`ContextHandle`].
pub struct ExtensionContext {
    extension_id: String,
    extension_name: String,
    grant: CapabilityGrant,
    seed: ContextSeed,
    localization: SharedLocalization,
    window: Option<Rc<dyn HostWindow>>,
    project: Option<SharedProject>,
    settings: Map<String, Value>,
    subscriptions: BTreeMap<HostEventKind, Vec<EventHandler>>,
    journal: VecDeque<ContextLogEntry>,
}

/// Shared handle to one extension's Context.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Rc<RefCell<ExtensionContext>>,
}

impl ContextHandle {
    pub(crate) fn new(
        extension_id: impl Into<String>,
        extension_name: impl Into<String>,
        grant: CapabilityGrant,
        seed: ContextSeed,
        localization: SharedLocalization,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ExtensionContext {
                extension_id: extension_id.into(),
                extension_name: extension_name.into(),
                grant,
                seed,
                localization,
                window: None,
                project: None,
                settings: Map::new(),
                subscriptions: BTreeMap::new(),
                journal: VecDeque::new(),
            })),
        }
    }

    pub fn extension_id(&self) -> String {
        self.inner.borrow().extension_id.clone()
    }

    pub fn extension_name(&self) -> String {
        self.inner.borrow().extension_name.clone()
    }

    pub fn grant(&self) -> CapabilityGrant {
        self.inner.borrow().grant
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.inner.borrow().grant.allows(capability)
    }

    pub fn api_version(&self) -> ApiVersionRange {
        self.inner.borrow().seed.api
    }

    pub fn is_compatible(&self, version: u32) -> bool {
        self.api_version().is_compatible(version)
    }

    pub fn app_name(&self) -> String {
        self.inner.borrow().seed.app_name.clone()
    }

    pub fn app_version(&self) -> String {
        self.inner.borrow().seed.app_version.clone()
    }

    pub fn app_language(&self) -> String {
        let localization = self.inner.borrow().localization.clone();
        let language = localization.borrow().current_language();
        language
    }

    /// Extension-scoped text lookup; returns `key` when nothing matches.
    pub fn tr(&self, key: &str) -> String {
        let (id, localization) = {
            let context = self.inner.borrow();
            (context.extension_id.clone(), context.localization.clone())
        };
        let text = localization.borrow().extension_text(&id, key);
        text.unwrap_or_else(|| key.to_string())
    }

    /// [`Self::tr`] with `{name}` placeholders filled from `args`.
    pub fn tr_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        format_text(&self.tr(key), args)
    }

    // ---- scoped logging ----

    pub fn log(&self, level: log::Level, message: impl Into<String>) {
        let message = message.into();
        let mut context = self.inner.borrow_mut();
        log::log!(
            level,
            "event=extension_log module=context status=ok extension_id={} message={}",
            context.extension_id,
            message
        );
        context.push_journal(level, message);
    }

    pub fn log_debug(&self, message: impl Into<String>) {
        self.log(log::Level::Debug, message);
    }

    pub fn log_info(&self, message: impl Into<String>) {
        self.log(log::Level::Info, message);
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        self.log(log::Level::Warn, message);
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.log(log::Level::Error, message);
    }

    /// Entries written through this Context, oldest first.
    pub fn journal(&self) -> Vec<ContextLogEntry> {
        self.inner.borrow().journal.iter().cloned().collect()
    }

    // ---- UI surface ----

    /// Window handle, absent without `can_show_ui`.
    pub fn window(&self) -> Option<Rc<dyn HostWindow>> {
        let mut context = self.inner.borrow_mut();
        if !context.grant.can_show_ui {
            context.deny(Capability::ShowUi, "window");
            return None;
        }
        context.window.clone()
    }

    /// Shows a message box, or writes one journal entry when the window is
    /// unavailable. Returns whether the window displayed it.
    pub fn show_message(&self, title: &str, message: &str, level: MessageLevel) -> bool {
        let window = {
            let context = self.inner.borrow();
            if context.grant.can_show_ui {
                context.window.clone()
            } else {
                None
            }
        };
        match window {
            Some(window) => {
                window.show_message(title, message, level);
                true
            }
            None => {
                self.log(
                    level.log_level(),
                    format!("[{}] {}: {}", level.as_str(), title, message),
                );
                false
            }
        }
    }

    /// Shows a status bar message, or writes one journal entry.
    pub fn show_status(&self, message: &str, timeout_ms: u32) -> bool {
        let window = {
            let context = self.inner.borrow();
            if context.grant.can_show_ui {
                context.window.clone()
            } else {
                None
            }
        };
        match window {
            Some(window) => {
                window.show_status(message, timeout_ms);
                true
            }
            None => {
                self.log(log::Level::Info, format!("[STATUS] {message}"));
                false
            }
        }
    }

    // ---- project / cue accessors ----

    fn readable_project(&self, operation: &str) -> Option<SharedProject> {
        let mut context = self.inner.borrow_mut();
        if !context.grant.can_access_project {
            context.deny(Capability::AccessProject, operation);
            return None;
        }
        context.project.clone()
    }

    pub fn has_project(&self) -> bool {
        self.readable_project("has_project").is_some()
    }

    pub fn project_title(&self) -> Option<String> {
        self.readable_project("project_title")
            .map(|project| project.borrow().title.clone())
    }

    pub fn project_path(&self) -> Option<PathBuf> {
        self.readable_project("project_path")
            .and_then(|project| project.borrow().file_path.clone())
    }

    pub fn video_path(&self) -> Option<PathBuf> {
        self.readable_project("video_path")
            .and_then(|project| project.borrow().video_path.clone())
    }

    pub fn source_language(&self) -> Option<String> {
        self.readable_project("source_language")
            .map(|project| project.borrow().source_language.clone())
    }

    pub fn target_language(&self) -> Option<String> {
        self.readable_project("target_language")
            .map(|project| project.borrow().target_language.clone())
    }

    pub fn frame_rate(&self) -> Option<f64> {
        self.readable_project("frame_rate")
            .map(|project| project.borrow().frame_rate)
    }

    /// Number of cues; 0 without a project.
    pub fn cue_count(&self) -> usize {
        self.readable_project("cue_count")
            .map(|project| project.borrow().cues.len())
            .unwrap_or(0)
    }

    pub fn cue(&self, cue_id: CueId) -> Option<Cue> {
        self.readable_project("cue")
            .and_then(|project| project.borrow().cue(cue_id).cloned())
    }

    /// Cue at a zero-based display position.
    pub fn cue_at(&self, position: usize) -> Option<Cue> {
        self.readable_project("cue_at")
            .and_then(|project| project.borrow().cues.get(position).cloned())
    }

    /// Live cursor over the current cue list.
    ///
    /// Each step reads whatever project is current at that moment.
    pub fn iter_cues(&self) -> CueCursor {
        let allowed = {
            let mut context = self.inner.borrow_mut();
            if !context.grant.can_access_project {
                context.deny(Capability::AccessProject, "iter_cues");
            }
            context.grant.can_access_project
        };
        CueCursor {
            context: Rc::clone(&self.inner),
            position: 0,
            allowed,
        }
    }

    /// Writes a translation. Requires `can_modify_cues`.
    pub fn set_cue_translation(&self, cue_id: CueId, text: &str) -> bool {
        let project = {
            let mut context = self.inner.borrow_mut();
            if !context.grant.can_modify_cues {
                context.deny(Capability::ModifyCues, "set_cue_translation");
                return false;
            }
            context.project.clone()
        };
        let Some(project) = project else {
            return false;
        };
        let mut project = project.borrow_mut();
        match project.cue_mut(cue_id) {
            Some(cue) => {
                cue.translated_text = text.to_string();
                if cue.status == CueStatus::New && !text.trim().is_empty() {
                    cue.status = CueStatus::Translated;
                }
                true
            }
            None => false,
        }
    }

    // ---- settings namespace ----

    pub fn setting(&self, key: &str) -> Option<Value> {
        let mut context = self.inner.borrow_mut();
        if !context.grant.can_access_settings {
            context.deny(Capability::AccessSettings, "setting");
            return None;
        }
        context.settings.get(key).cloned()
    }

    pub fn set_setting(&self, key: impl Into<String>, value: Value) -> bool {
        let mut context = self.inner.borrow_mut();
        if !context.grant.can_access_settings {
            context.deny(Capability::AccessSettings, "set_setting");
            return false;
        }
        context.settings.insert(key.into(), value);
        true
    }

    pub fn remove_setting(&self, key: &str) -> bool {
        let mut context = self.inner.borrow_mut();
        if !context.grant.can_access_settings {
            context.deny(Capability::AccessSettings, "remove_setting");
            return false;
        }
        context.settings.remove(key).is_some()
    }

    // ---- events ----

    /// Subscribes `handler` to `kind`. Returns `false` if it was already
    /// subscribed (same `Rc`).
    pub fn subscribe(&self, kind: HostEventKind, handler: EventHandler) -> bool {
        let mut context = self.inner.borrow_mut();
        let handlers = context.subscriptions.entry(kind).or_default();
        if handlers.iter().any(|existing| Rc::ptr_eq(existing, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Removes `handler` from `kind`. Returns whether it was subscribed.
    pub fn unsubscribe(&self, kind: HostEventKind, handler: &EventHandler) -> bool {
        let mut context = self.inner.borrow_mut();
        let Some(handlers) = context.subscriptions.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|existing| !Rc::ptr_eq(existing, handler));
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            context.subscriptions.remove(&kind);
        }
        removed
    }

    pub fn subscriber_count(&self, kind: HostEventKind) -> usize {
        self.inner
            .borrow()
            .subscriptions
            .get(&kind)
            .map_or(0, Vec::len)
    }

    // ---- host side ----

    pub(crate) fn set_window(&self, window: Option<Rc<dyn HostWindow>>) {
        self.inner.borrow_mut().window = window;
    }

    pub(crate) fn set_project(&self, project: Option<SharedProject>) {
        self.inner.borrow_mut().project = project;
    }

    pub(crate) fn replace_settings(&self, settings: Map<String, Value>) {
        self.inner.borrow_mut().settings = settings;
    }

    /// Settings namespace as the host persists it, regardless of grant.
    pub(crate) fn settings_snapshot(&self) -> Map<String, Value> {
        self.inner.borrow().settings.clone()
    }

    /// Drops subscriptions and host references once the extension is gone.
    pub(crate) fn detach(&self) {
        let mut context = self.inner.borrow_mut();
        context.subscriptions.clear();
        context.window = None;
        context.project = None;
    }

    /// Runs every handler subscribed to the event's kind.
    ///
    /// Handlers may call back into this Context; no borrow is held while
    /// they run.
    pub(crate) fn dispatch(&self, event: &HostEvent) -> DispatchReport {
        let kind = event.kind();
        let (extension_id, handlers) = {
            let context = self.inner.borrow();
            (
                context.extension_id.clone(),
                context.subscriptions.get(&kind).cloned().unwrap_or_default(),
            )
        };

        let mut report = DispatchReport::default();
        for (position, handler) in handlers.iter().enumerate() {
            report.invoked += 1;
            let failure = match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some((err.message().to_string(), false)),
                Err(payload) => Some((panic_message(payload.as_ref()), true)),
            };
            if let Some((message, panicked)) = failure {
                log::error!(
                    "event=handler_failed module=context status=error extension_id={} kind={} position={} panicked={} error={}",
                    extension_id,
                    kind,
                    position,
                    panicked,
                    message
                );
                self.inner.borrow_mut().push_journal(
                    log::Level::Error,
                    format!("handler for {kind} failed: {message}"),
                );
                report.failures.push(HandlerFailure {
                    extension_id: extension_id.clone(),
                    kind,
                    position,
                    message,
                    panicked,
                });
            }
        }
        report
    }
}

impl ExtensionContext {
    fn push_journal(&mut self, level: log::Level, message: String) {
        if self.seed.journal_limit == 0 {
            return;
        }
        while self.journal.len() >= self.seed.journal_limit {
            self.journal.pop_front();
        }
        self.journal.push_back(ContextLogEntry { level, message });
    }

    fn deny(&mut self, capability: Capability, operation: &str) {
        log::warn!(
            "event=capability_denied module=context status=skipped extension_id={} capability={} operation={}",
            self.extension_id,
            capability.as_str(),
            operation
        );
        self.push_journal(
            log::Level::Warn,
            format!("capability denied: {} ({operation})", capability.as_str()),
        );
    }
}

/// Live cue cursor returned by [`ContextHandle::iter_cues`].
pub struct CueCursor {
    context: Rc<RefCell<ExtensionContext>>,
    position: usize,
    allowed: bool,
}

impl Iterator for CueCursor {
    type Item = Cue;

    fn next(&mut self) -> Option<Cue> {
        if !self.allowed {
            return None;
        }
        let project = self.context.borrow().project.clone()?;
        let cue = project.borrow().cues.get(self.position).cloned()?;
        self.position += 1;
        Some(cue)
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiVersionRange, ContextHandle, ContextSeed};
    use crate::extension::capability::CapabilityGrant;
    use crate::i18n::LocaleCatalog;

    fn context(grant: CapabilityGrant, journal_limit: usize) -> ContextHandle {
        let seed = ContextSeed {
            journal_limit,
            ..ContextSeed::default()
        };
        ContextHandle::new("test", "Test", grant, seed, LocaleCatalog::shared())
    }

    #[test]
    fn api_range_boundaries_are_inclusive() {
        let range = ApiVersionRange {
            minimum: 2,
            current: 4,
        };
        assert!(!range.is_compatible(1));
        assert!(range.is_compatible(2));
        assert!(range.is_compatible(4));
        assert!(!range.is_compatible(5));
    }

    #[test]
    fn journal_is_bounded() {
        let context = context(CapabilityGrant::default(), 2);
        context.log_info("one");
        context.log_info("two");
        context.log_info("three");
        let messages: Vec<String> = context
            .journal()
            .into_iter()
            .map(|entry| entry.message)
            .collect();
        assert_eq!(messages, vec!["two".to_string(), "three".to_string()]);
    }

    #[test]
    fn tr_returns_key_when_missing() {
        let context = context(CapabilityGrant::default(), 10);
        assert_eq!(context.tr("menu.run"), "menu.run");
    }

    #[test]
    fn denied_settings_write_is_journaled() {
        let context = context(CapabilityGrant::none(), 10);
        assert!(!context.set_setting("k", serde_json::json!(1)));
        assert_eq!(context.journal().len(), 1);
    }
}
