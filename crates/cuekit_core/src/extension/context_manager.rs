//! Context Manager: owns every Context of one host run.
//!
//! # Responsibility
//! - Create and drop Contexts as extensions enter and leave the registry.
//! - Push the current window and project into every Context.
//! - Be the single entry point that fires events to all Contexts.
//!
//! # Invariants
//! - One Context per registered id; iteration follows creation order.
//! - A newly created Context starts with the current window and project.

use crate::extension::capability::CapabilityGrant;
use crate::extension::context::{ContextHandle, ContextSeed, HostWindow};
use crate::extension::events::{DispatchReport, HostEvent};
use crate::i18n::SharedLocalization;
use crate::model::project::SharedProject;
use std::collections::BTreeMap;
use std::rc::Rc;

pub struct ContextManager {
    seed: ContextSeed,
    localization: SharedLocalization,
    contexts: BTreeMap<String, ContextHandle>,
    order: Vec<String>,
    window: Option<Rc<dyn HostWindow>>,
    project: Option<SharedProject>,
}

impl ContextManager {
    pub fn new(seed: ContextSeed, localization: SharedLocalization) -> Self {
        Self {
            seed,
            localization,
            contexts: BTreeMap::new(),
            order: Vec::new(),
            window: None,
            project: None,
        }
    }

    pub fn seed(&self) -> &ContextSeed {
        &self.seed
    }

    /// Creates the Context for `extension_id`, replacing a stale one.
    pub fn create_context(
        &mut self,
        extension_id: &str,
        extension_name: &str,
        grant: CapabilityGrant,
    ) -> ContextHandle {
        if self.contexts.contains_key(extension_id) {
            log::warn!(
                "event=context_create module=context_manager status=replaced extension_id={extension_id}"
            );
            self.remove_context(extension_id);
        }
        let context = ContextHandle::new(
            extension_id,
            extension_name,
            grant,
            self.seed.clone(),
            self.localization.clone(),
        );
        context.set_window(self.window.clone());
        context.set_project(self.project.clone());
        self.contexts
            .insert(extension_id.to_string(), context.clone());
        self.order.push(extension_id.to_string());
        log::debug!(
            "event=context_create module=context_manager status=ok extension_id={extension_id}"
        );
        context
    }

    /// Drops the Context of `extension_id` and detaches it from host state.
    pub fn remove_context(&mut self, extension_id: &str) -> Option<ContextHandle> {
        let context = self.contexts.remove(extension_id)?;
        self.order.retain(|id| id != extension_id);
        context.detach();
        Some(context)
    }

    pub fn context(&self, extension_id: &str) -> Option<&ContextHandle> {
        self.contexts.get(extension_id)
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn window(&self) -> Option<Rc<dyn HostWindow>> {
        self.window.clone()
    }

    pub fn set_window(&mut self, window: Option<Rc<dyn HostWindow>>) {
        self.window = window;
        for context in self.contexts.values() {
            context.set_window(self.window.clone());
        }
    }

    pub fn project(&self) -> Option<SharedProject> {
        self.project.clone()
    }

    pub fn set_project(&mut self, project: Option<SharedProject>) {
        self.project = project;
        for context in self.contexts.values() {
            context.set_project(self.project.clone());
        }
    }

    /// Fires `event` to every Context in creation order.
    pub fn dispatch(&self, event: &HostEvent) -> DispatchReport {
        let targets: Vec<ContextHandle> = self
            .order
            .iter()
            .filter_map(|id| self.contexts.get(id).cloned())
            .collect();
        let mut report = DispatchReport::default();
        for context in targets {
            report.merge(context.dispatch(event));
        }
        if !report.is_clean() {
            log::warn!(
                "event=dispatch module=context_manager status=partial kind={} invoked={} failures={}",
                event.kind(),
                report.invoked,
                report.failures.len()
            );
        }
        report
    }

    /// Detaches and drops every Context.
    pub fn clear(&mut self) {
        for context in self.contexts.values() {
            context.detach();
        }
        self.contexts.clear();
        self.order.clear();
    }
}
