//! Machine translation extension (`builtin.translator`).
//!
//! # Responsibility
//! - Offer a Translation service backed by a pluggable [`TranslationBackend`].
//! - Contribute a translator panel and pre-translate the selected cue.
//!
//! # Invariants
//! - A missing or unavailable backend never blocks registration; the service
//!   then reports itself unavailable and every translation fails cleanly.

use crate::builtin::glossary::SharedGlossary;
use crate::extension::context::ContextHandle;
use crate::extension::descriptor::Descriptor;
use crate::extension::roles::{
    translation_service_name, ActionContribution, DockArea, Extension, ExtensionError, InitEnv,
    LanguagePair, PanelContribution, ServiceExtension, TranslationExtension, UiExtension,
};
use crate::model::cue::Cue;
use serde_json::{json, Value};
use std::cell::RefCell;

pub const TRANSLATOR_ID: &str = "builtin.translator";

/// Engine that turns text from one language into another.
pub trait TranslationBackend {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, ExtensionError>;

    fn supported_languages(&self) -> Vec<LanguagePair>;
}

/// Placeholder used until a real engine is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredBackend;

impl TranslationBackend for UnconfiguredBackend {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn translate(
        &self,
        _text: &str,
        _source: &str,
        _target: &str,
    ) -> Result<String, ExtensionError> {
        Err(ExtensionError::new("no translation backend is configured"))
    }

    fn supported_languages(&self) -> Vec<LanguagePair> {
        Vec::new()
    }
}

/// Offline backend answering whole-text lookups from the user glossary.
pub struct GlossaryBackend {
    glossary: SharedGlossary,
}

impl GlossaryBackend {
    pub fn new(glossary: SharedGlossary) -> Self {
        Self { glossary }
    }
}

impl TranslationBackend for GlossaryBackend {
    fn name(&self) -> &str {
        "glossary"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, ExtensionError> {
        let glossary = self.glossary.borrow();
        let found = if source == glossary.source_lang && target == glossary.target_lang {
            glossary.find_translation(text).map(str::to_string)
        } else if source == glossary.target_lang && target == glossary.source_lang {
            let wanted = text.trim().to_lowercase();
            glossary
                .entries
                .iter()
                .find(|entry| entry.target.trim().to_lowercase() == wanted)
                .map(|entry| entry.source.clone())
        } else {
            return Err(ExtensionError::new(format!(
                "unsupported language pair {source} -> {target}"
            )));
        };
        found.ok_or_else(|| ExtensionError::new(format!("no glossary entry for {text:?}")))
    }

    fn supported_languages(&self) -> Vec<LanguagePair> {
        let glossary = self.glossary.borrow();
        vec![
            LanguagePair {
                source: glossary.source_lang.clone(),
                target: glossary.target_lang.clone(),
                display_name: format!("{} → {}", glossary.source_lang, glossary.target_lang),
            },
            LanguagePair {
                source: glossary.target_lang.clone(),
                target: glossary.source_lang.clone(),
                display_name: format!("{} → {}", glossary.target_lang, glossary.source_lang),
            },
        ]
    }
}

pub struct Translator {
    descriptor: Descriptor,
    backend: Box<dyn TranslationBackend>,
    source_lang: String,
    target_lang: String,
    context: Option<ContextHandle>,
    last_translation: RefCell<Option<String>>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Self::with_backend(Box::new(UnconfiguredBackend))
    }

    pub fn with_backend(backend: Box<dyn TranslationBackend>) -> Self {
        Self {
            descriptor: Descriptor::new(TRANSLATOR_ID, "Translator", "1.0.0")
                .with_author("cuekit")
                .with_description("Translate cue text through a configurable engine")
                .with_icon("🌍")
                .with_readme("README.md"),
            backend,
            source_lang: "en".to_string(),
            target_lang: "hu".to_string(),
            context: None,
            last_translation: RefCell::new(None),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Current `(source, target)` direction.
    pub fn direction(&self) -> (&str, &str) {
        (self.source_lang.as_str(), self.target_lang.as_str())
    }

    pub fn swap_languages(&mut self) {
        std::mem::swap(&mut self.source_lang, &mut self.target_lang);
    }

    /// Translation produced for the most recently selected cue.
    pub fn last_translation(&self) -> Option<String> {
        self.last_translation.borrow().clone()
    }
}

impl Extension for Translator {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn initialize(&mut self, env: &InitEnv<'_>) -> Result<(), ExtensionError> {
        if !self.backend.is_available() {
            log::warn!(
                "event=translator_init module=translator status=degraded extension_id={} backend={}",
                env.extension_id(),
                self.backend.name()
            );
        }
        Ok(())
    }

    fn attach_context(&mut self, context: ContextHandle) {
        self.context = Some(context);
    }

    fn load_settings(&mut self, settings: &Value) {
        if let Some(source) = settings.get("source_lang").and_then(Value::as_str) {
            self.source_lang = source.to_string();
        }
        if let Some(target) = settings.get("target_lang").and_then(Value::as_str) {
            self.target_lang = target.to_string();
        }
    }

    fn save_settings(&self) -> Option<Value> {
        Some(json!({
            "source_lang": self.source_lang,
            "target_lang": self.target_lang,
        }))
    }

    fn settings_panel(&self) -> Option<PanelContribution> {
        Some(PanelContribution {
            id: "translatorSettings".to_string(),
            title: "Translator".to_string(),
            area: DockArea::Right,
        })
    }

    fn as_ui(&self) -> Option<&dyn UiExtension> {
        Some(self)
    }

    fn as_translation(&self) -> Option<&dyn TranslationExtension> {
        Some(self)
    }
}

impl ServiceExtension for Translator {
    fn service_name(&self) -> String {
        translation_service_name(&self.descriptor)
    }

    fn is_available(&self) -> bool {
        self.backend.is_available()
    }
}

impl TranslationExtension for Translator {
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ExtensionError> {
        self.backend.translate(text, source_lang, target_lang)
    }

    fn supported_languages(&self) -> Vec<LanguagePair> {
        self.backend.supported_languages()
    }
}

impl UiExtension for Translator {
    fn dock_panel(&self) -> Option<PanelContribution> {
        Some(PanelContribution {
            id: "translatorDock".to_string(),
            title: "Translator".to_string(),
            area: DockArea::Right,
        })
    }

    fn menu_items(&self) -> Vec<ActionContribution> {
        vec![ActionContribution::new("translator.toggle_panel", "Translator Panel").checkable()]
    }

    fn on_cue_selected(&self, cue: &Cue) {
        *self.last_translation.borrow_mut() = None;
        if cue.source_text.trim().is_empty() || !self.backend.is_available() {
            return;
        }
        match self.translate(&cue.source_text, &self.source_lang, &self.target_lang) {
            Ok(translated) => *self.last_translation.borrow_mut() = Some(translated),
            Err(err) => {
                if let Some(context) = self.context.as_ref() {
                    context.log_warning(format!("cue {}: {err}", cue.id));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GlossaryBackend, TranslationBackend, Translator, UnconfiguredBackend};
    use crate::extension::roles::Extension;
    use serde_json::json;
    use crate::builtin::glossary::{Glossary, GlossaryEntry};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn backend() -> GlossaryBackend {
        let mut glossary = Glossary::new();
        glossary.upsert(GlossaryEntry::new("Good morning", "Jó reggelt"));
        GlossaryBackend::new(Rc::new(RefCell::new(glossary)))
    }

    #[test]
    fn glossary_backend_translates_both_directions() {
        let backend = backend();
        assert_eq!(
            backend.translate("good morning", "en", "hu").expect("forward"),
            "Jó reggelt"
        );
        assert_eq!(
            backend.translate("Jó reggelt", "hu", "en").expect("reverse"),
            "Good morning"
        );
        assert_eq!(backend.supported_languages().len(), 2);
    }

    #[test]
    fn glossary_backend_reports_misses_and_foreign_pairs() {
        let backend = backend();
        let miss = backend.translate("Good night", "en", "hu").expect_err("miss");
        assert!(miss.message().contains("no glossary entry"));
        let pair = backend.translate("Hallo", "de", "hu").expect_err("pair");
        assert!(pair.message().contains("unsupported language pair"));
    }

    #[test]
    fn unconfigured_backend_is_unavailable() {
        assert!(!UnconfiguredBackend.is_available());
        assert!(UnconfiguredBackend.translate("x", "en", "hu").is_err());
    }

    #[test]
    fn direction_swaps_and_persists() {
        let mut translator = Translator::new();
        translator.swap_languages();
        assert_eq!(translator.direction(), ("hu", "en"));
        assert_eq!(
            translator.save_settings(),
            Some(json!({"source_lang": "hu", "target_lang": "en"}))
        );

        let mut restored = Translator::new();
        restored.load_settings(&json!({"source_lang": "de"}));
        assert_eq!(restored.direction(), ("de", "hu"));
        assert_eq!(restored.backend_name(), "unconfigured");
    }
}
