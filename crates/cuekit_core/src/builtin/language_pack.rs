//! German UI language (`builtin.lang.de`).
//!
//! The application texts ship inside the binary. A `locales/de.json` under
//! the resource root, when present, overrides individual keys.

use crate::extension::descriptor::Descriptor;
use crate::extension::roles::{
    register_language, Extension, ExtensionError, InitEnv, LanguageExtension,
};
use crate::i18n::TranslationTable;

pub const GERMAN_LANGUAGE_ID: &str = "builtin.lang.de";

const GERMAN_TEXTS: &[(&str, &str)] = &[
    ("menu.file", "Datei"),
    ("menu.edit", "Bearbeiten"),
    ("menu.view", "Ansicht"),
    ("menu.extensions", "Erweiterungen"),
    ("menu.help", "Hilfe"),
    ("action.open_project", "Projekt öffnen..."),
    ("action.save_project", "Projekt speichern"),
    ("action.export", "Exportieren..."),
    ("action.run_qa", "Qualitätsprüfung starten"),
    ("action.settings", "Einstellungen"),
    ("status.ready", "Bereit"),
    ("status.saved", "Projekt gespeichert"),
    ("status.exported", "{count} Cues exportiert"),
    ("qa.missing_translation", "Übersetzung fehlt"),
    ("qa.text_too_long", "Text zu lang (Lippensynchronität: {ratio}%)"),
    ("qa.double_space", "Doppeltes Leerzeichen im Text"),
    ("qa.missing_character", "Name der Figur fehlt"),
    ("qa.whitespace", "Leerzeichen am Anfang oder Ende"),
    ("extensions.enabled", "Aktiviert"),
    ("extensions.disabled", "Deaktiviert"),
];

pub struct GermanLanguage {
    descriptor: Descriptor,
}

impl Default for GermanLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl GermanLanguage {
    pub fn new() -> Self {
        Self {
            descriptor: Descriptor::new(GERMAN_LANGUAGE_ID, "Deutsch", "1.0.0")
                .with_author("cuekit")
                .with_description("German user interface language")
                .with_icon("🇩🇪"),
        }
    }
}

impl Extension for GermanLanguage {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn initialize(&mut self, env: &InitEnv<'_>) -> Result<(), ExtensionError> {
        if !register_language(&*self, env) {
            return Err(ExtensionError::new(format!(
                "language {} is already registered",
                self.language_code()
            )));
        }
        Ok(())
    }

    fn as_language(&self) -> Option<&dyn LanguageExtension> {
        Some(self)
    }
}

impl LanguageExtension for GermanLanguage {
    fn language_code(&self) -> &str {
        "de"
    }

    fn display_name(&self) -> &str {
        "Deutsch"
    }

    fn english_name(&self) -> &str {
        "German"
    }

    fn flag(&self) -> &str {
        "🇩🇪"
    }

    fn bundled_translations(&self) -> TranslationTable {
        GERMAN_TEXTS
            .iter()
            .map(|(key, text)| (key.to_string(), text.to_string()))
            .collect()
    }
}
