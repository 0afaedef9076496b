//! CSV export extension (`builtin.export.csv`).
//!
//! Writes one header row plus one row per cue. Column selection and the
//! delimiter come from export options, falling back to the extension's own
//! stored defaults and then to the built-in defaults.

use crate::extension::context::ContextHandle;
use crate::extension::descriptor::Descriptor;
use crate::extension::roles::{
    ActionContribution, DockArea, ExportExtension, ExportOptions, Extension, ExtensionError,
    PanelContribution, UiExtension,
};
use crate::model::cue::{format_timecode, Cue};
use crate::model::project::Project;
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CSV_EXPORT_ID: &str = "builtin.export.csv";
const DEFAULT_DELIMITER: char = ';';
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Resolved column and delimiter choices for one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: char,
    pub include_timecodes: bool,
    pub include_character: bool,
    pub include_source: bool,
    pub include_notes: bool,
    pub include_sfx: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            include_timecodes: true,
            include_character: true,
            include_source: true,
            include_notes: true,
            include_sfx: true,
        }
    }
}

impl CsvOptions {
    /// Overlays the keys present in `options` onto `self`.
    pub fn merged(mut self, options: &Map<String, Value>) -> Result<Self, ExtensionError> {
        if let Some(value) = options.get("delimiter") {
            let raw = value
                .as_str()
                .ok_or_else(|| ExtensionError::new("delimiter must be a string"))?;
            let mut chars = raw.chars();
            self.delimiter = match (chars.next(), chars.next()) {
                (Some(delimiter), None) if !matches!(delimiter, '"' | '\r' | '\n') => delimiter,
                _ => {
                    return Err(ExtensionError::new(format!(
                        "delimiter must be one character other than quote or newline, got {raw:?}"
                    )))
                }
            };
        }
        let flags = [
            ("include_timecodes", &mut self.include_timecodes),
            ("include_character", &mut self.include_character),
            ("include_source", &mut self.include_source),
            ("include_notes", &mut self.include_notes),
            ("include_sfx", &mut self.include_sfx),
        ];
        for (key, flag) in flags {
            if let Some(value) = options.get(key) {
                *flag = value
                    .as_bool()
                    .ok_or_else(|| ExtensionError::new(format!("{key} must be a boolean")))?;
            }
        }
        Ok(self)
    }

    fn to_json(self) -> Value {
        json!({
            "delimiter": self.delimiter.to_string(),
            "include_timecodes": self.include_timecodes,
            "include_character": self.include_character,
            "include_source": self.include_source,
            "include_notes": self.include_notes,
            "include_sfx": self.include_sfx,
        })
    }

    fn header(&self) -> Vec<String> {
        let mut header = vec!["#".to_string()];
        if self.include_timecodes {
            header.push("Start".to_string());
            header.push("End".to_string());
        }
        if self.include_character {
            header.push("Character".to_string());
        }
        if self.include_source {
            header.push("Source".to_string());
        }
        header.push("Translation".to_string());
        if self.include_notes {
            header.push("Notes".to_string());
        }
        if self.include_sfx {
            header.push("SFX".to_string());
        }
        header
    }

    fn row(&self, cue: &Cue) -> Vec<String> {
        let mut row = vec![cue.cue_index.to_string()];
        if self.include_timecodes {
            row.push(format_timecode(cue.time_in_ms));
            row.push(format_timecode(cue.time_out_ms));
        }
        if self.include_character {
            row.push(cue.character_name.clone());
        }
        if self.include_source {
            row.push(cue.source_text.clone());
        }
        row.push(cue.translated_text.clone());
        if self.include_notes {
            row.push(cue.notes.clone());
        }
        if self.include_sfx {
            row.push(cue.sfx_notes.clone());
        }
        row
    }
}

pub struct CsvExport {
    descriptor: Descriptor,
    defaults: CsvOptions,
    context: Option<ContextHandle>,
}

impl Default for CsvExport {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvExport {
    pub fn new() -> Self {
        Self {
            descriptor: Descriptor::new(CSV_EXPORT_ID, "CSV Export", "1.1.0")
                .with_author("cuekit")
                .with_description("Export cues to CSV")
                .with_icon("📊")
                .with_readme("README.md"),
            defaults: CsvOptions::default(),
            context: None,
        }
    }

    pub fn defaults(&self) -> CsvOptions {
        self.defaults
    }
}

impl Extension for CsvExport {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn attach_context(&mut self, context: ContextHandle) {
        self.context = Some(context);
    }

    fn load_settings(&mut self, settings: &Value) {
        let Some(map) = settings.as_object() else {
            return;
        };
        match CsvOptions::default().merged(map) {
            Ok(options) => self.defaults = options,
            Err(err) => log::warn!(
                "event=settings_apply module=csv_export status=skipped extension_id={CSV_EXPORT_ID} error={err}"
            ),
        }
    }

    fn save_settings(&self) -> Option<Value> {
        Some(self.defaults.to_json())
    }

    fn settings_panel(&self) -> Option<PanelContribution> {
        Some(PanelContribution {
            id: "csvExportOptions".to_string(),
            title: "CSV Export".to_string(),
            area: DockArea::Right,
        })
    }

    fn as_export(&self) -> Option<&dyn ExportExtension> {
        Some(self)
    }

    fn as_ui(&self) -> Option<&dyn UiExtension> {
        Some(self)
    }
}

impl ExportExtension for CsvExport {
    fn file_extension(&self) -> &str {
        ".csv"
    }

    fn file_filter(&self) -> String {
        "CSV file (*.csv)".to_string()
    }

    fn export(
        &self,
        output: &Path,
        _project: &Project,
        cues: &[Cue],
        options: &ExportOptions,
    ) -> Result<(), ExtensionError> {
        let options = self.defaults.merged(options)?;
        let mut writer = BufWriter::new(File::create(output)?);
        writer.write_all(UTF8_BOM)?;
        write_record(&mut writer, &options.header(), options.delimiter)?;
        for cue in cues {
            write_record(&mut writer, &options.row(cue), options.delimiter)?;
        }
        writer.flush()?;

        if let Some(context) = self.context.as_ref() {
            context.log_info(format!(
                "exported {} cues to {}",
                cues.len(),
                output.display()
            ));
        }
        Ok(())
    }
}

impl UiExtension for CsvExport {
    fn menu_items(&self) -> Vec<ActionContribution> {
        vec![
            ActionContribution::new("csv_export.run", "CSV Export...")
                .with_shortcut("Ctrl+Shift+C"),
        ]
    }
}

/// Writes one CSV record terminated by CRLF, quoting fields that need it.
fn write_record(out: &mut impl Write, fields: &[String], delimiter: char) -> std::io::Result<()> {
    let mut line = String::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            line.push(delimiter);
        }
        line.push_str(&quote_field(field, delimiter));
    }
    line.push_str("\r\n");
    out.write_all(line.as_bytes())
}

fn quote_field(field: &str, delimiter: char) -> String {
    let needs_quotes = field
        .chars()
        .any(|c| c == delimiter || c == '"' || c == '\r' || c == '\n');
    if needs_quotes {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
