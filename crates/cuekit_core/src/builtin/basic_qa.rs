//! Basic QA extension (`builtin.qa.basic`).
//!
//! Checks per cue, in this order: missing translation, lip-sync overrun,
//! double spaces, missing character name, stray leading/trailing whitespace.

use crate::extension::context::ContextHandle;
use crate::extension::descriptor::Descriptor;
use crate::extension::roles::{
    ActionContribution, DockArea, Extension, PanelContribution, QaExtension, QaIssue, Severity,
    UiExtension,
};
use crate::model::cue::Cue;
use crate::model::project::Project;
use once_cell::sync::Lazy;
use regex::Regex;

pub const BASIC_QA_ID: &str = "builtin.qa.basic";
/// Translated/source speaking-time ratio above which a cue is too long.
pub const LIP_SYNC_RATIO_LIMIT: f64 = 1.05;

static DOUBLE_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" {2,}").expect("double space regex must compile"));

pub struct BasicQa {
    descriptor: Descriptor,
    context: Option<ContextHandle>,
}

impl Default for BasicQa {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicQa {
    pub fn new() -> Self {
        Self {
            descriptor: Descriptor::new(BASIC_QA_ID, "Basic QA", "1.1.0")
                .with_author("cuekit")
                .with_description("Basic quality checks for translated cues")
                .with_icon("🔍")
                .with_readme("README.md"),
            context: None,
        }
    }

    fn check_cue(cue: &Cue, issues: &mut Vec<QaIssue>) {
        let text = cue.translated_text.as_str();

        if text.trim().is_empty() {
            issues.push(
                QaIssue::new(cue.id, Severity::Warning, "Missing translation")
                    .with_suggestion("Add a translation for this cue"),
            );
        }

        if let Some(ratio) = cue.lip_sync_ratio.filter(|ratio| *ratio > LIP_SYNC_RATIO_LIMIT) {
            issues.push(
                QaIssue::new(
                    cue.id,
                    Severity::Error,
                    format!("Text too long (lip-sync: {:.0}%)", ratio * 100.0),
                )
                .with_suggestion("Shorten the translation"),
            );
        }

        if DOUBLE_SPACE_RE.is_match(text) {
            issues.push(
                QaIssue::new(cue.id, Severity::Info, "Double space in text")
                    .with_suggestion("Remove the double spaces"),
            );
        }

        if !text.is_empty() && cue.character_name.trim().is_empty() {
            issues.push(
                QaIssue::new(cue.id, Severity::Info, "Missing character name")
                    .with_suggestion("Name the speaking character"),
            );
        }

        if !text.is_empty() && text != text.trim() {
            issues.push(
                QaIssue::new(cue.id, Severity::Info, "Leading or trailing whitespace")
                    .with_suggestion("Remove the surrounding whitespace"),
            );
        }
    }
}

impl Extension for BasicQa {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn attach_context(&mut self, context: ContextHandle) {
        self.context = Some(context);
    }

    fn as_qa(&self) -> Option<&dyn QaExtension> {
        Some(self)
    }

    fn as_ui(&self) -> Option<&dyn UiExtension> {
        Some(self)
    }
}

impl QaExtension for BasicQa {
    fn check(&self, project: &Project, cues: &[Cue]) -> Vec<QaIssue> {
        let mut issues = Vec::new();
        for cue in cues {
            Self::check_cue(cue, &mut issues);
        }
        if let Some(context) = self.context.as_ref() {
            context.log_info(format!(
                "checked {} cues of '{}': {} issues",
                cues.len(),
                project.title,
                issues.len()
            ));
        }
        issues
    }
}

impl UiExtension for BasicQa {
    fn dock_panel(&self) -> Option<PanelContribution> {
        Some(PanelContribution {
            id: "qaCheckDock".to_string(),
            title: "QA Check".to_string(),
            area: DockArea::Right,
        })
    }

    fn menu_items(&self) -> Vec<ActionContribution> {
        vec![
            ActionContribution::new("basic_qa.toggle_panel", "QA Panel").checkable(),
            ActionContribution::new("basic_qa.run", "Run QA Check").with_shortcut("F7"),
        ]
    }
}
