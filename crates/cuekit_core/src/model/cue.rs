//! Cue domain model.
//!
//! # Responsibility
//! - Define one dubbing/subtitle unit between `time_in_ms` and `time_out_ms`.
//! - Provide timecode formatting used by exports and diagnostics.
//!
//! # Invariants
//! - `id` is stable for the cue lifetime and never reused in one project.
//! - `time_out_ms` should not be earlier than `time_in_ms`.

use serde::{Deserialize, Serialize};

/// Stable identifier for a cue inside one project.
pub type CueId = i64;

/// Translation workflow state of a cue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueStatus {
    #[default]
    New,
    Translated,
    NeedsRevision,
    Approved,
}

/// One timed line of dialogue with its translation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub id: CueId,
    /// Display order inside the project (1-based in imported material).
    pub cue_index: u32,
    pub time_in_ms: i64,
    pub time_out_ms: i64,
    pub source_text: String,
    pub translated_text: String,
    pub character_name: String,
    pub notes: String,
    pub sfx_notes: String,
    pub status: CueStatus,
    /// Translated/source speaking-time ratio from the lip-sync estimator.
    pub lip_sync_ratio: Option<f64>,
}

impl Cue {
    /// Creates a cue with timing and source text; remaining fields default.
    pub fn new(
        id: CueId,
        time_in_ms: i64,
        time_out_ms: i64,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            cue_index: u32::try_from(id).unwrap_or(0),
            time_in_ms,
            time_out_ms,
            source_text: source_text.into(),
            ..Self::default()
        }
    }

    /// Builder-style helper used by fixtures and importers.
    pub fn with_translation(mut self, text: impl Into<String>) -> Self {
        self.translated_text = text.into();
        self
    }

    /// Builder-style helper used by fixtures and importers.
    pub fn with_character(mut self, name: impl Into<String>) -> Self {
        self.character_name = name.into();
        self
    }

    /// Duration in milliseconds, clamped at zero.
    pub fn duration_ms(&self) -> i64 {
        (self.time_out_ms - self.time_in_ms).max(0)
    }

    /// Returns whether a non-blank translation exists.
    pub fn is_translated(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }
}

/// Formats milliseconds as an SRT timecode (`HH:MM:SS,mmm`).
///
/// Negative input clamps to zero.
pub fn format_timecode(milliseconds: i64) -> String {
    let milliseconds = milliseconds.max(0);
    let hours = milliseconds / 3_600_000;
    let minutes = (milliseconds % 3_600_000) / 60_000;
    let seconds = (milliseconds % 60_000) / 1000;
    let millis = milliseconds % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::{format_timecode, Cue};

    #[test]
    fn formats_timecode_with_comma_separator() {
        assert_eq!(format_timecode(3_661_500), "01:01:01,500");
        assert_eq!(format_timecode(0), "00:00:00,000");
    }

    #[test]
    fn negative_timecode_clamps_to_zero() {
        assert_eq!(format_timecode(-20), "00:00:00,000");
    }

    #[test]
    fn blank_translation_is_not_translated() {
        let cue = Cue::new(1, 0, 1000, "Hello").with_translation("   ");
        assert!(!cue.is_translated());
        assert_eq!(cue.duration_ms(), 1000);
    }
}
