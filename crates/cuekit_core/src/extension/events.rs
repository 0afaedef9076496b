//! Host event vocabulary and dispatch bookkeeping.
//!
//! # Responsibility
//! - Name every event kind the host can fire.
//! - Carry the per-dispatch outcome (delivered count, contained failures).
//!
//! # Invariants
//! - A handler failure is recorded, never propagated to the dispatcher caller.

use crate::model::cue::CueId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::rc::Rc;

/// Event kinds extensions subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HostEventKind {
    ProjectOpened,
    ProjectClosed,
    ProjectSaved,
    CueSelected,
    CueChanged,
    CueAdded,
    CueDeleted,
    ExportStarted,
    ExportFinished,
    QaCheckStarted,
    QaCheckFinished,
    LanguageChanged,
    SettingsChanged,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 13] = [
        Self::ProjectOpened,
        Self::ProjectClosed,
        Self::ProjectSaved,
        Self::CueSelected,
        Self::CueChanged,
        Self::CueAdded,
        Self::CueDeleted,
        Self::ExportStarted,
        Self::ExportFinished,
        Self::QaCheckStarted,
        Self::QaCheckFinished,
        Self::LanguageChanged,
        Self::SettingsChanged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProjectOpened => "project_opened",
            Self::ProjectClosed => "project_closed",
            Self::ProjectSaved => "project_saved",
            Self::CueSelected => "cue_selected",
            Self::CueChanged => "cue_changed",
            Self::CueAdded => "cue_added",
            Self::CueDeleted => "cue_deleted",
            Self::ExportStarted => "export_started",
            Self::ExportFinished => "export_finished",
            Self::QaCheckStarted => "qa_check_started",
            Self::QaCheckFinished => "qa_check_finished",
            Self::LanguageChanged => "language_changed",
            Self::SettingsChanged => "settings_changed",
        }
    }
}

impl Display for HostEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event value with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    ProjectOpened {
        title: String,
        path: Option<PathBuf>,
    },
    ProjectClosed,
    ProjectSaved {
        path: Option<PathBuf>,
    },
    CueSelected {
        cue_id: CueId,
    },
    CueChanged {
        cue_id: CueId,
    },
    CueAdded {
        cue_id: CueId,
    },
    CueDeleted {
        cue_id: CueId,
    },
    ExportStarted {
        extension_id: String,
        output: PathBuf,
    },
    ExportFinished {
        extension_id: String,
        output: PathBuf,
        success: bool,
    },
    QaCheckStarted {
        extension_id: String,
    },
    QaCheckFinished {
        extension_id: String,
        issue_count: usize,
    },
    LanguageChanged {
        code: String,
    },
    SettingsChanged {
        extension_id: String,
    },
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            Self::ProjectOpened { .. } => HostEventKind::ProjectOpened,
            Self::ProjectClosed => HostEventKind::ProjectClosed,
            Self::ProjectSaved { .. } => HostEventKind::ProjectSaved,
            Self::CueSelected { .. } => HostEventKind::CueSelected,
            Self::CueChanged { .. } => HostEventKind::CueChanged,
            Self::CueAdded { .. } => HostEventKind::CueAdded,
            Self::CueDeleted { .. } => HostEventKind::CueDeleted,
            Self::ExportStarted { .. } => HostEventKind::ExportStarted,
            Self::ExportFinished { .. } => HostEventKind::ExportFinished,
            Self::QaCheckStarted { .. } => HostEventKind::QaCheckStarted,
            Self::QaCheckFinished { .. } => HostEventKind::QaCheckFinished,
            Self::LanguageChanged { .. } => HostEventKind::LanguageChanged,
            Self::SettingsChanged { .. } => HostEventKind::SettingsChanged,
        }
    }
}

/// Failure returned by an event handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for HandlerError {}

/// Subscribed callback. Identity (for idempotent subscribe) is the `Rc`
/// allocation, so keep a clone to unsubscribe later.
pub type EventHandler = Rc<dyn Fn(&HostEvent) -> Result<(), HandlerError>>;

/// Contained failure of one handler during one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub extension_id: String,
    pub kind: HostEventKind,
    /// Position of the handler in subscription order.
    pub position: usize,
    pub message: String,
    pub panicked: bool,
}

/// Outcome of one dispatch call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers invoked, failed ones included.
    pub invoked: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: DispatchReport) {
        self.invoked += other.invoked;
        self.failures.extend(other.failures);
    }
}

/// Renders a panic payload into a short message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
