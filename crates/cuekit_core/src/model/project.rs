//! Project domain model.
//!
//! # Responsibility
//! - Hold project metadata and the ordered cue list.
//! - Provide the shared handle type the host pushes into every Context.
//!
//! # Invariants
//! - Cues are kept in display order.
//! - A `SharedProject` is only touched from the host thread.

use crate::model::cue::{Cue, CueId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Shared, single-threaded handle to the currently open project.
pub type SharedProject = Rc<RefCell<Project>>;

/// Dubbing project metadata plus its cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    pub file_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub source_language: String,
    pub target_language: String,
    pub frame_rate: f64,
    pub cues: Vec<Cue>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            title: "New Project".to_string(),
            file_path: None,
            video_path: None,
            source_language: "en".to_string(),
            target_language: "hu".to_string(),
            frame_rate: 25.0,
            cues: Vec::new(),
        }
    }
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Wraps this project into the shared handle used by the host.
    pub fn into_shared(self) -> SharedProject {
        Rc::new(RefCell::new(self))
    }

    pub fn cue(&self, cue_id: CueId) -> Option<&Cue> {
        self.cues.iter().find(|cue| cue.id == cue_id)
    }

    pub fn cue_mut(&mut self, cue_id: CueId) -> Option<&mut Cue> {
        self.cues.iter_mut().find(|cue| cue.id == cue_id)
    }
}
