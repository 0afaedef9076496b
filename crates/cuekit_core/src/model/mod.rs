//! Project and cue data shapes shared between the host and extensions.
//!
//! # Responsibility
//! - Define the read model extensions observe through their Context.
//! - Keep storage concerns out of the extension host.
//!
//! # Invariants
//! - The host owns the live project; extensions only ever see it through
//!   Context accessors or as borrowed slices handed to role calls.

pub mod cue;
pub mod project;
