//! Extension host.
//!
//! Extensions are compiled-in units published through an
//! [`catalog::ExtensionCatalog`], selected on disk by unit manifests, and
//! admitted through the [`registry::ExtensionRegistry`]. Each admitted
//! extension talks to the host only through its own
//! [`context::ContextHandle`].

pub mod capability;
pub mod catalog;
pub mod context;
pub mod context_manager;
pub mod descriptor;
pub mod events;
pub mod host;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod roles;
