//! Capability grants gating what one extension Context may do.

use crate::extension::roles::ExtensionRole;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One sensitive operation family a Context may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    ModifyCues,
    AccessProject,
    ShowUi,
    AccessSettings,
    Network,
    Filesystem,
}

impl Capability {
    /// Stable string id used in logs and config.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModifyCues => CAPABILITY_MODIFY_CUES,
            Self::AccessProject => CAPABILITY_ACCESS_PROJECT,
            Self::ShowUi => CAPABILITY_SHOW_UI,
            Self::AccessSettings => CAPABILITY_ACCESS_SETTINGS,
            Self::Network => CAPABILITY_NETWORK,
            Self::Filesystem => CAPABILITY_FILESYSTEM,
        }
    }

    /// User-facing short description.
    pub fn description(self) -> &'static str {
        match self {
            Self::ModifyCues => "Allow changing cue text in the open project.",
            Self::AccessProject => "Allow reading project metadata and cues.",
            Self::ShowUi => "Allow showing messages and status text in the host window.",
            Self::AccessSettings => "Allow reading and writing the extension's own settings.",
            Self::Network => "Allow network access for remote services such as translators.",
            Self::Filesystem => "Allow writing files, e.g. export targets.",
        }
    }

    pub const ALL: [Capability; 6] = [
        Self::ModifyCues,
        Self::AccessProject,
        Self::ShowUi,
        Self::AccessSettings,
        Self::Network,
        Self::Filesystem,
    ];
}

pub const CAPABILITY_MODIFY_CUES: &str = "modify_cues";
pub const CAPABILITY_ACCESS_PROJECT: &str = "access_project";
pub const CAPABILITY_SHOW_UI: &str = "show_ui";
pub const CAPABILITY_ACCESS_SETTINGS: &str = "access_settings";
pub const CAPABILITY_NETWORK: &str = "network";
pub const CAPABILITY_FILESYSTEM: &str = "filesystem";

/// Parses one capability from its string id.
pub fn parse_capability(value: &str) -> Result<Capability, CapabilityParseError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(CapabilityParseError::EmptyCapability);
    }

    Capability::ALL
        .into_iter()
        .find(|capability| capability.as_str() == normalized)
        .ok_or_else(|| CapabilityParseError::UnsupportedCapability(normalized.to_string()))
}

/// Per-Context permission flags.
///
/// Default: project and settings access allowed, every UI/IO-sensitive
/// operation denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityGrant {
    pub can_modify_cues: bool,
    pub can_access_project: bool,
    pub can_show_ui: bool,
    pub can_access_settings: bool,
    pub can_access_network: bool,
    pub can_access_filesystem: bool,
}

impl Default for CapabilityGrant {
    fn default() -> Self {
        Self {
            can_modify_cues: false,
            can_access_project: true,
            can_show_ui: false,
            can_access_settings: true,
            can_access_network: false,
            can_access_filesystem: false,
        }
    }
}

impl CapabilityGrant {
    /// Grant with every flag cleared.
    pub fn none() -> Self {
        Self {
            can_modify_cues: false,
            can_access_project: false,
            can_show_ui: false,
            can_access_settings: false,
            can_access_network: false,
            can_access_filesystem: false,
        }
    }

    /// Derives the grant for an extension from the roles it satisfies.
    ///
    /// Union over roles: UI shows UI, QA reads the project, Export reads the
    /// project and writes files, Service/Translation reach the network.
    pub fn for_roles(roles: &BTreeSet<ExtensionRole>) -> Self {
        let mut grant = Self::default();
        for role in roles {
            match role {
                ExtensionRole::Ui => {
                    grant.can_show_ui = true;
                    grant.can_access_project = true;
                }
                ExtensionRole::Qa => grant.can_access_project = true,
                ExtensionRole::Export => {
                    grant.can_access_project = true;
                    grant.can_access_filesystem = true;
                }
                ExtensionRole::Service | ExtensionRole::Translation => {
                    grant.can_access_network = true;
                }
                ExtensionRole::Language => {}
            }
        }
        grant
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ModifyCues => self.can_modify_cues,
            Capability::AccessProject => self.can_access_project,
            Capability::ShowUi => self.can_show_ui,
            Capability::AccessSettings => self.can_access_settings,
            Capability::Network => self.can_access_network,
            Capability::Filesystem => self.can_access_filesystem,
        }
    }

    /// Returns a copy with one capability switched.
    pub fn with(mut self, capability: Capability, allowed: bool) -> Self {
        let flag = match capability {
            Capability::ModifyCues => &mut self.can_modify_cues,
            Capability::AccessProject => &mut self.can_access_project,
            Capability::ShowUi => &mut self.can_show_ui,
            Capability::AccessSettings => &mut self.can_access_settings,
            Capability::Network => &mut self.can_access_network,
            Capability::Filesystem => &mut self.can_access_filesystem,
        };
        *flag = allowed;
        self
    }

    /// Granted capabilities in stable order.
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| self.allows(*capability))
            .collect()
    }
}

/// Capability parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityParseError {
    EmptyCapability,
    UnsupportedCapability(String),
}

impl Display for CapabilityParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCapability => write!(f, "capability value must not be empty"),
            Self::UnsupportedCapability(value) => write!(f, "capability is unsupported: {value}"),
        }
    }
}

impl Error for CapabilityParseError {}

#[cfg(test)]
mod tests {
    use super::{parse_capability, Capability, CapabilityGrant, CapabilityParseError};
    use crate::extension::roles::ExtensionRole;
    use std::collections::BTreeSet;

    #[test]
    fn default_grant_allows_only_project_and_settings() {
        let grant = CapabilityGrant::default();
        assert_eq!(
            grant.granted(),
            vec![Capability::AccessProject, Capability::AccessSettings]
        );
    }

    #[test]
    fn parses_every_capability_by_its_string_id() {
        for capability in Capability::ALL {
            assert_eq!(
                parse_capability(capability.as_str()).expect("known capability"),
                capability
            );
        }
    }

    #[test]
    fn rejects_empty_and_unknown_capabilities() {
        assert_eq!(
            parse_capability("  ").expect_err("empty must fail"),
            CapabilityParseError::EmptyCapability
        );
        assert_eq!(
            parse_capability("bluetooth").expect_err("unknown must fail"),
            CapabilityParseError::UnsupportedCapability("bluetooth".to_string())
        );
    }

    #[test]
    fn grant_for_export_and_ui_is_union_of_both() {
        let roles = BTreeSet::from([ExtensionRole::Export, ExtensionRole::Ui]);
        let grant = CapabilityGrant::for_roles(&roles);
        assert!(grant.can_show_ui);
        assert!(grant.can_access_filesystem);
        assert!(grant.can_access_project);
        assert!(!grant.can_access_network);
        assert!(!grant.can_modify_cues);
    }

    #[test]
    fn grant_for_translation_reaches_network_only() {
        let roles = BTreeSet::from([ExtensionRole::Service, ExtensionRole::Translation]);
        let grant = CapabilityGrant::for_roles(&roles);
        assert!(grant.can_access_network);
        assert!(!grant.can_show_ui);
        assert!(!grant.can_access_filesystem);
    }

    #[test]
    fn with_toggles_single_flag() {
        let grant = CapabilityGrant::none().with(Capability::ShowUi, true);
        assert_eq!(grant.granted(), vec![Capability::ShowUi]);
    }
}
