use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const KEY_APP_PROFILE: &str = "app-profile";
pub const KEY_APP_TEMPORARY: &str = "app-temporary";
pub const KEY_APP_SYSTEM_ADDONS: &str = "app-system-addons";
pub const KEY_APP_SYSTEM_BUILTINS: &str = "app-system-builtins";
pub const KEY_APP_SYSTEM_PROFILE: &str = "app-system-profile";
pub const KEY_APP_BUILTINS: &str = "app-builtin";
pub const KEY_APP_GLOBAL: &str = "app-global";
pub const KEY_APP_SYSTEM_LOCAL: &str = "app-system-local";
pub const KEY_APP_SYSTEM_SHARE: &str = "app-system-share";
pub const KEY_APP_SYSTEM_USER: &str = "app-system-user";

/// Bit set of install scopes a location belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationScope(u32);

impl LocationScope {
    pub const NONE: Self = Self(0);
    pub const PROFILE: Self = Self(1);
    pub const USER: Self = Self(2);
    pub const APPLICATION: Self = Self(4);
    pub const SYSTEM: Self = Self(8);
    pub const TEMPORARY: Self = Self(16);
    pub const ALL: Self = Self(31);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "profile" => Some(Self::PROFILE),
            "user" => Some(Self::USER),
            "application" => Some(Self::APPLICATION),
            "system" => Some(Self::SYSTEM),
            "temporary" => Some(Self::TEMPORARY),
            _ => None,
        }
    }
}

/// Which signatures a location accepts for packages of signed types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningRule {
    Standard,
    SystemOrPrivileged,
    SystemOnly,
    /// No signature needed on any platform.
    Exempt,
    /// No signature needed, except on macOS.
    ExemptUnlessDarwin,
}

impl SigningRule {
    pub fn for_location_name(name: &str) -> Self {
        match name {
            KEY_APP_SYSTEM_PROFILE => Self::SystemOrPrivileged,
            KEY_APP_SYSTEM_ADDONS => Self::SystemOnly,
            KEY_APP_SYSTEM_BUILTINS | KEY_APP_BUILTINS | KEY_APP_TEMPORARY => Self::Exempt,
            KEY_APP_SYSTEM_SHARE | KEY_APP_SYSTEM_LOCAL => Self::ExemptUnlessDarwin,
            _ => Self::Standard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::SystemOrPrivileged => "system-or-privileged",
            Self::SystemOnly => "system-only",
            Self::Exempt => "exempt",
            Self::ExemptUnlessDarwin => "exempt-unless-darwin",
        }
    }
}

/// A named, priority-ranked source of packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLocation {
    pub name: String,
    pub scope: LocationScope,
    pub locked: bool,
    pub is_system: bool,
    pub is_builtin: bool,
    pub is_temporary: bool,
    pub hidden: bool,
    pub signing: SigningRule,
    pub linked_ids: BTreeSet<String>,
}

impl InstallLocation {
    /// Builds a location with the properties the well-known location names imply.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (scope, locked, is_system, is_builtin, is_temporary) = match name.as_str() {
            KEY_APP_PROFILE => (LocationScope::PROFILE, false, false, false, false),
            KEY_APP_TEMPORARY => (LocationScope::TEMPORARY, false, false, false, true),
            KEY_APP_SYSTEM_ADDONS => (LocationScope::PROFILE, false, true, false, false),
            KEY_APP_SYSTEM_PROFILE => (LocationScope::PROFILE, false, true, false, false),
            KEY_APP_SYSTEM_BUILTINS => (LocationScope::APPLICATION, true, true, true, false),
            KEY_APP_BUILTINS => (LocationScope::APPLICATION, true, false, true, false),
            KEY_APP_GLOBAL => (LocationScope::APPLICATION, true, false, false, false),
            KEY_APP_SYSTEM_USER => (LocationScope::USER, false, false, false, false),
            KEY_APP_SYSTEM_LOCAL | KEY_APP_SYSTEM_SHARE => {
                (LocationScope::SYSTEM, true, false, false, false)
            }
            _ => (LocationScope::PROFILE, false, false, false, false),
        };

        Self {
            signing: SigningRule::for_location_name(&name),
            name,
            scope,
            locked,
            is_system,
            is_builtin,
            is_temporary,
            hidden: false,
            linked_ids: BTreeSet::new(),
        }
    }

    pub fn with_scope(mut self, scope: LocationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_linked_id(mut self, id: impl Into<String>) -> Self {
        self.linked_ids.insert(id.into());
        self
    }

    pub fn is_linked_addon(&self, id: &str) -> bool {
        self.linked_ids.contains(id)
    }

    /// Locations whose contents are replaced when the application updates.
    pub fn is_app_bundled(&self) -> bool {
        matches!(
            self.name.as_str(),
            KEY_APP_GLOBAL | KEY_APP_BUILTINS | KEY_APP_SYSTEM_BUILTINS
        )
    }

    pub fn is_system_addon_location(&self) -> bool {
        matches!(
            self.name.as_str(),
            KEY_APP_SYSTEM_ADDONS | KEY_APP_SYSTEM_BUILTINS
        )
    }

    /// Builtin locations by name. Packages here are never uninstalled on disappearance.
    pub fn is_builtin_name(&self) -> bool {
        matches!(self.name.as_str(), KEY_APP_BUILTINS | KEY_APP_SYSTEM_BUILTINS)
    }

    pub fn is_system_or_builtin(&self) -> bool {
        self.is_system || self.is_builtin
    }
}

pub fn validate_location_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name.len() > 64 {
        anyhow::bail!("invalid location name: must be 1-64 characters");
    }

    let valid = name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if !valid {
        anyhow::bail!("invalid location name: '{name}'");
    }

    Ok(())
}
