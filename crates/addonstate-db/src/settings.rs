use std::collections::BTreeMap;
use std::time::Duration;

use addonstate_core::{AppInfo, CompatSettings, LocationScope};
use addonstate_store::DEFAULT_SAVE_DELAY;

/// Everything about the running environment the database consults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub app: AppInfo,
    pub compat: CompatSettings,
    /// Whether an embedder controls `embedder_disabled`.
    pub is_embedded: bool,
    /// Scopes in which newly detected foreign installs start user-disabled.
    pub auto_disabled_scopes: LocationScope,
    /// Scopes where sideloading is still supported.
    pub sideload_scopes: LocationScope,
    /// Enabled overrides for system addons, keyed by the part of the id before '@'.
    pub system_addon_overrides: BTreeMap<String, bool>,
    pub save_delay: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            app: AppInfo::default(),
            compat: CompatSettings::default(),
            is_embedded: false,
            auto_disabled_scopes: LocationScope::NONE,
            sideload_scopes: LocationScope::PROFILE,
            system_addon_overrides: BTreeMap::new(),
            save_delay: DEFAULT_SAVE_DELAY,
        }
    }
}

impl DatabaseSettings {
    pub(crate) fn system_addon_enabled(&self, id: &str) -> bool {
        let prefix = id.split('@').next().unwrap_or(id);
        self.system_addon_overrides
            .get(prefix)
            .copied()
            .unwrap_or(true)
    }
}
