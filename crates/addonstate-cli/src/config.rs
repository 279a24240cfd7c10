use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io;
use std::time::Duration;

use addonstate_core::{
    validate_location_name, AddonRecord, AppInfo, CompatSettings, InstallLocation, InstallPolicy,
    LocationScope, KEY_APP_PROFILE,
};
use addonstate_db::DatabaseSettings;
use addonstate_store::{ProfileLayout, DEFAULT_SAVE_DELAY};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Contents of a profile's `addonstate.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    pub app: AppInfo,
    pub settings: SettingsConfig,
    pub locations: Vec<LocationConfig>,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    #[serde(flatten)]
    pub compat: CompatSettings,
    pub embedded: bool,
    pub auto_disabled_scopes: Vec<String>,
    pub sideload_scopes: Vec<String>,
    pub system_addon_overrides: BTreeMap<String, bool>,
    pub save_delay_ms: Option<u64>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            compat: CompatSettings::default(),
            embedded: false,
            auto_disabled_scopes: Vec::new(),
            sideload_scopes: vec!["profile".to_string()],
            system_addon_overrides: BTreeMap::new(),
            save_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub name: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub hidden: bool,
    /// Ids whose directories are links to packages kept elsewhere.
    #[serde(default)]
    pub linked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub extension_installs: bool,
    pub installed_by_policy: BTreeSet<String>,
    pub blocked: BTreeSet<String>,
    /// Ids that may be neither disabled nor uninstalled.
    pub locked: BTreeSet<String>,
    pub updates_disabled: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            extension_installs: true,
            installed_by_policy: BTreeSet::new(),
            blocked: BTreeSet::new(),
            locked: BTreeSet::new(),
            updates_disabled: BTreeSet::new(),
        }
    }
}

impl InstallPolicy for PolicyConfig {
    fn is_installed_by_policy(&self, id: &str) -> bool {
        self.installed_by_policy.contains(id)
    }

    fn may_install(&self, record: &AddonRecord) -> bool {
        !self.blocked.contains(&record.id)
    }

    fn allows_extension_installs(&self) -> bool {
        self.extension_installs
    }

    fn allows_uninstall(&self, id: &str) -> bool {
        !self.locked.contains(id)
    }

    fn allows_disable(&self, id: &str) -> bool {
        !self.locked.contains(id)
    }

    fn updates_disabled(&self, id: &str) -> bool {
        self.updates_disabled.contains(id)
    }
}

impl ProfileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse profile config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for location in &self.locations {
            validate_location_name(&location.name)?;
            if !names.insert(location.name.as_str()) {
                return Err(anyhow!("duplicate install location '{}'", location.name));
            }
            if let Some(scope) = &location.scope {
                parse_scope(scope)?;
            }
        }
        parse_scopes(&self.settings.auto_disabled_scopes)?;
        parse_scopes(&self.settings.sideload_scopes)?;
        Ok(())
    }

    /// Configured locations in priority order. An empty list means a single
    /// profile location.
    pub fn install_locations(&self) -> Result<Vec<InstallLocation>> {
        if self.locations.is_empty() {
            return Ok(vec![InstallLocation::new(KEY_APP_PROFILE)]);
        }

        self.locations
            .iter()
            .map(|config| {
                let mut location = InstallLocation::new(&config.name).with_hidden(config.hidden);
                if let Some(scope) = &config.scope {
                    location = location.with_scope(parse_scope(scope)?);
                }
                if let Some(locked) = config.locked {
                    location = location.with_locked(locked);
                }
                for id in &config.linked {
                    location = location.with_linked_id(id);
                }
                Ok(location)
            })
            .collect()
    }

    pub fn database_settings(&self) -> Result<DatabaseSettings> {
        Ok(DatabaseSettings {
            app: self.app.clone(),
            compat: self.settings.compat.clone(),
            is_embedded: self.settings.embedded,
            auto_disabled_scopes: parse_scopes(&self.settings.auto_disabled_scopes)?,
            sideload_scopes: parse_scopes(&self.settings.sideload_scopes)?,
            system_addon_overrides: self.settings.system_addon_overrides.clone(),
            save_delay: self
                .settings
                .save_delay_ms
                .map_or(DEFAULT_SAVE_DELAY, Duration::from_millis),
        })
    }
}

/// Reads the profile config. A missing file yields the defaults.
pub fn load_profile_config(layout: &ProfileLayout) -> Result<ProfileConfig> {
    let path = layout.config_path();
    match fs::read_to_string(&path) {
        Ok(raw) => ProfileConfig::from_toml_str(&raw)
            .with_context(|| format!("invalid profile config: {}", path.display())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ProfileConfig::default()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read profile config: {}", path.display()))
        }
    }
}

fn parse_scope(value: &str) -> Result<LocationScope> {
    LocationScope::parse(value).ok_or_else(|| anyhow!("unknown location scope '{value}'"))
}

fn parse_scopes(values: &[String]) -> Result<LocationScope> {
    values.iter().try_fold(LocationScope::NONE, |scopes, value| {
        Ok(scopes.union(parse_scope(value)?))
    })
}
