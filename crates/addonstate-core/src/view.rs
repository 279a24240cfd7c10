use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compat::InstallPolicy;
use crate::location::{InstallLocation, LocationScope};
use crate::record::AddonRecord;
use crate::types::{AddonType, BlocklistState, SignedState};

pub const DEFAULT_THEME_ID: &str = "default-theme@mozilla.org";

/// Operations a caller may perform on an installed package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions(u32);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const UNINSTALL: Self = Self(1);
    pub const ENABLE: Self = Self(2);
    pub const DISABLE: Self = Self(4);
    pub const UPGRADE: Self = Self(8);
    pub const API_UNINSTALL: Self = Self(16);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::ENABLE, "enable"),
            (Self::DISABLE, "disable"),
            (Self::UPGRADE, "upgrade"),
            (Self::UNINSTALL, "uninstall"),
            (Self::API_UNINSTALL, "api-uninstall"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}

/// Metadata from a remote add-on repository used to fill gaps in local metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepositoryData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub creator: Option<String>,
    #[serde(rename = "homepageURL")]
    pub homepage_url: Option<String>,
    #[serde(rename = "iconURL")]
    pub icon_url: Option<String>,
}

/// Read-only accessor over a record, its location and optional repository data.
#[derive(Debug, Clone, Copy)]
pub struct AddonView<'a> {
    record: &'a AddonRecord,
    location: &'a InstallLocation,
    repository: Option<&'a RepositoryData>,
}

impl<'a> AddonView<'a> {
    pub fn new(record: &'a AddonRecord, location: &'a InstallLocation) -> Self {
        Self {
            record,
            location,
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: Option<&'a RepositoryData>) -> Self {
        self.repository = repository;
        self
    }

    pub fn record(&self) -> &'a AddonRecord {
        self.record
    }

    pub fn id(&self) -> &'a str {
        &self.record.id
    }

    pub fn version(&self) -> &'a str {
        &self.record.version
    }

    pub fn addon_type(&self) -> AddonType {
        self.record.addon_type
    }

    pub fn location_name(&self) -> &'a str {
        &self.location.name
    }

    pub fn is_active(&self) -> bool {
        self.record.is_active()
    }

    pub fn user_disabled(&self) -> bool {
        self.record.user_disabled
    }

    pub fn app_disabled(&self) -> bool {
        self.record.app_disabled()
    }

    pub fn soft_disabled(&self) -> bool {
        self.record.soft_disabled
    }

    pub fn embedder_disabled(&self) -> bool {
        self.record.embedder_disabled
    }

    pub fn blocklist_state(&self) -> BlocklistState {
        self.record.blocklist_state
    }

    pub fn signed_state(&self) -> Option<SignedState> {
        self.record.signed_state
    }

    pub fn hidden(&self) -> bool {
        self.record.is_hidden(self.location)
    }

    pub fn is_privileged(&self) -> bool {
        self.record.is_privileged(self.location)
    }

    pub fn is_system(&self) -> bool {
        self.location.is_system
    }

    pub fn is_builtin(&self) -> bool {
        self.location.is_builtin
    }

    pub fn name(&self) -> Option<String> {
        let local = self
            .record
            .passthrough
            .default_locale
            .as_ref()
            .and_then(|locale| locale.name.clone());
        local.or_else(|| self.repository.and_then(|repo| repo.name.clone()))
    }

    pub fn description(&self) -> Option<String> {
        let local = self
            .record
            .passthrough
            .default_locale
            .as_ref()
            .and_then(|locale| locale.description.clone());
        local.or_else(|| self.repository.and_then(|repo| repo.description.clone()))
    }

    /// Repository creator wins over the manifest creator.
    pub fn creator(&self) -> Option<String> {
        let local = self
            .record
            .passthrough
            .default_locale
            .as_ref()
            .and_then(|locale| locale.creator.clone());
        self.repository
            .and_then(|repo| repo.creator.clone())
            .or(local)
    }

    pub fn homepage_url(&self) -> Option<String> {
        let local = self
            .record
            .passthrough
            .default_locale
            .as_ref()
            .and_then(|locale| locale.homepage_url.clone());
        local.or_else(|| self.repository.and_then(|repo| repo.homepage_url.clone()))
    }

    pub fn icon_url(&self) -> Option<String> {
        let local = self
            .record
            .passthrough
            .icon_url
            .as_ref()
            .and_then(|value| value.as_str().map(str::to_string));
        local.or_else(|| self.repository.and_then(|repo| repo.icon_url.clone()))
    }

    /// Operations allowed on this package under `policy`.
    pub fn permissions(
        &self,
        policy: &dyn InstallPolicy,
        sideload_scopes: LocationScope,
    ) -> Permissions {
        let record = self.record;
        let location = self.location;
        let mut permissions = Permissions::NONE;

        if !record.app_disabled() {
            if record.user_disabled || record.soft_disabled {
                permissions.insert(Permissions::ENABLE);
            } else if record.addon_type != AddonType::Theme || record.id != DEFAULT_THEME_ID {
                permissions.insert(Permissions::DISABLE);
            }
        }

        let changes_allowed = !location.locked && !record.pending_uninstall;
        if changes_allowed
            && !location.is_system_or_builtin()
            && !location.is_linked_addon(&record.id)
        {
            permissions.insert(Permissions::UPGRADE);
        }

        let legacy_sideload = record.foreign_install && !location.scope.intersects(sideload_scopes);
        if changes_allowed || legacy_sideload {
            permissions.insert(Permissions::API_UNINSTALL);
            if !location.is_builtin {
                permissions.insert(Permissions::UNINSTALL);
            }
        }

        if !policy.allows_uninstall(&record.id) {
            permissions.remove(Permissions::UNINSTALL);
        }
        if !policy.allows_disable(&record.id) {
            permissions.remove(Permissions::DISABLE);
        }
        if policy.updates_disabled(&record.id) {
            permissions.remove(Permissions::UPGRADE);
        }

        permissions
    }
}
