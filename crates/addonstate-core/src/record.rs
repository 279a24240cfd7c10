use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::InstallLocation;
use crate::manifest::AddonManifest;
use crate::types::{
    AddonType, BlocklistState, InstallTelemetryInfo, Passthrough, SignedState, TargetApplication,
    TargetPlatform,
};

pub const TOOLKIT_ID: &str = "toolkit@mozilla.org";

/// Composite `location:id` key of a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddonKey(String);

impl AddonKey {
    pub fn new(location: &str, id: &str) -> Self {
        Self(format!("{location}:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_manifest_version() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// One installed package in one install location.
///
/// `app_disabled` is only written through [`AddonRecord::refresh_app_disabled`]
/// (or a load from disk) and the active state is derived on every read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddonRecord {
    pub id: String,
    #[serde(rename = "syncGUID", default, skip_serializing_if = "Option::is_none")]
    pub sync_guid: Option<String>,
    pub location: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type", default)]
    pub addon_type: AddonType,
    #[serde(default = "default_manifest_version")]
    pub manifest_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader: Option<String>,
    #[serde(rename = "updateURL", default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_origins: Option<Vec<String>>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub user_disabled: bool,
    #[serde(default)]
    pub(crate) app_disabled: bool,
    #[serde(default)]
    pub embedder_disabled: bool,
    #[serde(default)]
    pub soft_disabled: bool,
    #[serde(default)]
    pub pending_uninstall: bool,
    #[serde(default)]
    pub install_date: u64,
    #[serde(default)]
    pub update_date: u64,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "rootURI", default, skip_serializing_if = "Option::is_none")]
    pub root_uri: Option<String>,
    #[serde(default)]
    pub foreign_install: bool,
    #[serde(default)]
    pub strict_compatibility: bool,
    #[serde(default)]
    pub target_applications: Vec<TargetApplication>,
    #[serde(default)]
    pub target_platforms: Vec<TargetPlatform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_state: Option<SignedState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_types: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_date: Option<u64>,
    #[serde(default = "default_true")]
    pub seen: bool,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    pub blocklist_attention_dismissed: bool,
    #[serde(default)]
    pub blocklist_state: BlocklistState,
    #[serde(rename = "blocklistURL", default, skip_serializing_if = "Option::is_none")]
    pub blocklist_url: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_telemetry_info: Option<InstallTelemetryInfo>,
    #[serde(flatten)]
    pub passthrough: Passthrough,
    #[serde(skip)]
    pub broken_manifest: bool,
    #[serde(skip)]
    pub admin_install_only: bool,
}

impl AddonRecord {
    /// Creates a record for `manifest` in `location`. Visibility and
    /// `app_disabled` are left for the caller to resolve.
    pub fn from_manifest(manifest: AddonManifest, location: &str) -> Self {
        Self {
            id: manifest.id,
            sync_guid: None,
            location: location.to_string(),
            version: manifest.version,
            addon_type: manifest.addon_type,
            manifest_version: manifest.manifest_version,
            loader: manifest.loader,
            update_url: manifest.update_url,
            install_origins: manifest.install_origins,
            visible: false,
            user_disabled: false,
            app_disabled: false,
            embedder_disabled: false,
            soft_disabled: false,
            pending_uninstall: false,
            install_date: 0,
            update_date: 0,
            path: String::new(),
            root_uri: None,
            foreign_install: false,
            strict_compatibility: manifest.strict_compatibility,
            target_applications: manifest.target_applications,
            target_platforms: manifest.target_platforms,
            signed_state: manifest.signed_state,
            signed_types: manifest.signed_types,
            signed_date: manifest.signed_date,
            seen: true,
            dependencies: manifest.dependencies,
            blocklist_attention_dismissed: false,
            blocklist_state: BlocklistState::NotBlocked,
            blocklist_url: None,
            hidden: manifest.hidden,
            install_telemetry_info: None,
            passthrough: manifest.passthrough,
            broken_manifest: false,
            admin_install_only: manifest.admin_install_only,
        }
    }

    pub fn key(&self) -> AddonKey {
        AddonKey::new(&self.location, &self.id)
    }

    pub fn app_disabled(&self) -> bool {
        self.app_disabled
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn disabled(&self) -> bool {
        self.user_disabled || self.app_disabled || self.soft_disabled || self.embedder_disabled
    }

    pub fn is_active(&self) -> bool {
        self.visible && !self.disabled() && !self.pending_uninstall
    }

    pub fn is_web_extension(&self) -> bool {
        self.loader.is_none()
    }

    pub fn provides_updates_securely(&self) -> bool {
        match self.update_url.as_deref() {
            Some(url) => url.starts_with("https:"),
            None => true,
        }
    }

    pub fn is_privileged(&self, location: &InstallLocation) -> bool {
        matches!(
            self.signed_state,
            Some(SignedState::Privileged | SignedState::System)
        ) || location.is_builtin
    }

    /// Hidden packages never show up in user-facing lists or attention sets.
    pub fn is_hidden(&self, location: &InstallLocation) -> bool {
        location.hidden || (self.hidden && self.is_privileged(location) && !location.is_temporary)
    }

    /// Target application entry for `app_id`, falling back to the toolkit entry.
    pub fn matching_target_application(&self, app_id: &str) -> Option<&TargetApplication> {
        let mut toolkit = None;
        for target in &self.target_applications {
            if target.id == app_id {
                return Some(target);
            }
            if target.id == TOOLKIT_ID {
                toolkit = Some(target);
            }
        }
        toolkit
    }

    /// Carries the disable flags and blocklist state of the record being replaced.
    pub fn propagate_disabled_state(&mut self, old: &AddonRecord) {
        self.user_disabled = old.user_disabled;
        self.embedder_disabled = old.embedder_disabled;
        self.soft_disabled = old.soft_disabled;
        self.blocklist_state = old.blocklist_state;
    }

    /// Keeps the identity and provenance of `old` when a package is updated in place.
    pub fn inherit_provenance(&mut self, old: &AddonRecord) {
        self.sync_guid = old.sync_guid.clone();
        self.install_date = old.install_date;
        self.passthrough.apply_background_updates =
            old.passthrough.apply_background_updates.clone();
        self.foreign_install = old.foreign_install;
        self.seen = old.seen;
        self.install_telemetry_info = old.install_telemetry_info.clone();
    }

    /// Re-reads manifest-owned fields into an existing record while keeping
    /// identity, provenance and state flags.
    pub fn refresh_from_manifest(&mut self, manifest: &AddonManifest, keep_target_apps: bool) {
        self.version = manifest.version.clone();
        self.addon_type = manifest.addon_type;
        self.manifest_version = manifest.manifest_version;
        self.loader = manifest.loader.clone();
        self.update_url = manifest.update_url.clone();
        self.install_origins = manifest.install_origins.clone();
        self.strict_compatibility = manifest.strict_compatibility;
        if !keep_target_apps {
            self.target_applications = manifest.target_applications.clone();
        }
        self.target_platforms = manifest.target_platforms.clone();
        self.signed_state = manifest.signed_state;
        self.signed_types = manifest.signed_types.clone();
        self.signed_date = manifest.signed_date;
        self.hidden = manifest.hidden;
        self.admin_install_only = manifest.admin_install_only;

        let apply_background_updates = self.passthrough.apply_background_updates.take();
        let source_uri = self.passthrough.source_uri.take();
        let release_notes_uri = self.passthrough.release_notes_uri.take();
        self.passthrough = manifest.passthrough.clone();
        self.passthrough.apply_background_updates = apply_background_updates;
        self.passthrough.source_uri = source_uri;
        self.passthrough.release_notes_uri = release_notes_uri;
    }
}
