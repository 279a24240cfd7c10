use std::collections::BTreeMap;

use addonstate_core::{AddonManifest, AddonRecord, InstallLocation, ManifestError};
use serde::{Deserialize, Serialize};

/// One package found in an install location during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedAddon {
    pub id: String,
    pub version: String,
    /// Modification time of the package in unix milliseconds.
    pub mtime: u64,
    pub path: String,
    #[serde(rename = "rootURI", default, skip_serializing_if = "Option::is_none")]
    pub root_uri: Option<String>,
    #[serde(default)]
    pub missing: bool,
    /// Enabled state carried over from a previous session's startup cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_enabled: Option<bool>,
}

impl ScannedAddon {
    pub fn new(id: impl Into<String>, version: impl Into<String>, mtime: u64) -> Self {
        let id = id.into();
        Self {
            path: id.clone(),
            id,
            version: version.into(),
            mtime,
            root_uri: None,
            missing: false,
            restored_enabled: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_root_uri(mut self, root_uri: impl Into<String>) -> Self {
        self.root_uri = Some(root_uri.into());
        self
    }
}

/// Enumerates install locations and their contents.
pub trait LocationScanner: Send + Sync {
    /// Configured locations, highest priority first.
    fn locations(&self) -> Vec<InstallLocation>;

    fn scan(&self, location: &InstallLocation) -> anyhow::Result<Vec<ScannedAddon>>;
}

pub trait ManifestLoader: Send + Sync {
    fn load_manifest(
        &self,
        location: &InstallLocation,
        scanned: &ScannedAddon,
    ) -> Result<AddonManifest, ManifestError>;
}

/// Mutating side of an install location.
pub trait LocationInstaller: Send + Sync {
    fn uninstall_addon(&self, location: &InstallLocation, id: &str) -> anyhow::Result<()>;

    /// Ids in a system addon location that must not become visible.
    fn invalid_system_addon_ids(
        &self,
        _location: &InstallLocation,
        _records: &BTreeMap<String, AddonRecord>,
    ) -> Vec<String> {
        Vec::new()
    }
}
