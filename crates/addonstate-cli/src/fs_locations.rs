use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use addonstate_core::{AddonManifest, AddonRecord, InstallLocation, ManifestError, SignedState};
use addonstate_db::{
    LocationInstaller, LocationScanner, ManifestLoader, ScannedAddon, SignatureInfo,
    SignatureVerifier,
};
use addonstate_store::ProfileLayout;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Install locations backed by `<profile>/locations/<location>/<id>/manifest.json`.
#[derive(Debug, Clone)]
pub struct DirectoryLocations {
    layout: ProfileLayout,
    locations: Vec<InstallLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ManifestHead {
    version: String,
}

impl DirectoryLocations {
    pub fn new(layout: ProfileLayout, locations: Vec<InstallLocation>) -> Self {
        Self { layout, locations }
    }

    pub fn package_dir(&self, location: &str, id: &str) -> PathBuf {
        self.layout.location_dir(location).join(id)
    }

    fn manifest_path(&self, location: &str, id: &str) -> PathBuf {
        self.package_dir(location, id).join(MANIFEST_FILE)
    }
}

impl LocationScanner for DirectoryLocations {
    fn locations(&self) -> Vec<InstallLocation> {
        self.locations.clone()
    }

    fn scan(&self, location: &InstallLocation) -> Result<Vec<ScannedAddon>> {
        let dir = self.layout.location_dir(&location.name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(location = %location.name, "location directory does not exist");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read location: {}", dir.display()));
            }
        };

        let mut scanned = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read location entry in {}", dir.display()))?;
            let package_dir = entry.path();
            if !package_dir.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %package_dir.display(), "skipping package with non-UTF-8 name");
                continue;
            };
            if id.starts_with('.') {
                continue;
            }
            let manifest_path = package_dir.join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                debug!(location = %location.name, id = %id, "skipping directory without manifest");
                continue;
            }

            let mtime = modified_millis(&manifest_path)?;
            let version = read_manifest_head(&manifest_path)
                .map(|head| head.version)
                .unwrap_or_default();
            scanned.push(
                ScannedAddon::new(&id, version, mtime).with_root_uri(file_uri(&package_dir)),
            );
        }

        scanned.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(scanned)
    }
}

impl ManifestLoader for DirectoryLocations {
    fn load_manifest(
        &self,
        location: &InstallLocation,
        scanned: &ScannedAddon,
    ) -> Result<AddonManifest, ManifestError> {
        let path = self.manifest_path(&location.name, &scanned.id);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))
            .map_err(|err| ManifestError::unreadable(&scanned.id, &err))?;
        let manifest = AddonManifest::from_json_str(&raw)
            .map_err(|err| ManifestError::invalid(&scanned.id, &err))?;
        manifest.expect_id(&scanned.id)?;
        Ok(manifest)
    }
}

impl LocationInstaller for DirectoryLocations {
    fn uninstall_addon(&self, location: &InstallLocation, id: &str) -> Result<()> {
        if location.locked {
            return Err(anyhow!(
                "cannot uninstall '{id}' from locked location '{}'",
                location.name
            ));
        }
        let dir = self.package_dir(&location.name, id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove package: {}", dir.display()))
            }
        }
    }

    fn invalid_system_addon_ids(
        &self,
        _location: &InstallLocation,
        records: &BTreeMap<String, AddonRecord>,
    ) -> Vec<String> {
        records
            .values()
            .filter(|record| record.signed_state != Some(SignedState::System))
            .map(|record| record.id.clone())
            .collect()
    }
}

#[async_trait]
impl SignatureVerifier for DirectoryLocations {
    async fn verify(&self, record: &AddonRecord) -> Result<Option<SignatureInfo>> {
        let path = self.manifest_path(&record.location, &record.id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read manifest: {}", path.display()));
            }
        };
        let manifest = AddonManifest::from_json_str(&raw)
            .with_context(|| format!("invalid manifest: {}", path.display()))?;

        Ok(Some(SignatureInfo {
            signed_state: manifest.signed_state,
            signed_types: manifest.signed_types,
            admin_install_only: Some(manifest.admin_install_only),
        }))
    }
}

fn read_manifest_head(path: &Path) -> Option<ManifestHead> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn modified_millis(path: &Path) -> Result<u64> {
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .with_context(|| format!("failed to stat manifest: {}", path.display()))?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    Ok(u64::try_from(millis).unwrap_or(u64::MAX))
}

fn file_uri(dir: &Path) -> String {
    let display = dir.display().to_string().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{display}/")
    } else {
        format!("file:///{display}/")
    }
}
