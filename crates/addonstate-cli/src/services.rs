use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use addonstate_core::{AddonRecord, BlocklistState};
use addonstate_db::{BlocklistEntry, BlocklistService, DatabaseServices, LifecycleNotifier};
use addonstate_store::ProfileLayout;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::ProfileConfig;
use crate::fs_locations::DirectoryLocations;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct BlocklistFileEntry {
    state: BlocklistState,
    #[serde(default)]
    url: Option<String>,
    /// Blocked versions. Empty blocks every version.
    #[serde(default)]
    versions: Vec<String>,
}

/// Blocklist read once from the profile's `blocklist.json`, keyed by addon id.
#[derive(Debug, Clone, Default)]
pub struct JsonBlocklist {
    entries: BTreeMap<String, BlocklistFileEntry>,
}

impl JsonBlocklist {
    pub fn from_json_str(input: &str) -> Result<Self> {
        let entries = serde_json::from_str(input).context("failed to parse blocklist")?;
        Ok(Self { entries })
    }

    /// Reads `path`. A missing file is an empty blocklist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json_str(&raw)
                .with_context(|| format!("invalid blocklist: {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read blocklist: {}", path.display()))
            }
        }
    }

    pub fn lookup(&self, id: &str, version: &str) -> Option<BlocklistEntry> {
        let entry = self.entries.get(id)?;
        if !entry.versions.is_empty() && !entry.versions.iter().any(|blocked| blocked == version) {
            return None;
        }
        Some(BlocklistEntry {
            state: entry.state,
            url: entry.url.clone(),
        })
    }
}

#[async_trait]
impl BlocklistService for JsonBlocklist {
    async fn entry_for(&self, record: &AddonRecord) -> Result<Option<BlocklistEntry>> {
        Ok(self.lookup(&record.id, &record.version))
    }
}

/// Lifecycle hooks for a command line session: nothing runs, every
/// transition is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl LifecycleNotifier for TracingNotifier {
    fn install(&self, record: &AddonRecord) {
        info!(id = %record.id, version = %record.version, location = %record.location, "install");
    }

    fn uninstall(&self, record: &AddonRecord) {
        info!(id = %record.id, version = %record.version, location = %record.location, "uninstall");
    }

    async fn update(&self, old: &AddonRecord, new: &AddonRecord, restart: bool) -> Result<()> {
        info!(
            id = %new.id,
            old_version = %old.version,
            new_version = %new.version,
            restart,
            "update"
        );
        Ok(())
    }

    async fn enable(&self, record: &AddonRecord) -> Result<()> {
        info!(id = %record.id, "enable");
        Ok(())
    }

    async fn disable(&self, record: &AddonRecord) -> Result<()> {
        info!(id = %record.id, "disable");
        Ok(())
    }
}

pub fn build_services(layout: &ProfileLayout, config: &ProfileConfig) -> Result<DatabaseServices> {
    let locations = Arc::new(DirectoryLocations::new(
        layout.clone(),
        config.install_locations()?,
    ));
    let blocklist = JsonBlocklist::load(&layout.blocklist_path())?;

    Ok(DatabaseServices {
        scanner: locations.clone(),
        manifests: locations.clone(),
        installer: locations.clone(),
        notifier: Arc::new(TracingNotifier),
        blocklist: Arc::new(blocklist),
        signatures: locations,
        policy: Arc::new(config.policy.clone()),
    })
}
