use std::collections::BTreeSet;
use std::sync::Arc;

use addonstate_core::{AddonRecord, BlocklistState, InstallPolicy, SignedState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleNotifier;
use crate::scanner::{LocationInstaller, LocationScanner, ManifestLoader};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub state: BlocklistState,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait BlocklistService: Send + Sync {
    /// Entry matching `record`, or `None` when it is not blocked.
    async fn entry_for(&self, record: &AddonRecord) -> anyhow::Result<Option<BlocklistEntry>>;
}

/// Result of re-checking a package's signature on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signed_state: Option<SignedState>,
    pub signed_types: Option<BTreeSet<String>>,
    pub admin_install_only: Option<bool>,
}

#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Returns `None` when the package no longer exists on disk.
    async fn verify(&self, record: &AddonRecord) -> anyhow::Result<Option<SignatureInfo>>;
}

/// The collaborators an [`crate::AddonDatabase`] is built with.
#[derive(Clone)]
pub struct DatabaseServices {
    pub scanner: Arc<dyn LocationScanner>,
    pub manifests: Arc<dyn ManifestLoader>,
    pub installer: Arc<dyn LocationInstaller>,
    pub notifier: Arc<dyn LifecycleNotifier>,
    pub blocklist: Arc<dyn BlocklistService>,
    pub signatures: Arc<dyn SignatureVerifier>,
    pub policy: Arc<dyn InstallPolicy>,
}
