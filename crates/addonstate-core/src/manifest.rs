use std::collections::{BTreeSet, HashSet};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AddonType, Passthrough, SignedState, TargetApplication, TargetPlatform};

fn default_manifest_version() -> u32 {
    2
}

/// Package metadata as read from a package's own manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddonManifest {
    pub id: String,
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
    pub strict_compatibility: bool,
    #[serde(default)]
    pub target_applications: Vec<TargetApplication>,
    #[serde(default)]
    pub target_platforms: Vec<TargetPlatform>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_state: Option<SignedState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_types: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_date: Option<u64>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub admin_install_only: bool,
    #[serde(flatten)]
    pub passthrough: Passthrough,
}

impl AddonManifest {
    /// A minimal extension manifest with no targets, dependencies or signature.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            addon_type: AddonType::Extension,
            manifest_version: default_manifest_version(),
            loader: None,
            update_url: None,
            install_origins: None,
            strict_compatibility: false,
            target_applications: Vec::new(),
            target_platforms: Vec::new(),
            dependencies: Vec::new(),
            signed_state: None,
            signed_types: None,
            signed_date: None,
            hidden: false,
            admin_install_only: false,
            passthrough: Passthrough::default(),
        }
    }

    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            serde_json::from_str(input).context("failed to parse addon manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.id.trim().is_empty() {
            return Err(anyhow!("manifest id must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(anyhow!("manifest '{}' has an empty version", self.id));
        }

        let mut seen_dependencies = HashSet::new();
        for dependency in &self.dependencies {
            if dependency == &self.id {
                return Err(anyhow!("manifest '{}' depends on itself", self.id));
            }
            if !seen_dependencies.insert(dependency.as_str()) {
                return Err(anyhow!(
                    "duplicate dependency '{}' in manifest '{}'",
                    dependency,
                    self.id
                ));
            }
        }

        let mut seen_apps = HashSet::new();
        for target in &self.target_applications {
            if target.id.trim().is_empty() {
                return Err(anyhow!(
                    "target application id must not be empty in manifest '{}'",
                    self.id
                ));
            }
            if !seen_apps.insert(target.id.as_str()) {
                return Err(anyhow!(
                    "duplicate target application '{}' in manifest '{}'",
                    target.id,
                    self.id
                ));
            }
        }

        for platform in &self.target_platforms {
            if platform.os.trim().is_empty() {
                return Err(anyhow!(
                    "target platform os must not be empty in manifest '{}'",
                    self.id
                ));
            }
        }

        Ok(())
    }

    /// Rejects a manifest whose id differs from the id the package was found under.
    pub fn expect_id(&self, expected: &str) -> Result<(), ManifestError> {
        if self.id != expected {
            return Err(ManifestError::IdMismatch {
                expected: expected.to_string(),
                found: self.id.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest for '{id}' could not be read: {message}")]
    Unreadable { id: String, message: String },
    #[error("manifest for '{id}' is invalid: {message}")]
    Invalid { id: String, message: String },
    #[error("invalid addon id: expected '{expected}', found '{found}' in manifest")]
    IdMismatch { expected: String, found: String },
    #[error("addon '{id}' is not correctly signed")]
    NotCorrectlySigned { id: String },
    #[error("extension installs are disabled by policy")]
    InstallsDisabledByPolicy,
}

impl ManifestError {
    pub fn invalid(id: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Invalid {
            id: id.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn unreadable(id: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Unreadable {
            id: id.into(),
            message: format!("{err:#}"),
        }
    }
}
