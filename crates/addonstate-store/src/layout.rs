use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Resolves every file the engine keeps inside a profile directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLayout {
    profile: PathBuf,
}

impl ProfileLayout {
    pub fn new(profile: impl Into<PathBuf>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &Path {
        &self.profile
    }

    pub fn database_path(&self) -> PathBuf {
        self.profile.join("extensions.json")
    }

    pub fn database_tmp_path(&self) -> PathBuf {
        self.profile.join("extensions.json.tmp")
    }

    pub fn rebuild_marker_path(&self) -> PathBuf {
        self.profile.join("extensions.rebuild")
    }

    pub fn config_path(&self) -> PathBuf {
        self.profile.join("addonstate.toml")
    }

    pub fn blocklist_path(&self) -> PathBuf {
        self.profile.join("blocklist.json")
    }

    pub fn locations_dir(&self) -> PathBuf {
        self.profile.join("locations")
    }

    pub fn location_dir(&self, name: &str) -> PathBuf {
        self.locations_dir().join(name)
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.profile.clone(), self.locations_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create dir: {}", dir.display()))?;
        }
        Ok(())
    }
}
