use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::DatabaseSnapshot;

/// Serializes `snapshot` to `tmp_path` and renames it over `path`.
pub fn write_database_atomic(
    path: &Path,
    tmp_path: &Path,
    snapshot: &DatabaseSnapshot,
) -> Result<()> {
    if path.is_dir() {
        bail!("database path '{}' is a directory", path.display());
    }
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string(snapshot).context("failed to serialize addon database")?;
    fs::write(tmp_path, content)
        .with_context(|| format!("failed to write temporary file {}", tmp_path.display()))?;
    fs::rename(tmp_path, path).with_context(|| {
        format!(
            "failed to rename temporary database {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

pub fn write_rebuild_marker(path: &Path) -> Result<()> {
    fs::write(path, "rebuild\n")
        .with_context(|| format!("failed to write rebuild marker {}", path.display()))
}

pub fn clear_rebuild_marker(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to remove rebuild marker {}", path.display())),
    }
}
