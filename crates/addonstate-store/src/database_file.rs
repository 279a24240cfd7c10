use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use addonstate_core::AddonRecord;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub const DB_SCHEMA: u32 = 36;

/// The serialized form of the whole database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSnapshot {
    pub schema_version: u32,
    pub addons: Vec<AddonRecord>,
}

impl DatabaseSnapshot {
    /// Copies every record `keep` accepts into a snapshot at the current schema.
    pub fn build<'a, I, F>(records: I, keep: F) -> Self
    where
        I: IntoIterator<Item = &'a AddonRecord>,
        F: Fn(&AddonRecord) -> bool,
    {
        Self {
            schema_version: DB_SCHEMA,
            addons: records
                .into_iter()
                .filter(|record| keep(*record))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDatabase {
    pub schema_version: u64,
    pub schema_mismatch: bool,
    pub addons: Vec<AddonRecord>,
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("database file {} does not exist", .path.display())]
    Missing { path: PathBuf },
    #[error("failed reading database file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("syntax error in database file {}: {source}", .path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("database file {} is invalid: {reason}", .path.display())]
    Structure { path: PathBuf, reason: String },
    #[error("rebuild requested by marker {}", .path.display())]
    RebuildRequested { path: PathBuf },
}

impl LoadError {
    /// True when the database file simply has not been written yet.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Reads the database file. A pending rebuild marker wins over the file.
pub fn load_database(path: &Path, rebuild_marker: &Path) -> Result<LoadedDatabase, LoadError> {
    if rebuild_marker.exists() {
        return Err(LoadError::RebuildRequested {
            path: rebuild_marker.to_path_buf(),
        });
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(LoadError::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    parse_database(path, &raw)
}

pub fn parse_database(path: &Path, raw: &str) -> Result<LoadedDatabase, LoadError> {
    let value: Value = serde_json::from_str(raw).map_err(|source| LoadError::Syntax {
        path: path.to_path_buf(),
        source,
    })?;

    let structure_error = |reason: &str| LoadError::Structure {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let Value::Object(mut root) = value else {
        return Err(structure_error("top level is not an object"));
    };
    let schema_version = root
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .ok_or_else(|| structure_error("missing schemaVersion"))?;
    let Some(Value::Array(entries)) = root.remove("addons") else {
        return Err(structure_error("missing addons array"));
    };

    let schema_mismatch = schema_version != u64::from(DB_SCHEMA);
    if schema_mismatch {
        warn!(
            expected = DB_SCHEMA,
            actual = schema_version,
            "database schema mismatch; decoding records field by field"
        );
    }

    let total = entries.len();
    let addons: Vec<AddonRecord> = entries.into_iter().filter_map(decode_record).collect();
    let skipped = total - addons.len();
    debug!(
        path = %path.display(),
        loaded = addons.len(),
        skipped,
        "read addon database"
    );

    Ok(LoadedDatabase {
        schema_version,
        schema_mismatch,
        addons,
        skipped,
    })
}

/// Decodes one record, dropping any field that does not decode on its own.
fn decode_record(value: Value) -> Option<AddonRecord> {
    let Value::Object(mut fields) = value else {
        warn!("skipping database entry that is not an object");
        return None;
    };

    let (Some(id), Some(location)) = (
        fields.get("id").filter(|value| value.is_string()).cloned(),
        fields
            .get("location")
            .filter(|value| value.is_string())
            .cloned(),
    ) else {
        warn!("skipping database entry without id or location");
        return None;
    };

    match serde_json::from_value::<AddonRecord>(Value::Object(fields.clone())) {
        Ok(record) => return Some(record),
        Err(err) => debug!(id = %id, error = %err, "record needs field-by-field decoding"),
    }

    let keys: Vec<String> = fields
        .keys()
        .filter(|key| key.as_str() != "id" && key.as_str() != "location")
        .cloned()
        .collect();
    for key in keys {
        let Some(field) = fields.get(&key).cloned() else {
            continue;
        };
        let mut candidate = Map::new();
        candidate.insert("id".to_string(), id.clone());
        candidate.insert("location".to_string(), location.clone());
        candidate.insert(key.clone(), field);
        if serde_json::from_value::<AddonRecord>(Value::Object(candidate)).is_err() {
            warn!(id = %id, field = %key, "dropping undecodable record field");
            fields.remove(&key);
        }
    }

    match serde_json::from_value::<AddonRecord>(Value::Object(fields)) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(id = %id, error = %err, "skipping undecodable database record");
            None
        }
    }
}
