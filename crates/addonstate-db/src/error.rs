use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("no addon is recorded under '{key}'")]
    UnknownAddon { key: String },
    #[error("addon database is shutting down")]
    ShuttingDown,
    #[error("a reconciliation pass is already running")]
    ReconcileInProgress,
    #[error("cannot change the disabled state of system addon '{id}'")]
    SystemAddonProtected { id: String },
    #[error("embedder disabled state can only be changed while embedding")]
    NotEmbedded,
    #[error("user and soft disabled state cannot change in one update")]
    ConflictingDisableUpdate,
    #[error("sync GUID conflict for {key}: {other} already has GUID {guid}")]
    SyncGuidConflict {
        key: String,
        other: String,
        guid: String,
    },
}

impl DatabaseError {
    pub(crate) fn unknown(key: impl ToString) -> Self {
        Self::UnknownAddon {
            key: key.to_string(),
        }
    }
}
