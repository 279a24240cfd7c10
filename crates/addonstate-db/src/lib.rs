mod attention;
mod batch;
mod database;
mod disabled_state;
mod error;
mod lifecycle;
mod reconcile;
mod scanner;
mod services;
mod settings;
mod visibility;

pub use attention::{needs_attention, AttentionInfo, BlocklistAttentionSet};
pub use batch::{for_each_batched, BatchYield, BATCH_SIZE};
pub use database::{AddonDatabase, DisabledChanges};
pub use disabled_state::{BlocklistRefresh, DisabledStateUpdate, DisabledTransition};
pub use error::DatabaseError;
pub use lifecycle::{HookFailure, LifecycleNotifier};
pub use reconcile::{ReconcileOptions, StartupChanges};
pub use scanner::{LocationInstaller, LocationScanner, ManifestLoader, ScannedAddon};
pub use services::{
    BlocklistEntry, BlocklistService, DatabaseServices, SignatureInfo, SignatureVerifier,
};
pub use settings::DatabaseSettings;
pub use visibility::{flatten_by_id, previous_visible, LocationRecords, VisibleSet};
