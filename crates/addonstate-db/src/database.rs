use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use addonstate_core::{
    AddonKey, AddonRecord, AddonType, AddonView, CompatContext, CompatSettings, DisableReason,
    InstallLocation, InstallPolicy, Permissions,
};
use addonstate_store::{load_database, DatabaseSnapshot, ProfileLayout, SaveScheduler};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::attention::{needs_attention, AttentionInfo, BlocklistAttentionSet};
use crate::batch::{for_each_batched, BatchYield, BATCH_SIZE};
use crate::disabled_state::DisabledTransition;
use crate::error::DatabaseError;
use crate::services::DatabaseServices;
use crate::settings::DatabaseSettings;

/// Ids whose disabled state flipped during a bulk recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisabledChanges {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

/// The in-memory addon database of one profile.
///
/// Owns every record, the configured install locations and the background
/// writer. All mutation goes through `&mut self`; after
/// [`AddonDatabase::shutdown`] further mutations fail with
/// [`DatabaseError::ShuttingDown`].
pub struct AddonDatabase {
    pub(crate) settings: DatabaseSettings,
    pub(crate) services: DatabaseServices,
    pub(crate) locations: Vec<InstallLocation>,
    pub(crate) records: BTreeMap<AddonKey, AddonRecord>,
    pub(crate) orphaned: Vec<AddonRecord>,
    pub(crate) attention: BlocklistAttentionSet,
    pub(crate) writer: SaveScheduler,
    pub(crate) rebuilding: bool,
    pub(crate) schema_changed: bool,
    pub(crate) load_error: Option<String>,
    pub(crate) reconciling: Arc<AtomicBool>,
    pub(crate) shutting_down: bool,
}

impl AddonDatabase {
    /// Loads the profile's database, or starts an empty rebuild when it
    /// cannot be loaded.
    pub async fn open(
        layout: ProfileLayout,
        settings: DatabaseSettings,
        services: DatabaseServices,
    ) -> Self {
        let locations = services.scanner.locations();
        let writer = SaveScheduler::spawn(&layout, settings.save_delay);
        let mut database = Self {
            settings,
            services,
            locations,
            records: BTreeMap::new(),
            orphaned: Vec::new(),
            attention: BlocklistAttentionSet::new(),
            writer,
            rebuilding: false,
            schema_changed: false,
            load_error: None,
            reconciling: Arc::new(AtomicBool::new(false)),
            shutting_down: false,
        };

        let path = layout.database_path();
        let marker = layout.rebuild_marker_path();
        let loaded = tokio::task::spawn_blocking(move || load_database(&path, &marker)).await;
        match loaded {
            Ok(Ok(loaded)) => {
                database.schema_changed = loaded.schema_mismatch;
                database.hydrate(loaded.addons).await;
            }
            Ok(Err(err)) if err.is_missing() => {
                info!(profile = %layout.profile().display(), "no addon database yet; building one");
                database.rebuilding = true;
            }
            Ok(Err(err)) => {
                warn!(error = %err, "failed to load addon database; rebuilding");
                database.load_error = Some(err.to_string());
                database.rebuilding = true;
            }
            Err(err) => {
                warn!(error = %err, "addon database load task failed; rebuilding");
                database.load_error = Some(format!("database load task failed: {err}"));
                database.rebuilding = true;
            }
        }

        database
    }

    async fn hydrate(&mut self, addons: Vec<AddonRecord>) {
        let known: HashSet<String> = self
            .locations
            .iter()
            .map(|location| location.name.clone())
            .collect();
        let records = &mut self.records;
        let orphaned = &mut self.orphaned;
        let loaded = for_each_batched(addons, BATCH_SIZE, |record| {
            if !known.contains(&record.location) {
                debug!(
                    id = %record.id,
                    location = %record.location,
                    "keeping record of unknown location aside"
                );
                orphaned.push(record);
                return;
            }
            let key = record.key();
            if records.contains_key(&key) {
                warn!(key = %key, "duplicate database entry; keeping the first");
                return;
            }
            records.insert(key, record);
        })
        .await;
        debug!(loaded, orphaned = self.orphaned.len(), "hydrated addon database");
        self.rebuild_attention();
    }

    /// Flushes pending writes. A failed last write is retried once first.
    pub async fn shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;
        debug!("shutting down addon database");

        if self.writer.last_error().is_some() {
            info!("retrying failed database save before shutdown");
            self.save_changes();
        }
        self.writer.finalize().await;
        if let Some(err) = self.writer.last_error() {
            error!(
                error = %err,
                "addon database was not saved; it will be rebuilt on next startup"
            );
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding
    }

    /// The most recent save error, or the load error that forced a rebuild.
    pub fn last_error(&self) -> Option<String> {
        self.writer
            .last_error()
            .map(|err| err.to_string())
            .or_else(|| self.load_error.clone())
    }

    pub async fn flush(&self) {
        self.writer.finalize().await;
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    pub fn locations(&self) -> &[InstallLocation] {
        &self.locations
    }

    pub fn location(&self, name: &str) -> Option<&InstallLocation> {
        self.locations.iter().find(|location| location.name == name)
    }

    pub fn orphaned(&self) -> &[AddonRecord] {
        &self.orphaned
    }

    pub fn records(&self) -> impl Iterator<Item = &AddonRecord> {
        self.records.values()
    }

    pub fn get(&self, key: &AddonKey) -> Option<&AddonRecord> {
        self.records.get(key)
    }

    pub fn get_in_location(&self, location: &str, id: &str) -> Option<&AddonRecord> {
        self.records.get(&AddonKey::new(location, id))
    }

    pub fn visible_addon(&self, id: &str) -> Option<&AddonRecord> {
        self.records
            .values()
            .find(|record| record.id == id && record.visible)
    }

    pub fn by_sync_guid(&self, guid: &str) -> Option<&AddonRecord> {
        self.records
            .values()
            .find(|record| record.sync_guid.as_deref() == Some(guid))
    }

    pub fn addons_by_type(&self, addon_type: AddonType) -> Vec<&AddonRecord> {
        self.records
            .values()
            .filter(|record| record.addon_type == addon_type)
            .collect()
    }

    pub fn addons_in_location(&self, location: &str) -> Vec<&AddonRecord> {
        self.records
            .values()
            .filter(|record| record.location == location)
            .collect()
    }

    /// Visible records, optionally limited to `types`.
    pub fn visible_addons(&self, types: Option<&[AddonType]>) -> Vec<&AddonRecord> {
        self.records
            .values()
            .filter(|record| record.visible)
            .filter(|record| types.map_or(true, |types| types.contains(&record.addon_type)))
            .collect()
    }

    pub fn visible_with_pending_uninstall(&self, types: Option<&[AddonType]>) -> Vec<&AddonRecord> {
        self.visible_addons(types)
            .into_iter()
            .filter(|record| record.pending_uninstall)
            .collect()
    }

    pub fn active_theme_id(&self) -> Option<&str> {
        self.records
            .values()
            .find(|record| record.addon_type == AddonType::Theme && record.is_active())
            .map(|record| record.id.as_str())
    }

    pub fn view(&self, key: &AddonKey) -> Option<AddonView<'_>> {
        let record = self.records.get(key)?;
        let location = self.location(&record.location)?;
        Some(AddonView::new(record, location))
    }

    pub fn permissions(&self, key: &AddonKey) -> Option<Permissions> {
        let view = self.view(key)?;
        Some(view.permissions(&*self.services.policy, self.settings.sideload_scopes))
    }

    pub fn set_sync_guid(&mut self, key: &AddonKey, guid: &str) -> Result<(), DatabaseError> {
        self.ensure_open("set_sync_guid")?;
        if !self.records.contains_key(key) {
            return Err(DatabaseError::unknown(key));
        }
        if let Some(other) = self
            .records
            .values()
            .find(|record| record.key() != *key && record.sync_guid.as_deref() == Some(guid))
        {
            return Err(DatabaseError::SyncGuidConflict {
                key: key.to_string(),
                other: other.key().to_string(),
                guid: guid.to_string(),
            });
        }

        if let Some(record) = self.records.get_mut(key) {
            record.sync_guid = Some(guid.to_string());
        }
        self.save_changes();
        Ok(())
    }

    pub fn mark_seen(&mut self, key: &AddonKey) -> Result<(), DatabaseError> {
        self.ensure_open("mark_seen")?;
        let record = self
            .records
            .get_mut(key)
            .ok_or_else(|| DatabaseError::unknown(key))?;
        if !record.seen {
            record.seen = true;
            self.save_changes();
        }
        Ok(())
    }

    pub fn attention_info(&self) -> AttentionInfo {
        let keys = self.attention_records();
        AttentionInfo::from_records(keys.iter().filter_map(|key| self.records.get(key)))
    }

    pub fn attention(&self) -> &BlocklistAttentionSet {
        &self.attention
    }

    /// Marks every package currently needing blocklist attention as acknowledged.
    pub fn dismiss_blocklist_attention(&mut self) -> Result<Vec<String>, DatabaseError> {
        self.ensure_open("dismiss_blocklist_attention")?;
        let keys = self.attention_records();
        let mut dismissed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.records.get_mut(&key) {
                record.blocklist_attention_dismissed = true;
                dismissed.push(record.id.clone());
            }
            self.recompute_attention(&key);
        }
        if !dismissed.is_empty() {
            self.save_changes();
        }
        Ok(dismissed)
    }

    fn attention_records(&self) -> Vec<AddonKey> {
        if self.attention.is_empty() {
            return Vec::new();
        }
        self.records
            .iter()
            .filter(|(_, record)| self.attention.contains(&record.id))
            .filter(|(_, record)| needs_attention(record, self.is_hidden(record)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Re-checks every package's signature and updates disabled states.
    pub async fn verify_signatures(&mut self) -> Result<DisabledChanges, DatabaseError> {
        self.ensure_open("verify_signatures")?;
        let keys: Vec<AddonKey> = self.records.keys().cloned().collect();
        let mut changes = DisabledChanges::default();
        let mut batch = BatchYield::default();

        for key in keys {
            batch.tick().await;
            let Some(snapshot) = self.records.get(&key).cloned() else {
                continue;
            };
            let info = match self.services.signatures.verify(&snapshot).await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    debug!(key = %key, "package vanished before signature check");
                    continue;
                }
                Err(err) => {
                    warn!(key = %key, error = %format!("{err:#}"), "signature check failed");
                    continue;
                }
            };

            let Some(record) = self.records.get_mut(&key) else {
                continue;
            };
            if record.signed_state != info.signed_state {
                debug!(key = %key, "signed state changed");
                record.signed_state = info.signed_state;
            }
            if let Some(admin_install_only) = info.admin_install_only {
                record.admin_install_only = admin_install_only;
            }
            if record.signed_types != info.signed_types {
                record.signed_types = info.signed_types;
            }

            match self.update_disabled_state(&key, Default::default()).await? {
                DisabledTransition::Disabled => changes.disabled.push(snapshot.id),
                DisabledTransition::Enabled => changes.enabled.push(snapshot.id),
                DisabledTransition::Unchanged => {}
            }
        }

        self.save_changes();
        info!(
            enabled = changes.enabled.len(),
            disabled = changes.disabled.len(),
            "verified addon signatures"
        );
        Ok(changes)
    }

    pub(crate) fn ensure_open(&self, operation: &'static str) -> Result<(), DatabaseError> {
        if self.shutting_down {
            warn!(operation, "rejecting addon database change after shutdown");
            return Err(DatabaseError::ShuttingDown);
        }
        Ok(())
    }

    pub(crate) fn save_changes(&self) {
        let temporary: HashSet<&str> = self
            .locations
            .iter()
            .filter(|location| location.is_temporary)
            .map(|location| location.name.as_str())
            .collect();
        self.writer.save(DatabaseSnapshot::build(self.records.values(), |record| {
            !temporary.contains(record.location.as_str())
        }));
    }

    pub(crate) fn is_hidden(&self, record: &AddonRecord) -> bool {
        self.location(&record.location)
            .is_some_and(|location| record.is_hidden(location))
    }

    /// Ids of visible, active records.
    pub(crate) fn active_ids(&self) -> HashSet<String> {
        self.records
            .values()
            .filter(|record| record.is_active())
            .map(|record| record.id.clone())
            .collect()
    }

    pub(crate) fn recompute_attention(&mut self, key: &AddonKey) {
        let Some(record) = self.records.get(key) else {
            return;
        };
        let hidden = self
            .locations
            .iter()
            .find(|location| location.name == record.location)
            .is_some_and(|location| record.is_hidden(location));
        self.attention.recompute(record, hidden);
    }

    pub(crate) fn rebuild_attention(&mut self) {
        self.attention.clear();
        let keys: Vec<AddonKey> = self.records.keys().cloned().collect();
        for key in keys {
            self.recompute_attention(&key);
        }
    }
}

/// Recomputes `app_disabled` for `record` against the database's environment.
pub(crate) fn recompute_app_disabled(
    settings: &DatabaseSettings,
    policy: &dyn InstallPolicy,
    record: &mut AddonRecord,
    location: &InstallLocation,
    active: &HashSet<String>,
) -> Option<DisableReason> {
    let dependencies = |id: &str| active.contains(id);
    let ctx = CompatContext {
        app: &settings.app,
        settings: &settings.compat,
        policy,
        dependencies: &dependencies,
    };
    let reason = record.refresh_app_disabled(location, &ctx);
    if let Some(reason) = &reason {
        debug!(
            id = %record.id,
            location = %location.name,
            reason = %reason,
            "addon is app disabled"
        );
        if signed_with_dev_root(&settings.compat, reason) {
            warn!(
                id = %record.id,
                "signature check failed while the dev root override is set"
            );
        }
    }
    reason
}

/// Whether a signing failure happened with the development signing root enabled.
pub(crate) fn signed_with_dev_root(compat: &CompatSettings, reason: &DisableReason) -> bool {
    compat.dev_root && *reason == DisableReason::NotCorrectlySigned
}

pub(crate) struct ReconcileGuard(Arc<AtomicBool>);

impl ReconcileGuard {
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, DatabaseError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| DatabaseError::ReconcileInProgress)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for ReconcileGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
