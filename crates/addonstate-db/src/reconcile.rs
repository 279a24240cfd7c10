use std::collections::{BTreeMap, HashMap, HashSet};

use addonstate_core::{
    is_correctly_signed, must_sign, AddonKey, AddonManifest, AddonRecord, AddonType,
    BlocklistState, InstallLocation, InstallTelemetryInfo, ManifestError, KEY_APP_SYSTEM_ADDONS,
    KEY_APP_SYSTEM_BUILTINS,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::database::{recompute_app_disabled, AddonDatabase, ReconcileGuard};
use crate::error::DatabaseError;
use crate::lifecycle::{run_hook_plans, HookCall, HookFailure, HookPlan};
use crate::scanner::ScannedAddon;
use crate::visibility::{flatten_by_id, previous_visible, LocationRecords};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// The application version changed since the last pass.
    pub app_changed: bool,
    /// Manifests staged by installs that completed since the last pass.
    pub staged: BTreeMap<AddonKey, AddonManifest>,
}

/// Ids affected by a reconciliation pass, grouped by what happened to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupChanges {
    pub installed: Vec<String>,
    pub changed: Vec<String>,
    pub uninstalled: Vec<String>,
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    pub failed_hooks: Vec<HookFailure>,
}

impl StartupChanges {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
            && self.changed.is_empty()
            && self.uninstalled.is_empty()
            && self.enabled.is_empty()
            && self.disabled.is_empty()
    }
}

/// Environment of one pass shared by the per-record steps.
struct PassContext<'a> {
    app_changed: bool,
    schema_changed: bool,
    active: &'a HashSet<String>,
}

impl AddonDatabase {
    /// Reconciles the database with what the install locations hold on disk,
    /// recomputes visibility and disabled states and fires lifecycle hooks
    /// for every package whose state changed.
    pub async fn process_file_changes(
        &mut self,
        mut options: ReconcileOptions,
    ) -> Result<StartupChanges, DatabaseError> {
        self.ensure_open("process_file_changes")?;
        let _guard = ReconcileGuard::acquire(&self.reconciling)?;

        let schema_changed = self.schema_changed;
        info!(
            rebuilding = self.rebuilding,
            app_changed = options.app_changed,
            schema_changed,
            "reconciling addon database"
        );

        let active = self.active_ids();
        let ctx = PassContext {
            app_changed: options.app_changed,
            schema_changed,
            active: &active,
        };

        let previous = std::mem::take(&mut self.records);
        let mut previously_visible = previous_visible(previous.values());
        for orphan in std::mem::take(&mut self.orphaned) {
            if orphan.visible {
                previously_visible.insert(orphan.id.clone(), orphan);
            }
        }
        let mut previous = group_by_location(previous);

        let locations = self.locations.clone();
        let mut current = LocationRecords::new();
        let mut added: HashMap<AddonKey, ScannedAddon> = HashMap::new();
        let mut replaced: HashSet<AddonKey> = HashSet::new();

        for location in &locations {
            let known = previous.remove(&location.name).unwrap_or_default();
            let scanned = match self.services.scanner.scan(location) {
                Ok(scanned) => scanned,
                Err(err) => {
                    warn!(
                        location = %location.name,
                        error = %format!("{err:#}"),
                        "failed to scan install location; keeping its records"
                    );
                    current.insert(location.name.clone(), known);
                    continue;
                }
            };
            let scanned: BTreeMap<String, ScannedAddon> = scanned
                .into_iter()
                .map(|state| (state.id.clone(), state))
                .collect();

            let mut records = BTreeMap::new();
            for (id, old) in known {
                let Some(state) = scanned.get(&id).filter(|state| !state.missing) else {
                    self.remove_metadata(&old);
                    continue;
                };
                let staged = options.staged.remove(&old.key());
                if let Some((record, was_replaced)) =
                    self.update_existing(location, old, state, staged, &ctx)
                {
                    if was_replaced {
                        replaced.insert(record.key());
                    }
                    records.insert(id, record);
                }
            }

            for (id, state) in &scanned {
                if state.missing || records.contains_key(id) {
                    continue;
                }
                let key = AddonKey::new(&location.name, id);
                let staged = options.staged.remove(&key);
                let from_staged = staged.is_some();
                if let Some(record) = self.add_metadata(location, id, state, staged, &ctx) {
                    if !from_staged {
                        added.insert(key, state.clone());
                    }
                    records.insert(id.clone(), record);
                }
            }

            if location.is_system_addon_location() {
                for record in records.values_mut() {
                    record.user_disabled = !self.settings.system_addon_enabled(&record.id);
                }
            }
            current.insert(location.name.clone(), records);
        }

        let invalid_system = self.invalid_system_addons(&locations, &current);
        let visible = flatten_by_id(
            &current,
            locations.iter().map(|location| location.name.as_str()),
            |location, id| location == KEY_APP_SYSTEM_ADDONS && invalid_system.contains(id),
        );
        for (location, records) in current.iter_mut() {
            for (id, record) in records.iter_mut() {
                record.visible = visible.is_visible(location, id);
            }
        }
        self.settle_dependencies(&mut current, &locations);

        let mut changes = StartupChanges::default();
        let mut plans = Vec::new();
        for (id, location) in &visible.chosen {
            let Some(record) = current
                .get_mut(location)
                .and_then(|records| records.get_mut(id))
            else {
                continue;
            };
            let key = record.key();

            if let Some(previous) = previously_visible.remove(id) {
                let was_active = previous.is_active();
                let is_active = record.is_active();
                let mut plan = HookPlan::new(id.clone());
                if previous.key() != key || replaced.contains(&key) {
                    changes.changed.push(id.clone());
                    plan.push(HookCall::Update {
                        old: Box::new(previous),
                        new: Box::new(record.clone()),
                        restart: was_active,
                    });
                }
                if was_active != is_active {
                    if is_active {
                        changes.enabled.push(id.clone());
                        plan.push(HookCall::Enable(Box::new(record.clone())));
                    } else {
                        changes.disabled.push(id.clone());
                        plan.push(HookCall::Disable(Box::new(record.clone())));
                    }
                }
                if !plan.is_empty() {
                    plans.push(plan);
                }
                continue;
            }

            match added.get(&key).and_then(|state| state.restored_enabled) {
                Some(enabled) => {
                    debug!(key = %key, enabled, "restoring enabled state of known addon");
                    restore_enabled_state(record, enabled);
                }
                None => {
                    changes.installed.push(id.clone());
                    self.services.notifier.install(record);
                }
            }
        }

        for (id, previous) in previously_visible {
            if self
                .location(&previous.location)
                .is_some_and(|location| location.is_builtin_name())
            {
                continue;
            }
            if self.location(&previous.location).is_some() {
                self.services.notifier.uninstall(&previous);
            }
            changes.uninstalled.push(id);
        }

        self.records = current
            .into_values()
            .flat_map(BTreeMap::into_values)
            .map(|record| (record.key(), record))
            .collect();
        self.rebuild_attention();

        let rebuilt = std::mem::replace(&mut self.rebuilding, false);
        self.schema_changed = false;
        self.save_changes();
        if rebuilt {
            self.writer.finalize().await;
            if let Some(err) = self.writer.last_error() {
                error!(error = %err, "failed to save rebuilt addon database");
            }
        }

        changes.failed_hooks = run_hook_plans(&*self.services.notifier, plans).await;

        if ctx.app_changed || ctx.schema_changed {
            let keys: Vec<AddonKey> = self.records.keys().cloned().collect();
            let refreshed = self.refresh_blocklist_states(keys).await?;
            if !refreshed.is_empty() {
                debug!(count = refreshed.len(), "blocklist states changed after update");
            }
        }

        info!(
            installed = changes.installed.len(),
            changed = changes.changed.len(),
            uninstalled = changes.uninstalled.len(),
            enabled = changes.enabled.len(),
            disabled = changes.disabled.len(),
            failed_hooks = changes.failed_hooks.len(),
            "reconciled addon database"
        );
        Ok(changes)
    }

    /// Decides how a record that is still on disk must be refreshed.
    /// Returns the record and whether it was rebuilt from a new manifest.
    fn update_existing(
        &self,
        location: &InstallLocation,
        old: AddonRecord,
        state: &ScannedAddon,
        staged: Option<AddonManifest>,
        ctx: &PassContext<'_>,
    ) -> Option<(AddonRecord, bool)> {
        let builtin_changed = location.name == KEY_APP_SYSTEM_BUILTINS
            && (old.version != state.version || old.root_uri != state.root_uri);
        let needs_metadata = staged.is_some()
            || old.update_date != state.mtime
            || (ctx.app_changed && location.is_app_bundled())
            || builtin_changed;

        let (mut record, replaced) = if needs_metadata {
            (self.update_metadata(location, old, state, staged, ctx)?, true)
        } else if old.path != state.path {
            (update_path(old, state), false)
        } else if ctx.app_changed || ctx.schema_changed {
            (self.update_compatibility(location, old, state, ctx), false)
        } else {
            (old, false)
        };

        if record.root_uri.is_none() {
            record.root_uri = state.root_uri.clone();
        }
        Some((record, replaced))
    }

    fn remove_metadata(&mut self, old: &AddonRecord) {
        debug!(id = %old.id, location = %old.location, "addon removed from disk");
        self.attention.remove(&old.id);
    }

    fn add_metadata(
        &self,
        location: &InstallLocation,
        id: &str,
        state: &ScannedAddon,
        staged: Option<AddonManifest>,
        ctx: &PassContext<'_>,
    ) -> Option<AddonRecord> {
        debug!(id, location = %location.name, "new addon found");
        let is_new_install = staged.is_some() || !self.rebuilding;
        let is_detected = is_new_install && staged.is_none();

        let mut record = match self.load_new_addon(location, id, state, staged, is_detected) {
            Ok(record) => record,
            Err(err) => {
                warn!(id, location = %location.name, error = %err, "addon is invalid");
                let unsigned = matches!(err, ManifestError::NotCorrectlySigned { .. });
                if location.is_builtin_name() {
                    debug!(id, "dropping builtin addon that failed to load");
                } else if location.is_linked_addon(id) {
                    warn!(id, "not uninstalling invalid addon because it is a link");
                } else if location.locked {
                    warn!(
                        id,
                        location = %location.name,
                        "cannot uninstall invalid addon from locked location"
                    );
                } else if unsigned && !is_new_install {
                    warn!(id, "not uninstalling existing unsigned addon");
                } else if let Err(err) = self.services.installer.uninstall_addon(location, id) {
                    warn!(id, error = %format!("{err:#}"), "failed to uninstall invalid addon");
                }
                return None;
            }
        };

        record.install_date = state.mtime;
        record.update_date = state.mtime;
        record.path = state.path.clone();
        record.root_uri = state.root_uri.clone();
        record.foreign_install = is_detected && !location.is_system && !location.is_builtin;

        if record.foreign_install {
            record.install_telemetry_info = Some(InstallTelemetryInfo::sideload(&location.name));
            if location.scope.intersects(self.settings.auto_disabled_scopes) {
                warn!(id, location = %location.name, "disabling foreign installed addon");
                record.user_disabled = true;
                record.seen = false;
            }
        }

        recompute_app_disabled(
            &self.settings,
            &*self.services.policy,
            &mut record,
            location,
            ctx.active,
        );
        Some(record)
    }

    fn load_new_addon(
        &self,
        location: &InstallLocation,
        id: &str,
        state: &ScannedAddon,
        staged: Option<AddonManifest>,
        is_detected: bool,
    ) -> Result<AddonRecord, ManifestError> {
        if is_detected && !self.services.policy.allows_extension_installs() {
            return Err(ManifestError::InstallsDisabledByPolicy);
        }
        let manifest = match staged {
            Some(manifest) => manifest,
            None => self.services.manifests.load_manifest(location, state)?,
        };
        manifest.expect_id(id)?;

        let record = AddonRecord::from_manifest(manifest, &location.name);
        if must_sign(record.addon_type, &self.settings.compat)
            && !is_correctly_signed(&record, location, &self.settings.app)
        {
            return Err(ManifestError::NotCorrectlySigned { id: id.to_string() });
        }
        Ok(record)
    }

    fn update_metadata(
        &self,
        location: &InstallLocation,
        old: AddonRecord,
        state: &ScannedAddon,
        staged: Option<AddonManifest>,
        ctx: &PassContext<'_>,
    ) -> Option<AddonRecord> {
        debug!(id = %old.id, location = %location.name, "addon modified");
        let from_staged = staged.is_some();
        let loaded = match staged {
            Some(manifest) => Ok(manifest),
            None => self.services.manifests.load_manifest(location, state),
        };
        let checked = loaded.and_then(|manifest| manifest.expect_id(&old.id).map(|()| manifest));
        let manifest = match checked {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(
                    id = %old.id,
                    location = %location.name,
                    error = %err,
                    "modified addon is invalid"
                );
                if location.locked {
                    warn!(id = %old.id, "cannot uninstall invalid addon from locked location");
                } else if let Err(err) = self.services.installer.uninstall_addon(location, &old.id)
                {
                    warn!(
                        id = %old.id,
                        error = %format!("{err:#}"),
                        "failed to uninstall invalid addon"
                    );
                }
                return None;
            }
        };

        let mut record = AddonRecord::from_manifest(manifest, &location.name);
        record.root_uri = if from_staged {
            old.root_uri.clone()
        } else {
            state.root_uri.clone()
        };
        record.path = state.path.clone();
        record.update_date = state.mtime;
        record.visible = old.visible;
        record.blocklist_url = old.blocklist_url.clone();
        record.blocklist_attention_dismissed = old.blocklist_attention_dismissed;
        record.propagate_disabled_state(&old);
        record.inherit_provenance(&old);

        recompute_app_disabled(
            &self.settings,
            &*self.services.policy,
            &mut record,
            location,
            ctx.active,
        );
        Some(record)
    }

    /// Refreshes the signing and compatibility fields of an unchanged package
    /// after the application or the database schema changed.
    fn update_compatibility(
        &self,
        location: &InstallLocation,
        mut record: AddonRecord,
        state: &ScannedAddon,
        ctx: &PassContext<'_>,
    ) -> AddonRecord {
        let check_signing = record.signed_state.is_none() && record.addon_type.is_signed_type();
        let date_missing = record.signed_date.is_none()
            && (record.signed_state.is_some() || check_signing);
        let types_missing = record.signed_types.is_none()
            && (record.signed_state.is_some() || check_signing);
        let open_ended_locale = record.addon_type == AddonType::Locale
            && record
                .matching_target_application(&self.settings.app.id)
                .and_then(|target| target.max_version.as_deref())
                == Some("*");

        if check_signing || date_missing || types_missing || open_ended_locale {
            match self.services.manifests.load_manifest(location, state) {
                Ok(manifest) => {
                    if check_signing {
                        record.signed_state = manifest.signed_state;
                    }
                    if date_missing {
                        record.signed_date = manifest.signed_date;
                    }
                    if types_missing {
                        record.signed_types = manifest.signed_types.clone();
                    }
                    if open_ended_locale {
                        let keep_target_apps = record.addon_type != AddonType::Locale;
                        record.refresh_from_manifest(&manifest, keep_target_apps);
                    }
                }
                Err(err) => {
                    warn!(
                        id = %record.id,
                        error = %err,
                        "failed to reload manifest during compatibility update"
                    );
                    record.mark_broken_manifest();
                    return record;
                }
            }
        }

        debug!(id = %record.id, "updating compatibility");
        recompute_app_disabled(
            &self.settings,
            &*self.services.policy,
            &mut record,
            location,
            ctx.active,
        );
        record
    }

    fn invalid_system_addons(
        &self,
        locations: &[InstallLocation],
        current: &LocationRecords,
    ) -> HashSet<String> {
        let Some(location) = locations
            .iter()
            .find(|location| location.name == KEY_APP_SYSTEM_ADDONS)
        else {
            return HashSet::new();
        };
        let Some(records) = current.get(&location.name) else {
            return HashSet::new();
        };
        let invalid = self
            .services
            .installer
            .invalid_system_addon_ids(location, records);
        if !invalid.is_empty() {
            info!(ids = %invalid.join(", "), "hiding invalid system addons");
        }
        invalid.into_iter().collect()
    }

    /// Re-evaluates records with dependencies until their disabled states
    /// stop changing.
    fn settle_dependencies(&self, current: &mut LocationRecords, locations: &[InstallLocation]) {
        let limit = current.values().map(BTreeMap::len).sum::<usize>() + 1;
        for _ in 0..limit {
            let active: HashSet<String> = current
                .values()
                .flat_map(BTreeMap::values)
                .filter(|record| record.is_active())
                .map(|record| record.id.clone())
                .collect();

            let mut changed = false;
            for location in locations {
                let Some(records) = current.get_mut(&location.name) else {
                    continue;
                };
                for record in records
                    .values_mut()
                    .filter(|record| !record.dependencies().is_empty())
                {
                    let before = record.app_disabled();
                    recompute_app_disabled(
                        &self.settings,
                        &*self.services.policy,
                        record,
                        location,
                        &active,
                    );
                    changed |= before != record.app_disabled();
                }
            }
            if !changed {
                return;
            }
        }
        warn!("dependency disabled states did not settle");
    }
}

fn update_path(mut record: AddonRecord, state: &ScannedAddon) -> AddonRecord {
    debug!(id = %record.id, path = %state.path, "addon moved");
    record.path = state.path.clone();
    if let Some(root_uri) = &state.root_uri {
        record.root_uri = Some(root_uri.clone());
    }
    record
}

/// Applies an enabled state remembered from a previous session to a package
/// that is new to the database.
fn restore_enabled_state(record: &mut AddonRecord, enabled: bool) {
    if record.addon_type == AddonType::Theme && record.is_web_extension() {
        record.user_disabled = !enabled;
    }
    if !enabled && !record.disabled() {
        if record.blocklist_state == BlocklistState::SoftBlocked {
            record.soft_disabled = true;
        } else {
            record.user_disabled = true;
        }
    }
}

fn group_by_location(records: BTreeMap<AddonKey, AddonRecord>) -> LocationRecords {
    let mut grouped = LocationRecords::new();
    for record in records.into_values() {
        grouped
            .entry(record.location.clone())
            .or_default()
            .insert(record.id.clone(), record);
    }
    grouped
}
