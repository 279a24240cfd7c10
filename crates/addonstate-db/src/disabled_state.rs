use addonstate_core::{AddonKey, AddonType, BlocklistState, DEFAULT_THEME_ID};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::batch::BatchYield;
use crate::database::{recompute_app_disabled, AddonDatabase, DisabledChanges};
use crate::error::DatabaseError;

/// Requested changes to the independently tracked disable flags. `None`
/// keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisabledStateUpdate {
    pub user_disabled: Option<bool>,
    pub soft_disabled: Option<bool>,
    pub embedder_disabled: Option<bool>,
    /// Set while switching themes, so disabling the old theme does not
    /// fall back to the default one.
    pub because_selecting: bool,
}

impl DisabledStateUpdate {
    pub fn user(disabled: bool) -> Self {
        Self {
            user_disabled: Some(disabled),
            ..Self::default()
        }
    }

    pub fn soft(disabled: bool) -> Self {
        Self {
            soft_disabled: Some(disabled),
            ..Self::default()
        }
    }

    pub fn embedder(disabled: bool) -> Self {
        Self {
            embedder_disabled: Some(disabled),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisabledTransition {
    Disabled,
    Enabled,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlocklistRefresh {
    pub old_state: BlocklistState,
    pub new_state: BlocklistState,
    pub transition: DisabledTransition,
}

impl BlocklistRefresh {
    fn unchanged(state: BlocklistState) -> Self {
        Self {
            old_state: state,
            new_state: state,
            transition: DisabledTransition::Unchanged,
        }
    }
}

impl AddonDatabase {
    /// Applies `update`, recomputes `app_disabled` and fires the enable or
    /// disable hook when the package's active state flips.
    pub async fn update_disabled_state(
        &mut self,
        key: &AddonKey,
        update: DisabledStateUpdate,
    ) -> Result<DisabledTransition, DatabaseError> {
        self.ensure_open("update_disabled_state")?;
        let transition = self.apply_disabled_state(key, update).await?;

        let Some(record) = self.records.get(key) else {
            return Ok(transition);
        };
        if record.addon_type == AddonType::Theme && !update.because_selecting {
            match transition {
                DisabledTransition::Enabled => {
                    let id = record.id.clone();
                    self.select_theme(Some(&id)).await?;
                }
                DisabledTransition::Disabled => self.select_theme(None).await?,
                DisabledTransition::Unchanged => {}
            }
        }
        Ok(transition)
    }

    async fn apply_disabled_state(
        &mut self,
        key: &AddonKey,
        update: DisabledStateUpdate,
    ) -> Result<DisabledTransition, DatabaseError> {
        if update.user_disabled.is_some() && update.soft_disabled.is_some() {
            return Err(DatabaseError::ConflictingDisableUpdate);
        }

        let record = self
            .records
            .get(key)
            .ok_or_else(|| DatabaseError::unknown(key))?;
        let location = self
            .location(&record.location)
            .cloned()
            .ok_or_else(|| DatabaseError::unknown(key))?;

        let user_disabled = update.user_disabled.unwrap_or(record.user_disabled);
        let soft_disabled = match update.soft_disabled {
            _ if update.user_disabled == Some(false) => false,
            Some(soft) if !user_disabled => soft,
            _ => record.soft_disabled,
        };
        let embedder_disabled = if self.settings.is_embedded {
            update
                .embedder_disabled
                .unwrap_or(record.embedder_disabled)
        } else {
            false
        };

        let active = self.active_ids();
        let Some(record) = self.records.get_mut(key) else {
            return Err(DatabaseError::unknown(key));
        };
        let before = (
            record.user_disabled,
            record.soft_disabled,
            record.embedder_disabled,
            record.app_disabled(),
        );
        let was_disabled = record.disabled();
        let was_active = record.is_active();

        record.user_disabled = user_disabled;
        record.soft_disabled = soft_disabled;
        record.embedder_disabled = embedder_disabled;
        recompute_app_disabled(
            &self.settings,
            &*self.services.policy,
            record,
            &location,
            &active,
        );

        let after = (
            record.user_disabled,
            record.soft_disabled,
            record.embedder_disabled,
            record.app_disabled(),
        );
        if before == after {
            return Ok(DisabledTransition::Unchanged);
        }
        if before.3 != after.3 {
            debug!(key = %key, app_disabled = after.3, "app disabled state changed");
        }

        let is_disabled = record.disabled();
        let is_active = record.is_active();
        let visible = record.visible;
        let snapshot = record.clone();
        self.save_changes();
        self.recompute_attention(key);

        if !visible || was_disabled == is_disabled {
            return Ok(DisabledTransition::Unchanged);
        }

        info!(key = %key, disabled = is_disabled, "addon disabled state changed");
        if was_active != is_active {
            let notifier = &self.services.notifier;
            let result = if is_active {
                notifier.enable(&snapshot).await
            } else {
                notifier.disable(&snapshot).await
            };
            if let Err(err) = result {
                warn!(key = %key, error = %format!("{err:#}"), "lifecycle hook failed");
            }
        }

        Ok(if is_disabled {
            DisabledTransition::Disabled
        } else {
            DisabledTransition::Enabled
        })
    }

    /// Makes `id` the only enabled visible theme. With `None` the default
    /// theme is enabled instead.
    pub async fn select_theme(&mut self, id: Option<&str>) -> Result<(), DatabaseError> {
        self.ensure_open("select_theme")?;
        let themes: Vec<(AddonKey, String, bool)> = self
            .records
            .values()
            .filter(|record| record.addon_type == AddonType::Theme && record.visible)
            .map(|record| (record.key(), record.id.clone(), record.pending_uninstall))
            .collect();

        let wanted = id.unwrap_or(DEFAULT_THEME_ID);
        let mut selected = None;
        for (key, theme_id, pending_uninstall) in themes {
            if theme_id == wanted {
                selected = Some(key);
            } else if !pending_uninstall {
                let update = DisabledStateUpdate {
                    because_selecting: true,
                    ..DisabledStateUpdate::user(true)
                };
                self.apply_disabled_state(&key, update).await?;
            }
        }

        if let Some(key) = selected {
            let update = DisabledStateUpdate {
                because_selecting: true,
                ..DisabledStateUpdate::user(false)
            };
            self.apply_disabled_state(&key, update).await?;
        }
        debug!(theme = wanted, "selected theme");
        Ok(())
    }

    pub async fn set_user_disabled(
        &mut self,
        key: &AddonKey,
        disabled: bool,
        allow_system: bool,
    ) -> Result<DisabledTransition, DatabaseError> {
        self.ensure_open("set_user_disabled")?;
        let record = self
            .records
            .get(key)
            .ok_or_else(|| DatabaseError::unknown(key))?;
        if disabled == (record.user_disabled || record.soft_disabled) {
            return Ok(DisabledTransition::Unchanged);
        }
        let is_system = self
            .location(&record.location)
            .is_some_and(|location| location.is_system);
        if is_system && !allow_system {
            return Err(DatabaseError::SystemAddonProtected {
                id: record.id.clone(),
            });
        }

        self.update_disabled_state(key, DisabledStateUpdate::user(disabled))
            .await
    }

    pub async fn set_soft_disabled(
        &mut self,
        key: &AddonKey,
        disabled: bool,
    ) -> Result<DisabledTransition, DatabaseError> {
        self.ensure_open("set_soft_disabled")?;
        let record = self
            .records
            .get(key)
            .ok_or_else(|| DatabaseError::unknown(key))?;
        if disabled == record.soft_disabled {
            return Ok(DisabledTransition::Unchanged);
        }
        if record.addon_type == AddonType::Theme
            && disabled
            && !record.user_disabled
            && !record.is_web_extension()
        {
            return Ok(DisabledTransition::Unchanged);
        }

        self.update_disabled_state(key, DisabledStateUpdate::soft(disabled))
            .await
    }

    pub async fn set_embedder_disabled(
        &mut self,
        key: &AddonKey,
        disabled: bool,
    ) -> Result<DisabledTransition, DatabaseError> {
        self.ensure_open("set_embedder_disabled")?;
        if !self.settings.is_embedded {
            return Err(DatabaseError::NotEmbedded);
        }
        let record = self
            .records
            .get(key)
            .ok_or_else(|| DatabaseError::unknown(key))?;
        if disabled == record.embedder_disabled {
            return Ok(DisabledTransition::Unchanged);
        }

        self.update_disabled_state(key, DisabledStateUpdate::embedder(disabled))
            .await
    }

    /// Asks the blocklist service about one package and applies the answer.
    pub async fn refresh_blocklist_state(
        &mut self,
        key: &AddonKey,
        apply_soft_block: bool,
    ) -> Result<BlocklistRefresh, DatabaseError> {
        self.ensure_open("refresh_blocklist_state")?;
        let record = self
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| DatabaseError::unknown(key))?;
        let exempt = self
            .location(&record.location)
            .map_or(true, |location| location.is_system_or_builtin());
        if exempt {
            return Ok(BlocklistRefresh::unchanged(record.blocklist_state));
        }

        let entry = match self.services.blocklist.entry_for(&record).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key = %key, error = %format!("{err:#}"), "blocklist lookup failed");
                return Ok(BlocklistRefresh::unchanged(record.blocklist_state));
            }
        };

        let Some(current) = self.records.get_mut(key) else {
            return Err(DatabaseError::unknown(key));
        };
        let old_state = current.blocklist_state;
        let new_state = entry
            .as_ref()
            .map_or(BlocklistState::NotBlocked, |entry| entry.state);
        if old_state != new_state {
            current.blocklist_attention_dismissed = false;
        }
        current.blocklist_state = new_state;
        current.blocklist_url = entry.and_then(|entry| entry.url);

        let mut update = DisabledStateUpdate::default();
        if apply_soft_block && old_state != new_state {
            if new_state == BlocklistState::SoftBlocked {
                if current.addon_type == AddonType::Theme {
                    update.user_disabled = Some(true);
                } else {
                    update.soft_disabled = Some(!current.user_disabled);
                }
            } else {
                update.soft_disabled = Some(false);
            }
        }

        let transition = self.update_disabled_state(key, update).await?;
        self.recompute_attention(key);
        self.save_changes();
        if old_state != new_state {
            info!(
                key = %key,
                old = old_state.as_str(),
                new = new_state.as_str(),
                "blocklist state changed"
            );
        }

        Ok(BlocklistRefresh {
            old_state,
            new_state,
            transition,
        })
    }

    pub async fn refresh_all_blocklist_states(
        &mut self,
    ) -> Result<Vec<(AddonKey, BlocklistRefresh)>, DatabaseError> {
        let keys: Vec<AddonKey> = self.records.keys().cloned().collect();
        self.refresh_blocklist_states(keys).await
    }

    pub(crate) async fn refresh_blocklist_states(
        &mut self,
        keys: Vec<AddonKey>,
    ) -> Result<Vec<(AddonKey, BlocklistRefresh)>, DatabaseError> {
        let mut refreshed = Vec::new();
        let mut batch = BatchYield::default();
        for key in keys {
            batch.tick().await;
            if !self.records.contains_key(&key) {
                continue;
            }
            let refresh = self.refresh_blocklist_state(&key, true).await?;
            if refresh.old_state != refresh.new_state {
                refreshed.push((key, refresh));
            }
        }
        Ok(refreshed)
    }

    /// Recomputes `app_disabled` for every record after the environment changed.
    pub async fn update_app_disabled_states(&mut self) -> Result<DisabledChanges, DatabaseError> {
        self.ensure_open("update_app_disabled_states")?;
        let keys: Vec<AddonKey> = self.records.keys().cloned().collect();
        let mut changes = DisabledChanges::default();
        let mut batch = BatchYield::default();
        for key in keys {
            batch.tick().await;
            let Some(id) = self.records.get(&key).map(|record| record.id.clone()) else {
                continue;
            };
            match self
                .update_disabled_state(&key, DisabledStateUpdate::default())
                .await?
            {
                DisabledTransition::Disabled => changes.disabled.push(id),
                DisabledTransition::Enabled => changes.enabled.push(id),
                DisabledTransition::Unchanged => {}
            }
        }
        Ok(changes)
    }
}
