use std::collections::BTreeSet;

use addonstate_core::{AddonRecord, AddonType, BlocklistState};
use serde::Serialize;
use tokio::sync::watch;

/// Whether a blocklist-disabled package still needs to be acknowledged.
pub fn needs_attention(record: &AddonRecord, hidden: bool) -> bool {
    !hidden
        && !record.blocklist_attention_dismissed
        && (record.app_disabled() || record.soft_disabled)
        && record.blocklist_state.is_blocked()
        && record.addon_type == AddonType::Extension
}

/// Ids of packages disabled by the blocklist that the user has not dismissed.
///
/// Every recompute bumps a generation counter, changed or not, so
/// subscribers can use it as a recheck signal.
#[derive(Debug)]
pub struct BlocklistAttentionSet {
    ids: BTreeSet<String>,
    generation: watch::Sender<u64>,
}

impl BlocklistAttentionSet {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            ids: BTreeSet::new(),
            generation,
        }
    }

    pub fn recompute(&mut self, record: &AddonRecord, hidden: bool) {
        if needs_attention(record, hidden) {
            self.ids.insert(record.id.clone());
        } else {
            self.ids.remove(&record.id);
        }
        self.bump();
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.remove(id);
        self.bump();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn bump(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }
}

impl Default for BlocklistAttentionSet {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionInfo {
    pub addons: Vec<String>,
    pub should_show: bool,
    pub has_soft_blocked: bool,
    pub has_hard_blocked: bool,
    pub count: usize,
}

impl AttentionInfo {
    pub(crate) fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AddonRecord>,
    {
        let mut info = Self::default();
        for record in records {
            info.has_soft_blocked |= record.blocklist_state == BlocklistState::SoftBlocked;
            info.has_hard_blocked |= record.blocklist_state == BlocklistState::Blocked;
            info.addons.push(record.id.clone());
        }
        info.count = info.addons.len();
        info.should_show = info.count > 0;
        info
    }
}
