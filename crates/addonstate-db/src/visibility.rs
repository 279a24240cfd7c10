use std::collections::BTreeMap;

use addonstate_core::{AddonKey, AddonRecord};
use tracing::{debug, warn};

/// Records grouped by location name, then by id.
pub type LocationRecords = BTreeMap<String, BTreeMap<String, AddonRecord>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleSet {
    /// The location of the chosen record for every id.
    pub chosen: BTreeMap<String, String>,
    /// Keys of records that lost to a higher priority location or were suppressed.
    pub hidden: Vec<AddonKey>,
}

impl VisibleSet {
    pub fn is_visible(&self, location: &str, id: &str) -> bool {
        self.chosen.get(id).is_some_and(|chosen| chosen == location)
    }

    pub fn chosen_key(&self, id: &str) -> Option<AddonKey> {
        self.chosen
            .get(id)
            .map(|location| AddonKey::new(location, id))
    }
}

/// Picks one record per id: the first location in `priority` that holds it
/// wins. Pairs for which `hide(location, id)` is true never take part.
pub fn flatten_by_id<'a, P, H>(records: &LocationRecords, priority: P, hide: H) -> VisibleSet
where
    P: IntoIterator<Item = &'a str>,
    H: Fn(&str, &str) -> bool,
{
    let mut set = VisibleSet::default();
    for location in priority {
        let Some(addons) = records.get(location) else {
            continue;
        };
        for id in addons.keys() {
            let key = AddonKey::new(location, id);
            if hide(location, id) {
                debug!(key = %key, "hiding suppressed addon");
                set.hidden.push(key);
                continue;
            }
            if set.chosen.contains_key(id) {
                set.hidden.push(key);
                continue;
            }
            set.chosen.insert(id.clone(), location.to_string());
        }
    }
    set
}

/// The records that were visible before a pass, by id. A second visible
/// record for an id is reported and ignored.
pub fn previous_visible<'a, I>(records: I) -> BTreeMap<String, AddonRecord>
where
    I: IntoIterator<Item = &'a AddonRecord>,
{
    let mut visible = BTreeMap::new();
    for record in records.into_iter().filter(|record| record.visible) {
        if visible.contains_key(&record.id) {
            warn!(
                id = %record.id,
                location = %record.location,
                "previous database listed more than one visible addon with this id"
            );
            continue;
        }
        visible.insert(record.id.clone(), record.clone());
    }
    visible
}
