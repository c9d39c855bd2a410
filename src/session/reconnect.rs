//! Snapshots of disconnected participants, keyed by lower-cased display name,
//! so a player dropping mid-game can rejoin under the same nickname and get
//! their state back. Records live until consumed or until `reset_game`.

use crate::types::{CategoryMap, Role};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ReconnectionRecord {
    pub characteristics: Option<CategoryMap>,
    pub ready: bool,
    pub role: Role,
    pub mirror_camera: bool,
    /// An eliminated player stays eliminated across the reconnect.
    pub banned: bool,
    pub disconnected_at: i64,
}

#[derive(Default)]
pub struct ReconnectionStore {
    records: HashMap<String, ReconnectionRecord>,
}

impl ReconnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, name: &str, record: ReconnectionRecord) {
        self.records.insert(name.to_lowercase(), record);
    }

    /// Remove and return the record for `name`, if any.
    pub fn take(&mut self, name: &str) -> Option<ReconnectionRecord> {
        self.records.remove(&name.to_lowercase())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: Role) -> ReconnectionRecord {
        ReconnectionRecord {
            characteristics: None,
            ready: true,
            role,
            mirror_camera: false,
            banned: false,
            disconnected_at: 0,
        }
    }

    #[test]
    fn take_is_case_insensitive_and_consuming() {
        let mut store = ReconnectionStore::new();
        store.save("Alice", record(Role::Player));

        let taken = store.take("ALICE").unwrap();
        assert!(taken.ready);
        assert!(store.take("alice").is_none());
    }

    #[test]
    fn save_overwrites_previous_record_for_same_name() {
        let mut store = ReconnectionStore::new();
        store.save("bob", record(Role::Player));
        store.save("BOB", record(Role::Host));

        assert_eq!(store.len(), 1);
        assert_eq!(store.take("bob").unwrap().role, Role::Host);
    }

    #[test]
    fn clear_drops_all_records() {
        let mut store = ReconnectionStore::new();
        store.save("a", record(Role::Player));
        store.save("b", record(Role::Player));
        store.clear();
        assert!(store.is_empty());
    }
}
