use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{ParticipantId, RoomId};

/// Per-room rotation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    /// Ids picked by the most recent successful selection.
    pub last_selected: HashSet<ParticipantId>,
    /// Standing allow-list, `None` means no restriction.
    pub priority: Option<HashSet<ParticipantId>>,
    /// `None` once the idle sweep has expired the room.
    pub last_activity: Option<DateTime<Utc>>,
}

impl SelectionState {
    /// Nothing worth keeping around.
    pub fn is_empty(&self) -> bool {
        self.last_selected.is_empty() && self.priority.is_none() && self.last_activity.is_none()
    }
}

/// Storage for [`SelectionState`] keyed by room.
///
/// Closures passed to `update` and `modify` run while the room is locked, so
/// a read-modify-write on one room never interleaves with another on the
/// same room.
pub trait SelectionStore: Send + Sync {
    /// Snapshot of a room's state.
    fn get(&self, room: RoomId) -> Option<SelectionState>;

    fn put(&self, room: RoomId, state: SelectionState);

    /// Run `f` on the room's state, creating a default state first if needed.
    fn update<T>(&self, room: RoomId, f: impl FnOnce(&mut SelectionState) -> T) -> T;

    /// Run `f` only if the room exists.
    fn modify<T>(&self, room: RoomId, f: impl FnOnce(&mut SelectionState) -> T) -> Option<T>;

    /// Drop the previous selection and its activity timestamp, keeping the
    /// priority list.
    fn clear(&self, room: RoomId) {
        self.modify(room, |state| {
            state.last_selected.clear();
            state.last_activity = None;
        });
    }

    fn remove(&self, room: RoomId) -> Option<SelectionState>;

    /// Remove the room only if `f` says so, atomically with respect to other
    /// writers on that room.
    fn remove_if(&self, room: RoomId, f: impl FnOnce(&SelectionState) -> bool) -> bool;

    /// Snapshot of known rooms.
    fn rooms(&self) -> Vec<RoomId>;
}

#[derive(Default)]
pub struct MemoryStore {
    rooms: DashMap<RoomId, SelectionState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStore for MemoryStore {
    fn get(&self, room: RoomId) -> Option<SelectionState> {
        self.rooms.get(&room).map(|state| state.clone())
    }

    fn put(&self, room: RoomId, state: SelectionState) {
        self.rooms.insert(room, state);
    }

    fn update<T>(&self, room: RoomId, f: impl FnOnce(&mut SelectionState) -> T) -> T {
        let mut entry = self.rooms.entry(room).or_default();
        f(entry.value_mut())
    }

    fn modify<T>(&self, room: RoomId, f: impl FnOnce(&mut SelectionState) -> T) -> Option<T> {
        self.rooms.get_mut(&room).map(|mut state| f(state.value_mut()))
    }

    fn remove(&self, room: RoomId) -> Option<SelectionState> {
        self.rooms.remove(&room).map(|(_, state)| state)
    }

    fn remove_if(&self, room: RoomId, f: impl FnOnce(&SelectionState) -> bool) -> bool {
        self.rooms.remove_if(&room, |_, state| f(state)).is_some()
    }

    fn rooms(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_creates_lazily() {
        let store = MemoryStore::new();
        assert!(store.get(RoomId(1)).is_none());

        store.update(RoomId(1), |state| {
            state.last_selected.insert(ParticipantId(5));
        });
        let state = store.get(RoomId(1)).unwrap();
        assert!(state.last_selected.contains(&ParticipantId(5)));
        assert_eq!(store.rooms(), vec![RoomId(1)]);
    }

    #[test]
    fn test_modify_skips_missing_rooms() {
        let store = MemoryStore::new();
        assert_eq!(store.modify(RoomId(2), |_| 1), None);
        store.clear(RoomId(2));
        assert!(store.get(RoomId(2)).is_none());
    }

    #[test]
    fn test_clear_keeps_priority() {
        let store = MemoryStore::new();
        store.put(
            RoomId(3),
            SelectionState {
                last_selected: HashSet::from([ParticipantId(1)]),
                priority: Some(HashSet::from([ParticipantId(2)])),
                last_activity: None,
            },
        );

        store.clear(RoomId(3));
        let state = store.get(RoomId(3)).unwrap();
        assert!(state.last_selected.is_empty());
        assert!(state.last_activity.is_none());
        assert!(state.priority.is_some());
    }

    #[test]
    fn test_remove_if() {
        let store = MemoryStore::new();
        store.put(RoomId(4), SelectionState::default());
        assert!(!store.remove_if(RoomId(4), |state| !state.is_empty()));
        assert!(store.remove_if(RoomId(4), SelectionState::is_empty));
        assert!(store.remove(RoomId(4)).is_none());
    }
}
