//! Thread-safe keyed store backing a request context.

use super::data::{EntryId, SharedEntry};
use crate::config;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

static SET_CONFLICT_WARNED: AtomicBool = AtomicBool::new(false);

/// How [`GuardedStore::try_set`] treats a key that is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetBehavior {
    /// Warn once, clear the existing entry and discard the new one.
    Set,
    /// Leave the existing entry alone and report failure.
    SetIfAbsent,
    /// Replace the existing entry.
    Overwrite,
}

/// A callback entry together with the number of keys holding it.
#[derive(Debug, Clone)]
struct Tracked {
    entry: SharedEntry,
    keys: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    /// `None` marks a slot cleared by a `Set` conflict.
    entries: HashMap<String, Option<SharedEntry>>,
    /// Callback-capable entries present in `entries`, ordered by identity.
    callbacks: BTreeMap<EntryId, Tracked>,
}

impl StoreState {
    fn track(&mut self, entry: &SharedEntry) {
        self.callbacks
            .entry(entry.id())
            .and_modify(|t| t.keys += 1)
            .or_insert_with(|| Tracked {
                entry: entry.clone(),
                keys: 1,
            });
    }

    /// Returns the handle dropped from the callback set, so the caller can
    /// release it after unlocking.
    fn untrack(&mut self, entry: &SharedEntry) -> Option<SharedEntry> {
        let id = entry.id();
        let tracked = self.callbacks.get_mut(&id)?;
        tracked.keys -= 1;
        if tracked.keys == 0 {
            self.callbacks.remove(&id).map(|t| t.entry)
        } else {
            None
        }
    }

    fn is_consistent(&self) -> bool {
        let mut expected: BTreeMap<EntryId, usize> = BTreeMap::new();
        for entry in self.entries.values().flatten() {
            if entry.has_callback() {
                *expected.entry(entry.id()).or_default() += 1;
            }
        }
        expected.len() == self.callbacks.len()
            && expected
                .iter()
                .all(|(id, keys)| self.callbacks.get(id).is_some_and(|t| t.keys == *keys))
    }
}

/// A keyed collection of shared entries guarded by one upgradable lock.
///
/// Hooks and payload destructors never run while the lock is held: the
/// handles they need are moved out of the critical section first.
#[derive(Debug, Default)]
pub struct GuardedStore {
    state: RwLock<StoreState>,
}

impl GuardedStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` under `key` according to `behavior`.
    ///
    /// Returns false only for [`SetBehavior::SetIfAbsent`] when the key is
    /// already present.
    pub fn try_set(&self, key: &str, entry: SharedEntry, behavior: SetBehavior) -> bool {
        let state = self.state.upgradable_read();
        let conflict = state.entries.contains_key(key);

        if conflict && behavior == SetBehavior::SetIfAbsent {
            drop(state);
            drop(entry);
            return false;
        }

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        let mut displaced = None;
        let mut untracked = None;

        if conflict {
            displaced = state.entries.get_mut(key).and_then(Option::take);
            if let Some(old) = displaced.as_ref().filter(|e| e.has_callback()) {
                untracked = state.untrack(old);
            }

            if behavior == SetBehavior::Set {
                debug_assert!(state.is_consistent());
                drop(state);
                warn_set_conflict(key);
                if let Some(old) = displaced.as_ref().filter(|e| e.has_callback()) {
                    old.on_unset();
                }
                drop(untracked);
                drop(displaced);
                drop(entry);
                return true;
            }
        }

        let activated = entry.has_callback().then(|| entry.clone());
        if let Some(new) = &activated {
            state.track(new);
        }
        state.entries.insert(key.to_owned(), Some(entry));
        debug_assert!(state.is_consistent());
        drop(state);

        if let Some(old) = displaced.as_ref().filter(|e| e.has_callback()) {
            old.on_unset();
        }
        if let Some(new) = activated {
            new.on_set();
        }
        drop(untracked);
        drop(displaced);
        true
    }

    /// Returns the entry stored under `key`.
    ///
    /// A slot cleared by a `Set` conflict reads as `None`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SharedEntry> {
        self.state.read().entries.get(key).cloned().flatten()
    }

    /// Checks if a key exists, including cleared slots.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.state.read().entries.contains_key(key)
    }

    /// Removes `key`, deactivating its entry if needed.
    pub fn clear(&self, key: &str) {
        let state = self.state.upgradable_read();
        if !state.entries.contains_key(key) {
            return;
        }

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        let removed = state.entries.remove(key).flatten();
        let untracked = match removed.as_ref().filter(|e| e.has_callback()) {
            Some(entry) => state.untrack(entry),
            None => None,
        };
        debug_assert!(state.is_consistent());
        // A payload destructor may reach back into this store.
        drop(state);

        if let Some(entry) = removed.as_ref().filter(|e| e.has_callback()) {
            entry.on_unset();
        }
        drop(untracked);
        drop(removed);
    }

    /// Returns the callback-capable entries sorted by identity.
    #[must_use]
    pub fn callback_entries(&self) -> Vec<SharedEntry> {
        self.state
            .read()
            .callbacks
            .values()
            .map(|t| t.entry.clone())
            .collect()
    }

    /// Builds a store aliasing every entry of this one.
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        let child = Self::new();
        {
            let parent = self.state.read();
            let mut state = child.state.write();
            state.entries.clone_from(&parent.entries);
            state.callbacks.clone_from(&parent.callbacks);
        }
        child
    }

    /// Returns the number of keys, including cleared slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if the store has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.read().entries.keys().cloned().collect()
    }

    /// Checks that the callback set matches the callback entries in the mapping.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.state.read().is_consistent()
    }
}

fn warn_set_conflict(key: &str) {
    if !config::with_config(|c| c.warn_on_set_conflict) {
        return;
    }
    if !SET_CONFLICT_WARNED.swap(true, Ordering::Relaxed) {
        warn!(
            key = %key,
            "Calling set for '{}' but it is already set; the existing entry was cleared",
            key
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingData;
    use std::sync::Arc;

    fn recording() -> (Arc<RecordingData>, SharedEntry) {
        let data = Arc::new(RecordingData::with_callback());
        let entry = SharedEntry::from_arc(Arc::clone(&data));
        (data, entry)
    }

    #[test]
    fn test_set_if_absent_inserts() {
        let store = GuardedStore::new();
        let (_, entry) = recording();

        assert!(store.try_set("k", entry.clone(), SetBehavior::SetIfAbsent));
        assert_eq!(store.get("k"), Some(entry));
        assert!(store.has("k"));
    }

    #[test]
    fn test_set_if_absent_keeps_existing() {
        let store = GuardedStore::new();
        let (_, first) = recording();
        let (second_data, second) = recording();

        assert!(store.try_set("k", first.clone(), SetBehavior::SetIfAbsent));
        assert!(!store.try_set("k", second, SetBehavior::SetIfAbsent));

        assert_eq!(store.get("k"), Some(first));
        assert_eq!(second_data.set_count(), 0);
        assert_eq!(Arc::strong_count(&second_data), 1);
    }

    #[test]
    fn test_set_conflict_discards_both() {
        let store = GuardedStore::new();
        let (first_data, first) = recording();
        let (second_data, second) = recording();

        assert!(store.try_set("k", first, SetBehavior::Set));
        assert!(store.try_set("k", second, SetBehavior::Set));

        assert!(store.has("k"));
        assert!(store.get("k").is_none());
        assert_eq!(first_data.set_count(), 1);
        assert_eq!(first_data.unset_count(), 1);
        assert_eq!(second_data.set_count(), 0);
        assert_eq!(Arc::strong_count(&first_data), 1);
        assert_eq!(Arc::strong_count(&second_data), 1);
        assert!(store.callback_entries().is_empty());
    }

    #[test]
    fn test_set_into_cleared_slot() {
        let store = GuardedStore::new();
        let (_, first) = recording();
        let (_, second) = recording();
        let (third_data, third) = recording();

        store.try_set("k", first, SetBehavior::Set);
        store.try_set("k", second, SetBehavior::Set);
        // The cleared slot still counts as present.
        assert!(store.try_set("k", third, SetBehavior::Set));
        assert!(store.get("k").is_none());
        assert_eq!(third_data.set_count(), 0);
    }

    #[test]
    fn test_overwrite_replaces() {
        let store = GuardedStore::new();
        let (first_data, first) = recording();
        let (second_data, second) = recording();

        assert!(store.try_set("k", first, SetBehavior::Overwrite));
        assert!(store.try_set("k", second.clone(), SetBehavior::Overwrite));

        assert_eq!(store.get("k"), Some(second.clone()));
        assert_eq!(first_data.set_count(), 1);
        assert_eq!(first_data.unset_count(), 1);
        assert_eq!(second_data.set_count(), 1);
        assert_eq!(second_data.unset_count(), 0);
        assert_eq!(store.callback_entries(), vec![second]);
    }

    #[test]
    fn test_overwrite_cleared_slot() {
        let store = GuardedStore::new();
        let (_, first) = recording();
        let (_, second) = recording();
        let (_, third) = recording();

        store.try_set("k", first, SetBehavior::Set);
        store.try_set("k", second, SetBehavior::Set);
        assert!(store.try_set("k", third.clone(), SetBehavior::Overwrite));
        assert_eq!(store.get("k"), Some(third));
    }

    #[test]
    fn test_plain_entries_not_tracked() {
        let store = GuardedStore::new();
        let data = Arc::new(RecordingData::new());
        store.try_set("plain", SharedEntry::from_arc(Arc::clone(&data)), SetBehavior::Set);

        assert!(store.callback_entries().is_empty());
        store.clear("plain");
        assert_eq!(data.set_count(), 0);
        assert_eq!(data.unset_count(), 0);
    }

    #[test]
    fn test_holders_include_callback_set_handle() {
        let store = GuardedStore::new();
        let (_hooked, hooked_entry) = recording();
        let plain_entry = SharedEntry::new(RecordingData::new());
        let hooked_before = hooked_entry.holders();
        let plain_before = plain_entry.holders();

        store.try_set("hooked", hooked_entry.clone(), SetBehavior::Set);
        store.try_set("plain", plain_entry.clone(), SetBehavior::Set);

        assert_eq!(hooked_entry.holders(), hooked_before + 2);
        assert_eq!(plain_entry.holders(), plain_before + 1);

        store.clear("hooked");
        store.clear("plain");
        assert_eq!(hooked_entry.holders(), hooked_before);
        assert_eq!(plain_entry.holders(), plain_before);
    }

    #[test]
    fn test_clear_deactivates_and_releases() {
        let store = GuardedStore::new();
        let (data, entry) = recording();

        store.try_set("k", entry, SetBehavior::Set);
        assert_eq!(Arc::strong_count(&data), 3);

        store.clear("k");
        assert!(!store.has("k"));
        assert_eq!(data.unset_count(), 1);
        assert_eq!(Arc::strong_count(&data), 1);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_clear_missing_is_noop() {
        let store = GuardedStore::new();
        store.clear("missing");
        assert!(store.is_empty());
    }

    #[test]
    fn test_same_entry_under_two_keys() {
        let store = GuardedStore::new();
        let (data, entry) = recording();

        store.try_set("a", entry.clone(), SetBehavior::Set);
        store.try_set("b", entry.clone(), SetBehavior::Set);
        assert_eq!(store.callback_entries().len(), 1);

        store.clear("a");
        assert_eq!(store.callback_entries(), vec![entry]);
        assert!(store.is_consistent());

        store.clear("b");
        assert!(store.callback_entries().is_empty());
        assert_eq!(data.set_count(), 2);
        assert_eq!(data.unset_count(), 2);
    }

    #[test]
    fn test_destructor_may_reenter_store() {
        struct ClearOnDrop {
            store: Arc<GuardedStore>,
        }

        impl crate::context::RequestData for ClearOnDrop {}

        impl Drop for ClearOnDrop {
            fn drop(&mut self) {
                self.store.clear("other");
                let _ = self.store.has("reentrant");
            }
        }

        let store = Arc::new(GuardedStore::new());
        store.try_set(
            "reentrant",
            SharedEntry::new(ClearOnDrop {
                store: Arc::clone(&store),
            }),
            SetBehavior::Set,
        );
        store.try_set("other", SharedEntry::new(RecordingData::new()), SetBehavior::Set);

        store.clear("reentrant");
        assert!(!store.has("other"));
        assert!(!store.has("reentrant"));
    }

    #[test]
    fn test_hook_may_reenter_store() {
        let store = Arc::new(GuardedStore::new());
        let data = Arc::new(RecordingData::with_callback());
        let probe = Arc::clone(&store);
        data.on_unset_run(move || {
            let _ = probe.get("k");
            probe.clear("sibling");
        });

        store.try_set("sibling", SharedEntry::new(RecordingData::new()), SetBehavior::Set);
        store.try_set("k", SharedEntry::from_arc(Arc::clone(&data)), SetBehavior::Set);
        store.try_set("k", SharedEntry::new(RecordingData::new()), SetBehavior::Overwrite);

        assert_eq!(data.unset_count(), 1);
        assert!(!store.has("sibling"));
    }

    #[test]
    fn test_shallow_copy_aliases_entries() {
        let store = GuardedStore::new();
        let (data, entry) = recording();
        store.try_set("k", entry.clone(), SetBehavior::Set);
        store.try_set("plain", SharedEntry::new(RecordingData::new()), SetBehavior::Set);

        let copy = store.shallow_copy();

        assert_eq!(copy.get("k"), Some(entry));
        assert_eq!(copy.callback_entries(), store.callback_entries());
        assert_eq!(copy.len(), 2);
        assert_eq!(data.set_count(), 1);
        assert!(copy.is_consistent());
    }

    #[test]
    fn test_keys() {
        let store = GuardedStore::new();
        store.try_set("a", SharedEntry::new(RecordingData::new()), SetBehavior::Set);
        store.try_set("b", SharedEntry::new(RecordingData::new()), SetBehavior::Set);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.len(), 2);
    }
}
