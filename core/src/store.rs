//! In-memory snapshot store.
//!
//! RULE: a stored snapshot is never edited in place. `merge` clones the
//! current value, applies the caller's update to the clone, and swaps the
//! result in. Readers holding an older `Arc<Snapshot>` keep a consistent
//! value.
//!
//! Each identity has its own slot lock. Merges for one identity serialize
//! on that lock; merges for different identities only share the brief map
//! lookup.

use crate::{snapshot::Snapshot, types::Identity};
use parking_lot::{Mutex, RwLock};
use std::{collections::HashMap, sync::Arc};

type Slot = Arc<Mutex<Arc<Snapshot>>>;

pub struct SnapshotStore {
    slots:    RwLock<HashMap<Identity, Slot>>,
    fallback: Arc<Snapshot>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            slots:    RwLock::new(HashMap::new()),
            fallback: Arc::new(Snapshot::default()),
        }
    }

    /// The stored snapshot, or the canonical default for an unseen identity.
    /// Never creates an entry.
    pub fn get(&self, identity: Identity) -> Arc<Snapshot> {
        let Some(slot) = self.slot(identity) else {
            return Arc::clone(&self.fallback);
        };
        let current = slot.lock();
        Arc::clone(&current)
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.slots.read().contains_key(&identity)
    }

    /// Read-or-default, apply `update` to a copy, write the copy back.
    /// Returns the value now stored.
    pub fn merge<F>(&self, identity: Identity, update: F) -> Arc<Snapshot>
    where
        F: FnOnce(&mut Snapshot),
    {
        let slot = self.slot_or_insert(identity);
        let mut current = slot.lock();
        let mut next = Snapshot::clone(&current);
        update(&mut next);
        let next = Arc::new(next);
        *current = Arc::clone(&next);
        next
    }

    /// Overwrite unconditionally. Used by the start-up load.
    pub fn seed(&self, identity: Identity, snapshot: Snapshot) {
        let slot = self.slot_or_insert(identity);
        *slot.lock() = Arc::new(snapshot);
    }

    /// Every identity with a stored snapshot, ascending.
    pub fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.slots.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn slot(&self, identity: Identity) -> Option<Slot> {
        self.slots.read().get(&identity).cloned()
    }

    fn slot_or_insert(&self, identity: Identity) -> Slot {
        if let Some(slot) = self.slot(identity) {
            return slot;
        }
        let mut slots = self.slots.write();
        let slot = slots
            .entry(identity)
            .or_insert_with(|| Arc::new(Mutex::new(Arc::clone(&self.fallback))));
        Arc::clone(slot)
    }
}
