//! Per-tree mutual exclusion.
//!
//! # Invariants
//! - At most one closure runs under `with_tree` for a given root at a time.
//! - A caller never nests `with_tree` calls; nested calls on the same root
//!   would deadlock.
//! - Slots are cloned and removed only under the table lock, and a slot is
//!   removed only when no other caller holds or waits on it. Two callers can
//!   never hold different mutexes for the same root.

use crate::model::node::NodeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lock table keyed by tree root id.
#[derive(Debug, Default)]
pub struct TreeLocks {
    slots: Mutex<HashMap<NodeId, Arc<Mutex<()>>>>,
}

impl TreeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock of the tree rooted at `root`.
    pub fn with_tree<T>(&self, root: NodeId, f: impl FnOnce() -> T) -> T {
        let slot = Arc::clone(self.table().entry(root).or_default());
        let result = {
            let _guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        };

        let mut slots = self.table();
        // One reference in the table plus ours: nobody else is waiting.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(&root);
        }
        result
    }

    /// Number of roots with a live slot.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, HashMap<NodeId, Arc<Mutex<()>>>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
