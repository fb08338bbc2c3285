//! In-process registry backend.
//!
//! Handles obtained from the same `MemoryRegistryFactory` under the same name
//! share one collection. Used by tests and by callers that do not need
//! persistence.

use super::{
    ensure_writable, merge_into, Entry, Predicate, Record, RecordId, Registry, RegistryError,
    RegistryFactory, RegistryPermission, RegistryResult,
};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Collection {
    next_seq: u64,
    records: HashMap<RecordId, (u64, Record)>,
}

/// In-memory registry handle for one collection.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    name: String,
    permission: RegistryPermission,
    collection: Arc<Mutex<Collection>>,
}

impl MemoryRegistry {
    /// Creates a standalone read-write collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permission: RegistryPermission::ReadWrite,
            collection: Arc::default(),
        }
    }

    /// Returns a handle to the same collection with a different permission.
    pub fn with_permission(&self, permission: RegistryPermission) -> Self {
        Self {
            name: self.name.clone(),
            permission,
            collection: Arc::clone(&self.collection),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Collection> {
        self.collection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Registry for MemoryRegistry {
    fn create(&self, id: RecordId, record: Record) -> RegistryResult<()> {
        ensure_writable(&self.name, self.permission, "create")?;
        let mut collection = self.lock();
        if collection.records.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        let seq = collection.next_seq;
        collection.next_seq += 1;
        collection.records.insert(id, (seq, record));
        debug!(
            "event=registry_create module=registry status=ok backend=memory collection={} id={id}",
            self.name
        );
        Ok(())
    }

    fn get(&self, id: RecordId) -> RegistryResult<Option<Record>> {
        Ok(self
            .lock()
            .records
            .get(&id)
            .map(|(_, record)| record.clone()))
    }

    fn update(&self, id: RecordId, record: Record) -> RegistryResult<()> {
        ensure_writable(&self.name, self.permission, "update")?;
        let mut collection = self.lock();
        let (_, stored) = collection
            .records
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        merge_into(stored, record);
        Ok(())
    }

    fn delete(&self, id: RecordId) -> RegistryResult<()> {
        ensure_writable(&self.name, self.permission, "delete")?;
        self.lock()
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(RegistryError::NotFound(id))
    }

    fn read(&self, predicate: &Predicate) -> RegistryResult<Vec<Entry>> {
        let collection = self.lock();
        let mut matched: Vec<(u64, Entry)> = collection
            .records
            .iter()
            .filter(|(id, (_, record))| predicate.matches(**id, record))
            .map(|(id, (seq, record))| {
                (
                    *seq,
                    Entry {
                        id: *id,
                        record: record.clone(),
                    },
                )
            })
            .collect();
        matched.sort_by_key(|(seq, _)| *seq);
        Ok(matched.into_iter().map(|(_, entry)| entry).collect())
    }
}

/// Factory handing out shared in-memory collections by name.
#[derive(Debug, Default)]
pub struct MemoryRegistryFactory {
    collections: Mutex<HashMap<String, Arc<Mutex<Collection>>>>,
}

impl MemoryRegistryFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryFactory for MemoryRegistryFactory {
    type Registry = MemoryRegistry;

    fn get(&self, name: &str, permission: RegistryPermission) -> MemoryRegistry {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let collection = Arc::clone(collections.entry(name.to_string()).or_default());
        MemoryRegistry {
            name: name.to_string(),
            permission,
            collection,
        }
    }
}
