//! In-memory collaborator implementations.

use super::{
    AttributeStore, CollabError, CollabResult, Project, ProjectDirectory, UserDirectory, UserId,
};
use crate::model::attribute::{AttributeType, NodeAttributes, DEFAULT_TYPE_ID};
use crate::model::node::NodeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Set of known users.
#[derive(Debug, Default)]
pub struct InMemoryUsers {
    users: Mutex<HashSet<UserId>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user_id: UserId) {
        lock(&self.users).insert(user_id);
    }
}

impl UserDirectory for InMemoryUsers {
    fn user_exists(&self, user_id: UserId) -> CollabResult<()> {
        if lock(&self.users).contains(&user_id) {
            Ok(())
        } else {
            Err(CollabError::UserNotFound(user_id))
        }
    }
}

/// Projects keyed by their root node.
#[derive(Debug, Default)]
pub struct InMemoryProjects {
    projects: Mutex<HashMap<NodeId, Project>>,
}

impl InMemoryProjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, project: Project) {
        lock(&self.projects).insert(project.root_node_id, project);
    }
}

impl ProjectDirectory for InMemoryProjects {
    fn get_by_root_node_id(&self, root_node_id: NodeId) -> CollabResult<Project> {
        lock(&self.projects)
            .get(&root_node_id)
            .cloned()
            .ok_or(CollabError::ProjectNotFound(root_node_id))
    }
}

/// Attribute types and per-node attribute records.
#[derive(Debug)]
pub struct InMemoryAttributes {
    types: Mutex<HashMap<String, AttributeType>>,
    records: Mutex<HashMap<NodeId, NodeAttributes>>,
}

impl Default for InMemoryAttributes {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAttributes {
    /// Creates a store with the holder type `default` registered.
    pub fn new() -> Self {
        let store = Self {
            types: Mutex::default(),
            records: Mutex::default(),
        };
        store.register_type(AttributeType {
            id: DEFAULT_TYPE_ID.to_string(),
            holder: true,
        });
        store
    }

    pub fn register_type(&self, attribute_type: AttributeType) {
        lock(&self.types).insert(attribute_type.id.clone(), attribute_type);
    }

    /// Whether an attribute record exists for `node_id`.
    pub fn contains(&self, node_id: NodeId) -> bool {
        lock(&self.records).contains_key(&node_id)
    }

    /// Number of stored attribute records.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttributeStore for InMemoryAttributes {
    fn get_attribute(&self, node_id: NodeId) -> CollabResult<NodeAttributes> {
        lock(&self.records)
            .get(&node_id)
            .cloned()
            .ok_or(CollabError::AttributeNotFound(node_id))
    }

    fn get_type(&self, type_id: &str) -> CollabResult<AttributeType> {
        lock(&self.types)
            .get(type_id)
            .cloned()
            .ok_or_else(|| CollabError::TypeNotFound(type_id.to_string()))
    }

    fn create_attribute(&self, node_id: NodeId, attributes: NodeAttributes) -> CollabResult<()> {
        if !lock(&self.types).contains_key(&attributes.type_id) {
            return Err(CollabError::TypeNotFound(attributes.type_id));
        }
        lock(&self.records).insert(node_id, attributes);
        Ok(())
    }

    fn delete_attribute(&self, node_id: NodeId) -> CollabResult<()> {
        lock(&self.records)
            .remove(&node_id)
            .map(|_| ())
            .ok_or(CollabError::AttributeNotFound(node_id))
    }
}
