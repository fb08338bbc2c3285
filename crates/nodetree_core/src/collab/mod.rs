//! Contracts for collaborators the tree core consults but does not own.
//!
//! # Responsibility
//! - Describe user existence, project ownership and attribute storage as
//!   narrow traits.
//! - Bundle the handles for constructor wiring of `NodeTreeManager`.
//!
//! # Invariants
//! - Every project is anchored at exactly one tree root node.
//! - Attribute records are keyed by node id; one record per node.

use crate::model::attribute::{AttributeType, NodeAttributes, TypeId};
use crate::model::node::NodeId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;

pub use memory::{InMemoryAttributes, InMemoryProjects, InMemoryUsers};

/// Stable user identifier.
pub type UserId = Uuid;

pub type CollabResult<T> = Result<T, CollabError>;

/// Errors reported by collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollabError {
    UserNotFound(UserId),
    /// No project is rooted at the given node.
    ProjectNotFound(NodeId),
    AttributeNotFound(NodeId),
    TypeNotFound(TypeId),
    /// Collaborator-specific failure (transport, storage, ...).
    Backend(String),
}

impl Display for CollabError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::ProjectNotFound(root) => write!(f, "no project rooted at node {root}"),
            Self::AttributeNotFound(id) => write!(f, "attributes not found for node {id}"),
            Self::TypeNotFound(id) => write!(f, "attribute type not found: {id}"),
            Self::Backend(message) => write!(f, "collaborator failure: {message}"),
        }
    }
}

impl Error for CollabError {}

/// Project ownership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub owner_id: UserId,
    pub root_node_id: NodeId,
}

pub trait UserDirectory: Send + Sync {
    /// Fails with `UserNotFound` when the user is unknown.
    fn user_exists(&self, user_id: UserId) -> CollabResult<()>;
}

pub trait ProjectDirectory: Send + Sync {
    /// Loads the project anchored at `root_node_id`.
    fn get_by_root_node_id(&self, root_node_id: NodeId) -> CollabResult<Project>;
}

pub trait AttributeStore: Send + Sync {
    fn get_attribute(&self, node_id: NodeId) -> CollabResult<NodeAttributes>;
    fn get_type(&self, type_id: &str) -> CollabResult<AttributeType>;
    fn create_attribute(&self, node_id: NodeId, attributes: NodeAttributes) -> CollabResult<()>;
    fn delete_attribute(&self, node_id: NodeId) -> CollabResult<()>;
}

/// Collaborator handles passed to `NodeTreeManager::new`.
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserDirectory>,
    pub projects: Arc<dyn ProjectDirectory>,
    pub attributes: Arc<dyn AttributeStore>,
}

impl Collaborators {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        projects: Arc<dyn ProjectDirectory>,
        attributes: Arc<dyn AttributeStore>,
    ) -> Self {
        Self {
            users,
            projects,
            attributes,
        }
    }
}
