//! Error taxonomy shared by the node tree and template managers.

use crate::collab::{CollabError, UserId};
use crate::model::attribute::TypeId;
use crate::model::node::NodeId;
use crate::model::template::TemplateId;
use crate::registry::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TreeResult<T> = Result<T, TreeError>;

/// Errors from node tree and template operations.
#[derive(Debug)]
pub enum TreeError {
    /// Initiator is unknown to the user directory.
    UserNotFound(UserId),
    /// Initiator does not own the project rooted at the node's tree.
    NotAllowed { initiator: UserId, node: NodeId },
    NodeNotFound(NodeId),
    /// No project is rooted at the resolved tree root.
    ProjectNotFound(NodeId),
    /// Reparent target lives in another tree.
    NodeInDifferentTree { node: NodeId, parent: NodeId },
    /// Reparent target is the node itself or one of its descendants.
    CycleDetected { node: NodeId, parent: NodeId },
    /// Tree roots cannot be deleted.
    NodeCannotBeDeleted(NodeId),
    /// Reposition attempted on a node without a parent.
    IncompatibleNode(NodeId),
    /// Parent's type does not permit children.
    EndNodeError(NodeId),
    TemplateNotFound(TemplateId),
    AttributeNotFound(NodeId),
    TypeNotFound(TypeId),
    /// Operation was cancelled before its next collaborator call.
    Cancelled,
    /// Registry content violates the tree structure.
    InvalidRecord(String),
    /// Collaborator failure with no dedicated kind.
    Collaborator(String),
    Registry(RegistryError),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::NotAllowed { initiator, node } => {
                write!(f, "user {initiator} is not allowed to access node {node}")
            }
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::ProjectNotFound(root) => write!(f, "no project rooted at node {root}"),
            Self::NodeInDifferentTree { node, parent } => write!(
                f,
                "node {node} cannot be moved under {parent}: nodes are in different trees"
            ),
            Self::CycleDetected { node, parent } => write!(
                f,
                "move would create cycle: node {node} under parent {parent}"
            ),
            Self::NodeCannotBeDeleted(id) => write!(f, "tree root cannot be deleted: {id}"),
            Self::IncompatibleNode(id) => write!(f, "node has no parent to reposition in: {id}"),
            Self::EndNodeError(id) => write!(f, "node type does not permit children: {id}"),
            Self::TemplateNotFound(id) => write!(f, "template not found: {id}"),
            Self::AttributeNotFound(id) => write!(f, "attributes not found for node {id}"),
            Self::TypeNotFound(id) => write!(f, "attribute type not found: {id}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::InvalidRecord(message) => write!(f, "invalid tree data: {message}"),
            Self::Collaborator(message) => write!(f, "collaborator failure: {message}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for TreeError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<CollabError> for TreeError {
    fn from(value: CollabError) -> Self {
        match value {
            CollabError::UserNotFound(id) => Self::UserNotFound(id),
            CollabError::ProjectNotFound(root) => Self::ProjectNotFound(root),
            CollabError::AttributeNotFound(id) => Self::AttributeNotFound(id),
            CollabError::TypeNotFound(id) => Self::TypeNotFound(id),
            CollabError::Backend(message) => Self::Collaborator(message),
        }
    }
}

impl TreeError {
    /// Stable snake_case code for logging and transport mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "user_not_found",
            Self::NotAllowed { .. } => "not_allowed",
            Self::NodeNotFound(_) => "node_not_found",
            Self::ProjectNotFound(_) => "project_not_found",
            Self::NodeInDifferentTree { .. } => "node_in_different_tree",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::NodeCannotBeDeleted(_) => "node_cannot_be_deleted",
            Self::IncompatibleNode(_) => "incompatible_node",
            Self::EndNodeError(_) => "end_node",
            Self::TemplateNotFound(_) => "template_not_found",
            Self::AttributeNotFound(_) => "attribute_not_found",
            Self::TypeNotFound(_) => "type_not_found",
            Self::Cancelled => "cancelled",
            Self::InvalidRecord(_) => "invalid_record",
            Self::Collaborator(_) => "collaborator_failure",
            Self::Registry(_) => "registry_failure",
        }
    }
}
