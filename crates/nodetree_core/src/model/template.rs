//! Template records and views.

use crate::model::node::{NodeId, TreeView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable template identifier.
pub type TemplateId = Uuid;

/// Persisted template shape: a pointer to a detached node subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub root_node_id: NodeId,
}

/// Template together with its full subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateView {
    pub id: TemplateId,
    pub tree: TreeView,
}
