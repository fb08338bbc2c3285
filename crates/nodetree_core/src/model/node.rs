//! Node records and the views derived from them.

use crate::model::attribute::{AttrMap, NodeAttributes, TypeId};
use crate::model::template::TemplateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable node identifier.
pub type NodeId = Uuid;

/// Persisted node shape. The id is the registry key and is not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub parent: Option<NodeId>,
    /// Ordered child ids; order is the sibling display order.
    #[serde(default)]
    pub children: Vec<NodeId>,
}

/// Node record together with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    /// Creates a fresh node with a generated id and no children.
    pub fn new(parent: Option<NodeId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent,
            children: Vec::new(),
        }
    }

    pub fn from_record(id: NodeId, record: NodeRecord) -> Self {
        Self {
            id,
            parent: record.parent,
            children: record.children,
        }
    }

    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            parent: self.parent,
            children: self.children.clone(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Node merged with its attribute data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedNodeView {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub type_id: TypeId,
    pub attrs: AttrMap,
    pub holder: bool,
}

/// Recursive view of a node and all of its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeView {
    pub id: NodeId,
    pub type_id: TypeId,
    pub attrs: AttrMap,
    pub holder: bool,
    pub children: Vec<TreeView>,
}

impl TreeView {
    /// Builds a childless view from attribute data.
    pub fn leaf(id: NodeId, attributes: NodeAttributes, holder: bool) -> Self {
        Self {
            id,
            type_id: attributes.type_id,
            attrs: attributes.attrs,
            holder,
            children: Vec::new(),
        }
    }

    /// Attribute record carried by this view.
    pub fn attributes(&self) -> NodeAttributes {
        NodeAttributes {
            type_id: self.type_id.clone(),
            attrs: self.attrs.clone(),
        }
    }

    /// Ids of this node and all descendants, breadth-first.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut queue = std::collections::VecDeque::from([self]);
        while let Some(current) = queue.pop_front() {
            ids.push(current.id);
            queue.extend(current.children.iter());
        }
        ids
    }

    /// Number of nodes in this view.
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// A view always contains at least its own node.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Request to create a node under `parent` from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCreate {
    pub parent: NodeId,
    pub template_id: TemplateId,
}

/// Request to move a node.
///
/// `parent == None` keeps the current parent; `position` is always applied
/// within the (possibly new) parent's child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub parent: Option<NodeId>,
    pub position: usize,
}
