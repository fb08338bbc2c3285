#![allow(dead_code)]

use nodetree_core::registry::from_record;
use nodetree_core::{
    AttributeStore, AttributeType, CollabResult, Collaborators,
    InMemoryAttributes, InMemoryProjects, InMemoryUsers, MemoryRegistry, MemoryRegistryFactory,
    NodeAttributes, NodeId, NodeRecord, NodeTreeManager, Predicate, Project, Registry, RegistryFactory,
    RegistryPermission, TemplateManager, TreeView, UserId, NODES_COLLECTION,
    TEMPLATES_COLLECTION,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const FOLDER: &str = "folder";
pub const LEAF: &str = "leaf";

/// Attribute store that records every delete call.
pub struct RecordingAttributes {
    pub inner: InMemoryAttributes,
    deleted: Mutex<Vec<NodeId>>,
}

impl RecordingAttributes {
    pub fn new() -> Self {
        let inner = InMemoryAttributes::new();
        inner.register_type(AttributeType {
            id: FOLDER.to_string(),
            holder: true,
        });
        inner.register_type(AttributeType {
            id: LEAF.to_string(),
            holder: false,
        });
        Self {
            inner,
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn deleted(&self) -> Vec<NodeId> {
        self.deleted.lock().unwrap().clone()
    }
}

impl AttributeStore for RecordingAttributes {
    fn get_attribute(&self, node_id: NodeId) -> CollabResult<NodeAttributes> {
        self.inner.get_attribute(node_id)
    }

    fn get_type(&self, type_id: &str) -> CollabResult<AttributeType> {
        self.inner.get_type(type_id)
    }

    fn create_attribute(&self, node_id: NodeId, attributes: NodeAttributes) -> CollabResult<()> {
        self.inner.create_attribute(node_id, attributes)
    }

    fn delete_attribute(&self, node_id: NodeId) -> CollabResult<()> {
        self.deleted.lock().unwrap().push(node_id);
        self.inner.delete_attribute(node_id)
    }
}

pub struct Fixture {
    pub owner: UserId,
    pub users: Arc<InMemoryUsers>,
    pub projects: Arc<InMemoryProjects>,
    pub attributes: Arc<RecordingAttributes>,
    pub node_registry: MemoryRegistry,
    pub template_registry: MemoryRegistry,
    pub nodes: Arc<NodeTreeManager<MemoryRegistry>>,
    pub templates: TemplateManager<MemoryRegistry, MemoryRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        let factory = MemoryRegistryFactory::new();
        let node_registry = factory.get(NODES_COLLECTION, RegistryPermission::ReadWrite);
        let template_registry = factory.get(TEMPLATES_COLLECTION, RegistryPermission::ReadWrite);

        let owner = Uuid::new_v4();
        let users = Arc::new(InMemoryUsers::new());
        users.add(owner);
        let projects = Arc::new(InMemoryProjects::new());
        let attributes = Arc::new(RecordingAttributes::new());

        let collaborators =
            Collaborators::new(users.clone(), projects.clone(), attributes.clone());
        let nodes = Arc::new(NodeTreeManager::new(node_registry.clone(), collaborators));
        let templates =
            TemplateManager::try_new(template_registry.clone(), Arc::clone(&nodes)).unwrap();

        Self {
            owner,
            users,
            projects,
            attributes,
            node_registry,
            template_registry,
            nodes,
            templates,
        }
    }

    /// Creates a folder root and registers it as a project of `owner`.
    pub fn project_root(&self, label: &str) -> NodeId {
        let root = self.nodes.create(None, folder(label)).unwrap();
        self.projects.add(Project {
            owner_id: self.owner,
            root_node_id: root,
        });
        root
    }

    pub fn folder_under(&self, parent: NodeId, label: &str) -> NodeId {
        self.nodes.create(Some(parent), folder(label)).unwrap()
    }

    pub fn leaf_under(&self, parent: NodeId, label: &str) -> NodeId {
        self.nodes.create(Some(parent), leaf(label)).unwrap()
    }

    pub fn children_of(&self, node_id: NodeId) -> Vec<NodeId> {
        self.nodes.get_node(node_id).unwrap().children
    }

    pub fn parent_of(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get_node(node_id).unwrap().parent
    }

    pub fn assert_links_consistent(&self) {
        assert_links_consistent(&self.node_registry);
    }
}

pub fn folder(label: &str) -> NodeAttributes {
    NodeAttributes::new(FOLDER).with_attr("label", label)
}

pub fn leaf(label: &str) -> NodeAttributes {
    NodeAttributes::new(LEAF).with_attr("label", label)
}

/// Tree shape without ids: type ids, attrs, holder flags and child order.
pub fn shape(tree: &TreeView) -> Value {
    json!({
        "type_id": tree.type_id,
        "attrs": tree.attrs,
        "holder": tree.holder,
        "children": tree.children.iter().map(shape).collect::<Vec<_>>(),
    })
}

pub fn labels(tree: &TreeView) -> Vec<String> {
    tree.children
        .iter()
        .map(|child| child.attrs["label"].as_str().unwrap().to_string())
        .collect()
}

/// Checks parent/children mutual consistency over every stored node.
pub fn assert_links_consistent<R: Registry>(registry: &R) {
    let nodes: HashMap<NodeId, NodeRecord> = registry
        .read(&Predicate::all())
        .unwrap()
        .into_iter()
        .map(|entry| {
            let record: NodeRecord = from_record(entry.id, entry.record).unwrap();
            (entry.id, record)
        })
        .collect();

    for (id, node) in &nodes {
        for child in &node.children {
            let child_node = nodes
                .get(child)
                .unwrap_or_else(|| panic!("child {child} of {id} is missing"));
            assert_eq!(child_node.parent, Some(*id), "child {child} points elsewhere");
        }
        if let Some(parent) = node.parent {
            let parent_node = nodes
                .get(&parent)
                .unwrap_or_else(|| panic!("parent {parent} of {id} is missing"));
            let occurrences = parent_node.children.iter().filter(|c| *c == id).count();
            assert_eq!(occurrences, 1, "node {id} listed {occurrences} times by parent");
        }
    }
}
