//! Core engine for hierarchical node trees and subtree templates.
//! This crate is the single source of truth for tree invariants.

pub mod collab;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod service;

pub use collab::{
    AttributeStore, CollabError, CollabResult, Collaborators, InMemoryAttributes,
    InMemoryProjects, InMemoryUsers, Project, ProjectDirectory, UserDirectory, UserId,
};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attribute::{AttrMap, AttributeType, NodeAttributes, TypeId, DEFAULT_TYPE_ID};
pub use model::node::{
    ExtendedNodeView, Node, NodeCreate, NodeId, NodeRecord, NodeUpdate, TreeView,
};
pub use model::template::{TemplateId, TemplateRecord, TemplateView};
pub use registry::memory::{MemoryRegistry, MemoryRegistryFactory};
pub use registry::sqlite::{SqliteRegistry, SqliteRegistryFactory};
pub use registry::{
    Entry, Predicate, Record, RecordId, Registry, RegistryError, RegistryFactory,
    RegistryPermission, RegistryResult, NODES_COLLECTION, TEMPLATES_COLLECTION,
};
pub use service::cancel::CancelToken;
pub use service::error::{TreeError, TreeResult};
pub use service::node_tree::NodeTreeManager;
pub use service::template::{TemplateInstantiator, TemplateManager};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
