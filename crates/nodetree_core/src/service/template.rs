//! Template use-case service.
//!
//! # Responsibility
//! - Snapshot node subtrees into detached template trees.
//! - Instantiate templates as fresh detached subtrees.
//! - Guarantee a default template exists once the service is wired.
//!
//! # Invariants
//! - A copy shares no node id with its source and has the same shape:
//!   type ids, attrs, holder flags and child order.
//! - Template trees are never attached to a project.
//! - A failed copy leaves no nodes behind.

use crate::model::attribute::{NodeAttributes, DEFAULT_TYPE_ID};
use crate::model::node::{NodeId, TreeView};
use crate::model::template::{TemplateId, TemplateRecord, TemplateView};
use crate::registry::{from_record, to_record, Predicate, Registry};
use crate::service::cancel::CancelToken;
use crate::service::error::{TreeError, TreeResult};
use crate::service::node_tree::NodeTreeManager;
use log::info;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Produces detached copies of templates for `NodeTreeManager::try_create`.
pub trait TemplateInstantiator {
    fn instantiate(&self, template_id: TemplateId) -> TreeResult<TreeView>;
}

/// Template service facade.
pub struct TemplateManager<T: Registry, N: Registry> {
    registry: T,
    nodes: Arc<NodeTreeManager<N>>,
    default_template_id: TemplateId,
}

impl<T: Registry, N: Registry> TemplateManager<T, N> {
    /// Wires the service and makes sure a default template exists.
    ///
    /// When the template registry already holds templates, the first one is
    /// adopted as default and nothing is created.
    pub fn try_new(registry: T, nodes: Arc<NodeTreeManager<N>>) -> TreeResult<Self> {
        let default_template_id = match registry.read(&Predicate::all())?.first() {
            Some(entry) => entry.id,
            None => {
                let root_node_id = nodes.create(None, NodeAttributes::new(DEFAULT_TYPE_ID))?;
                let template_id = Uuid::new_v4();
                if let Err(err) = store_template(&registry, template_id, root_node_id) {
                    nodes.discard_detached(root_node_id);
                    return Err(err);
                }
                info!(
                    "event=template_bootstrap module=template status=ok template_id={template_id} root_node_id={root_node_id}"
                );
                template_id
            }
        };

        Ok(Self {
            registry,
            nodes,
            default_template_id,
        })
    }

    /// Template registered at startup.
    pub fn default_template_id(&self) -> TemplateId {
        self.default_template_id
    }

    /// Lists all template ids in creation order.
    pub fn get_all(&self) -> TreeResult<Vec<TemplateId>> {
        Ok(self
            .registry
            .read(&Predicate::all())?
            .into_iter()
            .map(|entry| entry.id)
            .collect())
    }

    /// Loads one template together with its tree.
    pub fn get(&self, template_id: TemplateId) -> TreeResult<TemplateView> {
        let root_node_id = self.root_node_id(template_id)?;
        let tree = self.nodes.get_tree(root_node_id)?;
        Ok(TemplateView {
            id: template_id,
            tree,
        })
    }

    /// Snapshots the subtree rooted at `node_id` as a new template.
    pub fn create(&self, node_id: NodeId) -> TreeResult<TemplateId> {
        self.create_with(node_id, &CancelToken::new())
    }

    /// Same as `create`; cancellation is honoured until the copy starts.
    pub fn create_with(&self, node_id: NodeId, cancel: &CancelToken) -> TreeResult<TemplateId> {
        let started_at = Instant::now();
        let tree = self.nodes.get_tree_with(node_id, cancel)?;
        let copy = self.deep_copy(&tree, cancel)?;

        let template_id = Uuid::new_v4();
        if let Err(err) = store_template(&self.registry, template_id, copy.id) {
            self.nodes.discard_detached(copy.id);
            return Err(err);
        }
        info!(
            "event=template_create module=template status=ok template_id={template_id} source_node_id={node_id} root_node_id={} node_count={} duration_ms={}",
            copy.id,
            copy.len(),
            started_at.elapsed().as_millis()
        );
        Ok(template_id)
    }

    /// Same as `instantiate`; cancellation is honoured until the copy starts.
    pub fn instantiate_with(
        &self,
        template_id: TemplateId,
        cancel: &CancelToken,
    ) -> TreeResult<TreeView> {
        let started_at = Instant::now();
        let root_node_id = self.root_node_id(template_id)?;
        let tree = self.nodes.get_tree_with(root_node_id, cancel)?;
        let copy = self.deep_copy(&tree, cancel)?;
        info!(
            "event=template_instantiate module=template status=ok template_id={template_id} root_node_id={} node_count={} duration_ms={}",
            copy.id,
            copy.len(),
            started_at.elapsed().as_millis()
        );
        Ok(copy)
    }

    fn root_node_id(&self, template_id: TemplateId) -> TreeResult<NodeId> {
        let entry = self
            .registry
            .read(&Predicate::id(template_id))?
            .into_iter()
            .next()
            .ok_or(TreeError::TemplateNotFound(template_id))?;
        let record: TemplateRecord = from_record(entry.id, entry.record)?;
        Ok(record.root_node_id)
    }

    fn deep_copy(&self, tree: &TreeView, cancel: &CancelToken) -> TreeResult<TreeView> {
        cancel.check()?;
        self.nodes.copy_detached(tree)
    }
}

impl<T: Registry, N: Registry> TemplateInstantiator for TemplateManager<T, N> {
    fn instantiate(&self, template_id: TemplateId) -> TreeResult<TreeView> {
        self.instantiate_with(template_id, &CancelToken::new())
    }
}

fn store_template<T: Registry>(
    registry: &T,
    template_id: TemplateId,
    root_node_id: NodeId,
) -> TreeResult<()> {
    registry.create(template_id, to_record(&TemplateRecord { root_node_id })?)?;
    Ok(())
}
