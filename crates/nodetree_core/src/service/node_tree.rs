//! Node tree use-case service.
//!
//! # Responsibility
//! - Enforce tree structure invariants above the registry layer.
//! - Provide authorized get/update/traverse/delete/create entry points and
//!   the trusted primitives the template manager builds on.
//!
//! # Invariants
//! - `a ∈ b.children` iff `a.parent == Some(b)`; every mutation writes both
//!   sides before returning.
//! - Reparenting stays inside one tree and never creates a cycle.
//! - Tree roots are never deleted through `try_delete`.
//! - Every read-modify-write sequence runs under the lock of its tree root.

use crate::collab::{AttributeStore, Collaborators, ProjectDirectory, UserDirectory, UserId};
use crate::model::attribute::NodeAttributes;
use crate::model::node::{
    ExtendedNodeView, Node, NodeCreate, NodeId, NodeRecord, NodeUpdate, TreeView,
};
use crate::registry::{from_record, to_record, Registry};
use crate::service::cancel::CancelToken;
use crate::service::error::{TreeError, TreeResult};
use crate::service::template::TemplateInstantiator;
use crate::service::tree_lock::TreeLocks;
use log::{debug, info, warn};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Node tree service facade.
pub struct NodeTreeManager<R: Registry> {
    registry: R,
    users: Arc<dyn UserDirectory>,
    projects: Arc<dyn ProjectDirectory>,
    attributes: Arc<dyn AttributeStore>,
    locks: TreeLocks,
}

impl<R: Registry> NodeTreeManager<R> {
    /// Creates the manager over the node registry and its collaborators.
    pub fn new(registry: R, collaborators: Collaborators) -> Self {
        Self {
            registry,
            users: collaborators.users,
            projects: collaborators.projects,
            attributes: collaborators.attributes,
            locks: TreeLocks::new(),
        }
    }

    /// Loads one node merged with its attribute data.
    ///
    /// # Errors
    /// - `UserNotFound`, `NotAllowed`, `NodeNotFound`, `ProjectNotFound`.
    pub fn try_get(&self, initiator: UserId, node_id: NodeId) -> TreeResult<ExtendedNodeView> {
        let root = self.authorize(initiator, node_id)?;
        self.locks.with_tree(root, || self.extended(node_id))
    }

    /// Moves a node to another parent of the same tree and/or position.
    ///
    /// The position is applied after the optional reparent, within the
    /// (possibly new) parent's child list, clamped to the end of the list.
    ///
    /// # Errors
    /// - Authorization errors as in `try_get`.
    /// - `NodeInDifferentTree` when the new parent lives in another tree.
    /// - `CycleDetected` when the new parent is the node or a descendant.
    /// - `IncompatibleNode` when the node is a root.
    pub fn try_update(
        &self,
        initiator: UserId,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> TreeResult<()> {
        let started_at = Instant::now();
        let result = self.authorize(initiator, node_id).and_then(|root| {
            self.locks.with_tree(root, || {
                let node = self.load(node_id)?;
                if let Some(new_parent) = update.parent {
                    if node.parent != Some(new_parent) {
                        if !self.in_same_tree(&[node_id, new_parent])? {
                            return Err(TreeError::NodeInDifferentTree {
                                node: node_id,
                                parent: new_parent,
                            });
                        }
                        self.ensure_no_cycle(node_id, new_parent)?;
                        self.reparent(node_id, new_parent)?;
                    }
                }
                self.reposition(node_id, update.position)
            })
        });
        log_outcome("node_update", node_id, started_at, result)
    }

    /// Returns the tree view rooted at `node_id`.
    pub fn try_get_tree(&self, initiator: UserId, node_id: NodeId) -> TreeResult<TreeView> {
        self.try_get_tree_with(initiator, node_id, &CancelToken::new())
    }

    /// Same as `try_get_tree`, aborting with `Cancelled` once `cancel` fires.
    pub fn try_get_tree_with(
        &self,
        initiator: UserId,
        node_id: NodeId,
        cancel: &CancelToken,
    ) -> TreeResult<TreeView> {
        let root = self.authorize(initiator, node_id)?;
        self.locks
            .with_tree(root, || self.collect_tree(node_id, cancel))
    }

    /// Deletes a non-root node together with its whole subtree.
    ///
    /// # Errors
    /// - Authorization errors as in `try_get`.
    /// - `NodeCannotBeDeleted` when the node is a tree root.
    pub fn try_delete(&self, initiator: UserId, node_id: NodeId) -> TreeResult<()> {
        let started_at = Instant::now();
        let result = self.authorize(initiator, node_id).and_then(|root| {
            self.locks.with_tree(root, || {
                let node = self.load(node_id)?;
                if node.is_root() {
                    return Err(TreeError::NodeCannotBeDeleted(node_id));
                }
                self.delete_subtree(node).map(|_| ())
            })
        });
        log_outcome("node_delete", node_id, started_at, result)
    }

    /// Instantiates a template and attaches the copy under `new_node.parent`.
    ///
    /// Returns the id of the new subtree root.
    ///
    /// # Errors
    /// - Authorization errors as in `try_get`, checked against the parent.
    /// - `EndNodeError` when the parent's type is not a holder type.
    /// - `TemplateNotFound` when the template does not exist.
    pub fn try_create<T>(
        &self,
        templates: &T,
        initiator: UserId,
        new_node: NodeCreate,
    ) -> TreeResult<NodeId>
    where
        T: TemplateInstantiator + ?Sized,
    {
        let started_at = Instant::now();
        let result = self.create_from_template(templates, initiator, new_node);
        log_outcome("node_create", new_node.parent, started_at, result)
    }

    /// Creates one node without authorization checks.
    ///
    /// With a parent, the node is appended to the parent's children. Without
    /// one, the node becomes the root of a new detached tree.
    pub fn create(
        &self,
        parent: Option<NodeId>,
        attributes: NodeAttributes,
    ) -> TreeResult<NodeId> {
        match parent {
            None => self.insert_node(None, attributes),
            Some(parent_id) => {
                let root = self.root_of(parent_id)?;
                self.locks
                    .with_tree(root, || self.insert_node(Some(parent_id), attributes))
            }
        }
    }

    /// Whether a node record exists.
    pub fn exist(&self, node_id: NodeId) -> TreeResult<bool> {
        Ok(self.registry.get(node_id)?.is_some())
    }

    /// Returns the tree view rooted at `node_id` without authorization.
    pub fn get_tree(&self, node_id: NodeId) -> TreeResult<TreeView> {
        self.get_tree_with(node_id, &CancelToken::new())
    }

    /// Same as `get_tree`, aborting with `Cancelled` once `cancel` fires.
    pub fn get_tree_with(&self, node_id: NodeId, cancel: &CancelToken) -> TreeResult<TreeView> {
        let root = self.root_of(node_id)?;
        self.locks
            .with_tree(root, || self.collect_tree(node_id, cancel))
    }

    /// Loads the bare node record.
    pub fn get_node(&self, node_id: NodeId) -> TreeResult<Node> {
        self.load(node_id)
    }

    /// Resolves the root of the tree containing `node_id`.
    pub fn root_of(&self, node_id: NodeId) -> TreeResult<NodeId> {
        let mut visited = HashSet::new();
        let mut node = self.load(node_id)?;
        while let Some(parent_id) = node.parent {
            if !visited.insert(node.id) {
                return Err(TreeError::InvalidRecord(format!(
                    "parent cycle through node {}",
                    node.id
                )));
            }
            node = self.load(parent_id)?;
        }
        Ok(node.id)
    }

    /// Whether all `node_ids` resolve to the same root. Vacuously true for
    /// zero or one id.
    pub fn in_same_tree(&self, node_ids: &[NodeId]) -> TreeResult<bool> {
        let Some((first, rest)) = node_ids.split_first() else {
            return Ok(true);
        };
        let expected = self.root_of(*first)?;
        for node_id in rest {
            if self.root_of(*node_id)? != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Deletes a detached tree produced by a failed or abandoned copy.
    pub(crate) fn discard_detached(&self, root_id: NodeId) {
        let result = self.locks.with_tree(root_id, || {
            let root = self.load(root_id)?;
            self.delete_subtree(root)
        });
        match result {
            Ok(count) => info!(
                "event=node_discard module=node_tree status=ok node_id={root_id} deleted={count}"
            ),
            Err(err) => warn!(
                "event=node_discard module=node_tree status=error node_id={root_id} error_code={} error={err}",
                err.code()
            ),
        }
    }

    /// Allocates a new detached tree with the shape of `tree`, parents
    /// before children and siblings in order, and returns the view with the
    /// new ids. The new root is locked once for the whole copy; on failure
    /// everything allocated so far is discarded.
    pub(crate) fn copy_detached(&self, tree: &TreeView) -> TreeResult<TreeView> {
        let mut copy = tree.clone();
        copy.id = self.insert_node(None, copy.attributes())?;
        let root_id = copy.id;

        let filled = self.locks.with_tree(root_id, || -> TreeResult<()> {
            let mut pending: Vec<(NodeId, &mut TreeView)> = copy
                .children
                .iter_mut()
                .rev()
                .map(|child| (root_id, child))
                .collect();
            while let Some((parent_id, current)) = pending.pop() {
                current.id = self.insert_node(Some(parent_id), current.attributes())?;
                let current_id = current.id;
                pending.extend(
                    current
                        .children
                        .iter_mut()
                        .rev()
                        .map(|child| (current_id, child)),
                );
            }
            Ok(())
        });
        if let Err(err) = filled {
            self.discard_detached(root_id);
            return Err(err);
        }
        Ok(copy)
    }

    fn create_from_template<T>(
        &self,
        templates: &T,
        initiator: UserId,
        new_node: NodeCreate,
    ) -> TreeResult<NodeId>
    where
        T: TemplateInstantiator + ?Sized,
    {
        let root = self.authorize(initiator, new_node.parent)?;
        let parent_attributes = self.attributes.get_attribute(new_node.parent)?;
        let parent_type = self.attributes.get_type(&parent_attributes.type_id)?;
        if !parent_type.holder {
            return Err(TreeError::EndNodeError(new_node.parent));
        }

        // The copy is detached until reparented, so no tree lock is held
        // while instantiating.
        let instantiated = templates.instantiate(new_node.template_id)?;
        let attached = self
            .locks
            .with_tree(root, || self.reparent(instantiated.id, new_node.parent));
        if let Err(err) = attached {
            self.discard_detached(instantiated.id);
            return Err(err);
        }
        Ok(instantiated.id)
    }

    fn insert_node(
        &self,
        parent: Option<NodeId>,
        attributes: NodeAttributes,
    ) -> TreeResult<NodeId> {
        self.attributes.get_type(&attributes.type_id)?;
        let mut parent_node = parent.map(|id| self.load(id)).transpose()?;

        let node = Node::new(parent);
        self.registry.create(node.id, to_record(&node.to_record())?)?;
        if let Err(err) = self.attributes.create_attribute(node.id, attributes) {
            if let Err(cleanup) = self.registry.delete(node.id) {
                warn!(
                    "event=node_create module=node_tree status=error node_id={} error_code=cleanup_failed error={cleanup}",
                    node.id
                );
            }
            return Err(err.into());
        }

        if let Some(parent_node) = parent_node.as_mut() {
            parent_node.children.push(node.id);
            self.save(parent_node)?;
        }
        debug!(
            "event=node_insert module=node_tree status=ok node_id={} parent_id={}",
            node.id,
            display_parent(parent)
        );
        Ok(node.id)
    }

    fn authorize(&self, initiator: UserId, node_id: NodeId) -> TreeResult<NodeId> {
        self.users.user_exists(initiator)?;
        let root = self.root_of(node_id)?;
        let project = self.projects.get_by_root_node_id(root)?;
        if project.owner_id != initiator {
            return Err(TreeError::NotAllowed {
                initiator,
                node: node_id,
            });
        }
        Ok(root)
    }

    fn ensure_no_cycle(&self, node_id: NodeId, candidate_parent: NodeId) -> TreeResult<()> {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent);
        while let Some(current) = cursor {
            if current == node_id || !visited.insert(current) {
                return Err(TreeError::CycleDetected {
                    node: node_id,
                    parent: candidate_parent,
                });
            }
            cursor = self.load(current)?.parent;
        }
        Ok(())
    }

    fn reparent(&self, node_id: NodeId, new_parent_id: NodeId) -> TreeResult<()> {
        let mut node = self.load(node_id)?;
        let mut new_parent = self.load(new_parent_id)?;

        if let Some(old_parent_id) = node.parent {
            let mut old_parent = self.load(old_parent_id)?;
            old_parent.children.retain(|id| *id != node_id);
            self.save(&old_parent)?;
        }

        new_parent.children.push(node_id);
        node.parent = Some(new_parent_id);
        self.save(&node)?;
        self.save(&new_parent)?;
        debug!(
            "event=node_reparent module=node_tree status=ok node_id={node_id} parent_id={new_parent_id}"
        );
        Ok(())
    }

    fn reposition(&self, node_id: NodeId, position: usize) -> TreeResult<()> {
        let node = self.load(node_id)?;
        let parent_id = node.parent.ok_or(TreeError::IncompatibleNode(node_id))?;
        let mut parent = self.load(parent_id)?;

        parent.children.retain(|id| *id != node_id);
        let index = position.min(parent.children.len());
        parent.children.insert(index, node_id);
        self.save(&parent)?;
        debug!(
            "event=node_reposition module=node_tree status=ok node_id={node_id} parent_id={parent_id} index={index}"
        );
        Ok(())
    }

    /// Detaches `node` from its parent, then removes it and every descendant
    /// along with their attributes. Nodes already gone are skipped.
    ///
    /// Once detached, the cascade always drains the whole subtree: a failed
    /// registry or attribute call is logged and the walk continues, then
    /// the first failure is returned.
    fn delete_subtree(&self, node: Node) -> TreeResult<usize> {
        if let Some(parent_id) = node.parent {
            let mut parent = self.load(parent_id)?;
            parent.children.retain(|id| *id != node.id);
            self.save(&parent)?;
        }

        let mut deleted = 0;
        let mut first_error = None;
        let mut pending = vec![node.id];
        while let Some(current_id) = pending.pop() {
            let current = match self.fetch(current_id) {
                Ok(Some(current)) => current,
                Ok(None) => {
                    debug!(
                        "event=node_delete module=node_tree status=skip node_id={current_id} reason=missing"
                    );
                    continue;
                }
                Err(err) => {
                    note_cascade_error(&mut first_error, current_id, err);
                    continue;
                }
            };
            pending.extend(current.children.iter().copied());

            if let Err(err) = self.attributes.delete_attribute(current_id) {
                note_cascade_error(&mut first_error, current_id, err.into());
            }
            match self.registry.delete(current_id) {
                Ok(()) => deleted += 1,
                Err(err) => note_cascade_error(&mut first_error, current_id, err.into()),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(deleted),
        }
    }

    fn extended(&self, node_id: NodeId) -> TreeResult<ExtendedNodeView> {
        let node = self.load(node_id)?;
        let attributes = self.attributes.get_attribute(node_id)?;
        let attribute_type = self.attributes.get_type(&attributes.type_id)?;
        Ok(ExtendedNodeView {
            id: node.id,
            parent: node.parent,
            children: node.children,
            type_id: attributes.type_id,
            attrs: attributes.attrs,
            holder: attribute_type.holder,
        })
    }

    fn shallow_view(&self, node_id: NodeId) -> TreeResult<TreeView> {
        let attributes = self.attributes.get_attribute(node_id)?;
        let attribute_type = self.attributes.get_type(&attributes.type_id)?;
        Ok(TreeView::leaf(node_id, attributes, attribute_type.holder))
    }

    /// Breadth-first traversal into a flat list, then bottom-up assembly.
    /// Children always sit at higher indices than their parent.
    fn collect_tree(&self, node_id: NodeId, cancel: &CancelToken) -> TreeResult<TreeView> {
        let mut flat: Vec<(TreeView, Vec<usize>)> = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(node_id, None::<usize>)]);

        while let Some((current_id, parent_index)) = queue.pop_front() {
            cancel.check()?;
            if !visited.insert(current_id) {
                return Err(TreeError::InvalidRecord(format!(
                    "node {current_id} is reachable twice below {node_id}"
                )));
            }
            let node = self.load(current_id)?;
            let index = flat.len();
            flat.push((self.shallow_view(current_id)?, Vec::new()));
            if let Some(parent_index) = parent_index {
                flat[parent_index].1.push(index);
            }
            queue.extend(node.children.iter().map(|child| (*child, Some(index))));
        }

        let mut built: Vec<Option<TreeView>> = (0..flat.len()).map(|_| None).collect();
        for (index, (mut view, child_indices)) in flat.into_iter().enumerate().rev() {
            view.children = child_indices
                .into_iter()
                .filter_map(|child| built[child].take())
                .collect();
            built[index] = Some(view);
        }
        built
            .into_iter()
            .next()
            .flatten()
            .ok_or(TreeError::NodeNotFound(node_id))
    }

    fn fetch(&self, node_id: NodeId) -> TreeResult<Option<Node>> {
        let Some(record) = self.registry.get(node_id)? else {
            return Ok(None);
        };
        let record: NodeRecord = from_record(node_id, record)?;
        Ok(Some(Node::from_record(node_id, record)))
    }

    fn load(&self, node_id: NodeId) -> TreeResult<Node> {
        self.fetch(node_id)?
            .ok_or(TreeError::NodeNotFound(node_id))
    }

    fn save(&self, node: &Node) -> TreeResult<()> {
        self.registry.update(node.id, to_record(&node.to_record())?)?;
        Ok(())
    }
}

fn display_parent(parent: Option<NodeId>) -> String {
    parent.map_or_else(|| "none".to_string(), |id| id.to_string())
}

fn note_cascade_error(first_error: &mut Option<TreeError>, node_id: NodeId, err: TreeError) {
    warn!(
        "event=node_delete module=node_tree status=error node_id={node_id} error_code={} error={err}",
        err.code()
    );
    first_error.get_or_insert(err);
}

fn log_outcome<T>(
    event: &'static str,
    node_id: NodeId,
    started_at: Instant,
    result: TreeResult<T>,
) -> TreeResult<T> {
    match &result {
        Ok(_) => info!(
            "event={event} module=node_tree status=ok node_id={node_id} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={event} module=node_tree status=error node_id={node_id} duration_ms={} error_code={} error={err}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
    result
}
