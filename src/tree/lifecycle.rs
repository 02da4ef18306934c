//! Node lifecycle: cascading delete, restore, trash, move and copy.
//!
//! ```text
//! live ──delete──▶ tombstoned ──restore──▶ live
//!                       └──(external retention)──▶ removed
//! ```
//!
//! Delete cascades to every live descendant inside one transaction. Restore
//! brings back a single node; descendants stay tombstoned until restored
//! individually.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{InterchangeError, Result};
use crate::model::{ActorId, NodeId, ProjectId, ROOT_ID};
use crate::storage::{NewTreeNode, StorageError, TagStore, TreeNode, TreeStore, TreeTransaction};

/// Where a restored node goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreTarget {
    pub parent_id: NodeId,
    pub display_order: i64,
}

impl RestoreTarget {
    /// Back under the node's recorded parent
    pub fn original(node: &TreeNode) -> Self {
        Self {
            parent_id: node.parent_id,
            display_order: node.display_order,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub node: TreeNode,
    /// The node's parent is not live, so the node is unreachable from the
    /// root until the parent is restored or the node is moved
    pub orphaned: bool,
}

/// Unit of work threaded through the recursive delete so every level writes
/// into the same transaction.
struct CascadeDelete<'t> {
    tx: &'t mut dyn TreeTransaction,
    project: ProjectId,
    actor: ActorId,
    at: DateTime<Utc>,
    tombstoned: Vec<NodeId>,
}

impl CascadeDelete<'_> {
    fn delete(&mut self, id: NodeId) -> std::result::Result<(), StorageError> {
        if self.tx.get_node(self.project, id)?.is_none() {
            return Err(StorageError::NotFound);
        }
        for child in self.tx.list_children(self.project, id)? {
            self.delete(child.id)?;
        }
        self.tx.tombstone(self.project, id, self.actor, self.at)?;
        self.tombstoned.push(id);
        Ok(())
    }
}

/// Lifecycle operations over a project tree
pub struct TreeLifecycle<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: TreeStore + TagStore + ?Sized> TreeLifecycle<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Tombstone `id` and all its live descendants, children first.
    ///
    /// Returns the tombstoned ids in the order they were written. Either all
    /// of them are tombstoned or none are.
    pub fn delete(&self, project: ProjectId, id: NodeId, actor: ActorId) -> Result<Vec<NodeId>> {
        if self.store.get_node(project, id)?.is_none() {
            return Err(InterchangeError::not_found("node", id));
        }

        let at = Utc::now();
        let mut tombstoned = Vec::new();
        self.store
            .transaction(&mut |tx| {
                let mut unit = CascadeDelete {
                    tx,
                    project,
                    actor,
                    at,
                    tombstoned: Vec::new(),
                };
                unit.delete(id)?;
                tombstoned = unit.tombstoned;
                Ok(())
            })
            .map_err(|source| InterchangeError::Transaction { node_id: id, source })?;

        tracing::info!(project, node = id, count = tombstoned.len(), "subtree tombstoned");
        Ok(tombstoned)
    }

    /// Bring back a single tombstoned node at `target`.
    pub fn restore(&self, project: ProjectId, id: NodeId, target: RestoreTarget) -> Result<RestoreOutcome> {
        if self.store.get_node_unscoped(project, id)?.is_none() {
            return Err(InterchangeError::not_found("node", id));
        }
        if target.parent_id != ROOT_ID {
            if self.store.get_node_unscoped(project, target.parent_id)?.is_none() {
                return Err(InterchangeError::not_found("node", target.parent_id));
            }
            self.ensure_not_descendant(project, id, target.parent_id)?;
        }

        let node = self
            .store
            .restore_node(project, id, target.parent_id, target.display_order)?;
        let orphaned = node.parent_id != ROOT_ID && self.store.get_node(project, node.parent_id)?.is_none();
        if orphaned {
            tracing::warn!(project, node = id, parent = node.parent_id, "restored under a tombstoned parent");
        } else {
            tracing::info!(project, node = id, "node restored");
        }
        Ok(RestoreOutcome { node, orphaned })
    }

    /// Tombstoned nodes of a project
    pub fn list_trash(&self, project: ProjectId) -> Result<Vec<TreeNode>> {
        Ok(self.store.list_tombstoned(project)?)
    }

    /// Reparent and reorder a live node
    pub fn move_node(
        &self,
        project: ProjectId,
        id: NodeId,
        new_parent: NodeId,
        display_order: i64,
        actor: ActorId,
    ) -> Result<TreeNode> {
        let mut node = self
            .store
            .get_node(project, id)?
            .ok_or_else(|| InterchangeError::not_found("node", id))?;

        if new_parent != ROOT_ID {
            let parent = self
                .store
                .get_node(project, new_parent)?
                .ok_or_else(|| InterchangeError::not_found("node", new_parent))?;
            if !parent.is_category() {
                return Err(InterchangeError::InvalidOperation(format!(
                    "node {} is not a category",
                    new_parent
                )));
            }
            self.ensure_not_descendant(project, id, new_parent)?;
        }

        node.parent_id = new_parent;
        node.display_order = display_order;
        node.updated_by = actor;
        node.updated_at = Utc::now();
        self.store.update_node(&node)?;
        Ok(node)
    }

    /// Duplicate a document beside the original, tags included
    pub fn copy_node(&self, project: ProjectId, id: NodeId, actor: ActorId) -> Result<TreeNode> {
        let source = self
            .store
            .get_node(project, id)?
            .ok_or_else(|| InterchangeError::not_found("node", id))?;
        if source.is_category() {
            return Err(InterchangeError::InvalidOperation(
                "only documents can be copied".to_string(),
            ));
        }

        let copy = self.store.create_node(NewTreeNode {
            project_id: project,
            parent_id: source.parent_id,
            title: format!("{} (copy)", source.title),
            kind: source.kind,
            content_kind: source.content_kind,
            content: source.content.clone(),
            display_order: source.display_order,
            created_by: actor,
        })?;
        let tags = self.store.export_tags(project, id)?;
        if !tags.is_empty() {
            self.store.import_tags(project, copy.id, &tags)?;
        }
        Ok(copy)
    }

    /// Fail if `candidate` is `id` itself or lies below it
    fn ensure_not_descendant(&self, project: ProjectId, id: NodeId, candidate: NodeId) -> Result<()> {
        let mut seen = HashSet::new();
        let mut current = candidate;
        while current != ROOT_ID && seen.insert(current) {
            if current == id {
                return Err(InterchangeError::InvalidOperation(format!(
                    "node {} cannot be placed under its own descendant {}",
                    id, candidate
                )));
            }
            current = match self.store.get_node_unscoped(project, current)? {
                Some(node) => node.parent_id,
                None => break,
            };
        }
        Ok(())
    }
}
