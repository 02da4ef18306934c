//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests and for the CLI's round-trip command.
//!
//! Transactions work on a copy of the node table taken under the write lock;
//! the copy replaces the table only when the unit of work succeeds. Failure
//! injection hooks let tests make individual writes fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::{
    Catalog, Definition, NewTreeNode, Project, StorageError, TagStore, TreeNode, TreeStore,
    TreeTransaction,
};
use crate::model::{ActorId, NodeId, ProjectId};
use crate::reference::ReferenceDomain;

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    projects: HashMap<ProjectId, Project>,
    nodes: BTreeMap<NodeId, TreeNode>,
    tags: HashMap<NodeId, Vec<String>>,
    definitions: BTreeMap<u64, Definition>,
    next_node_id: NodeId,
    next_definition_id: u64,
    failing_creates: HashSet<String>,
    failing_tombstones: HashSet<NodeId>,
}

fn sort_for_listing(nodes: &mut [TreeNode]) {
    nodes.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn live_children(nodes: &BTreeMap<NodeId, TreeNode>, project: ProjectId, parent: NodeId) -> Vec<TreeNode> {
    let mut children: Vec<TreeNode> = nodes
        .values()
        .filter(|n| n.project_id == project && n.parent_id == parent && n.is_live())
        .cloned()
        .collect();
    sort_for_listing(&mut children);
    children
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of every storage trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StorageError> {
        self.inner
            .read()
            .map_err(|_| StorageError::Internal("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Internal("store lock poisoned".into()))
    }

    /// Register (or replace) a project
    pub fn add_project(&self, project: Project) -> Result<(), StorageError> {
        self.write()?.projects.insert(project.id, project);
        Ok(())
    }

    /// Make every future `create_node` with this title fail
    pub fn fail_create_titled(&self, title: impl Into<String>) -> Result<(), StorageError> {
        self.write()?.failing_creates.insert(title.into());
        Ok(())
    }

    /// Make every future tombstone of this node fail
    pub fn fail_tombstone_of(&self, id: NodeId) -> Result<(), StorageError> {
        self.write()?.failing_tombstones.insert(id);
        Ok(())
    }

    /// Every node of a project, tombstoned or not, in id order
    pub fn all_nodes(&self, project: ProjectId) -> Result<Vec<TreeNode>, StorageError> {
        Ok(self
            .read()?
            .nodes
            .values()
            .filter(|n| n.project_id == project)
            .cloned()
            .collect())
    }
}

impl TreeStore for MemoryStore {
    fn create_node(&self, node: NewTreeNode) -> Result<TreeNode, StorageError> {
        let mut inner = self.write()?;
        if inner.failing_creates.contains(&node.title) {
            return Err(StorageError::Internal(format!("create of '{}' rejected", node.title)));
        }
        if node.parent_id != 0 {
            match inner.nodes.get(&node.parent_id) {
                Some(parent) if parent.project_id == node.project_id => {}
                _ => return Err(StorageError::NotFound),
            }
        }

        inner.next_node_id += 1;
        let now = Utc::now();
        let created = TreeNode {
            id: inner.next_node_id,
            project_id: node.project_id,
            parent_id: node.parent_id,
            title: node.title,
            kind: node.kind,
            content_kind: node.content_kind,
            content: node.content,
            display_order: node.display_order,
            created_by: node.created_by,
            updated_by: node.created_by,
            deleted_by: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        inner.nodes.insert(created.id, created.clone());
        Ok(created)
    }

    fn update_node(&self, node: &TreeNode) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        match inner.nodes.get_mut(&node.id) {
            Some(existing) if existing.project_id == node.project_id => {
                *existing = node.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    fn get_node(&self, project: ProjectId, id: NodeId) -> Result<Option<TreeNode>, StorageError> {
        Ok(self
            .get_node_unscoped(project, id)?
            .filter(TreeNode::is_live))
    }

    fn get_node_unscoped(&self, project: ProjectId, id: NodeId) -> Result<Option<TreeNode>, StorageError> {
        Ok(self
            .read()?
            .nodes
            .get(&id)
            .filter(|n| n.project_id == project)
            .cloned())
    }

    fn list_nodes(&self, project: ProjectId) -> Result<Vec<TreeNode>, StorageError> {
        let mut nodes: Vec<TreeNode> = self
            .read()?
            .nodes
            .values()
            .filter(|n| n.project_id == project && n.is_live())
            .cloned()
            .collect();
        sort_for_listing(&mut nodes);
        Ok(nodes)
    }

    fn list_children(&self, project: ProjectId, parent: NodeId) -> Result<Vec<TreeNode>, StorageError> {
        Ok(live_children(&self.read()?.nodes, project, parent))
    }

    fn list_tombstoned(&self, project: ProjectId) -> Result<Vec<TreeNode>, StorageError> {
        Ok(self
            .read()?
            .nodes
            .values()
            .filter(|n| n.project_id == project && !n.is_live())
            .cloned()
            .collect())
    }

    fn restore_node(
        &self,
        project: ProjectId,
        id: NodeId,
        parent: NodeId,
        display_order: i64,
    ) -> Result<TreeNode, StorageError> {
        let mut inner = self.write()?;
        let node = inner
            .nodes
            .get_mut(&id)
            .filter(|n| n.project_id == project)
            .ok_or(StorageError::NotFound)?;
        node.parent_id = parent;
        node.display_order = display_order;
        node.deleted_at = None;
        node.deleted_by = 0;
        Ok(node.clone())
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn TreeTransaction) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        let committed = {
            let mut tx = MemoryTransaction {
                nodes: inner.nodes.clone(),
                failing_tombstones: &inner.failing_tombstones,
            };
            work(&mut tx)?;
            tx.nodes
        };
        inner.nodes = committed;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

struct MemoryTransaction<'a> {
    nodes: BTreeMap<NodeId, TreeNode>,
    failing_tombstones: &'a HashSet<NodeId>,
}

impl TreeTransaction for MemoryTransaction<'_> {
    fn get_node(&self, project: ProjectId, id: NodeId) -> Result<Option<TreeNode>, StorageError> {
        Ok(self
            .nodes
            .get(&id)
            .filter(|n| n.project_id == project && n.is_live())
            .cloned())
    }

    fn list_children(&self, project: ProjectId, parent: NodeId) -> Result<Vec<TreeNode>, StorageError> {
        Ok(live_children(&self.nodes, project, parent))
    }

    fn tombstone(
        &mut self,
        project: ProjectId,
        id: NodeId,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if self.failing_tombstones.contains(&id) {
            return Err(StorageError::Internal(format!("tombstone of node {} rejected", id)));
        }
        let node = self
            .nodes
            .get_mut(&id)
            .filter(|n| n.project_id == project)
            .ok_or(StorageError::NotFound)?;
        node.deleted_at = Some(at);
        node.deleted_by = actor;
        Ok(())
    }
}

impl TagStore for MemoryStore {
    fn import_tags(&self, project: ProjectId, node: NodeId, tags: &[String]) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        if !inner.nodes.get(&node).is_some_and(|n| n.project_id == project) {
            return Err(StorageError::NotFound);
        }
        let stored = inner.tags.entry(node).or_default();
        for tag in tags {
            if !stored.contains(tag) {
                stored.push(tag.clone());
            }
        }
        Ok(())
    }

    fn export_tags(&self, project: ProjectId, node: NodeId) -> Result<Vec<String>, StorageError> {
        let inner = self.read()?;
        if !inner.nodes.get(&node).is_some_and(|n| n.project_id == project) {
            return Ok(Vec::new());
        }
        Ok(inner.tags.get(&node).cloned().unwrap_or_default())
    }
}

impl Catalog for MemoryStore {
    fn project(&self, project: ProjectId) -> Result<Option<Project>, StorageError> {
        Ok(self.read()?.projects.get(&project).cloned())
    }

    fn list_definitions(
        &self,
        project: ProjectId,
        domain: ReferenceDomain,
    ) -> Result<Vec<Definition>, StorageError> {
        Ok(self
            .read()?
            .definitions
            .values()
            .filter(|d| d.project_id == project && d.domain == domain)
            .cloned()
            .collect())
    }

    fn create_definition(
        &self,
        project: ProjectId,
        domain: ReferenceDomain,
        name: &str,
        body: String,
    ) -> Result<Definition, StorageError> {
        let mut inner = self.write()?;
        if !inner.projects.contains_key(&project) {
            return Err(StorageError::NotFound);
        }
        let taken = inner
            .definitions
            .values()
            .any(|d| d.project_id == project && d.domain == domain && d.name == name);
        if taken {
            return Err(StorageError::Conflict(format!("{} '{}' already defined", domain, name)));
        }

        inner.next_definition_id += 1;
        let definition = Definition {
            id: inner.next_definition_id,
            project_id: project,
            domain,
            name: name.to_string(),
            body,
        };
        inner.definitions.insert(definition.id, definition.clone());
        Ok(definition)
    }

    fn update_definition(&self, definition: &Definition) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        match inner.definitions.get_mut(&definition.id) {
            Some(existing) if existing.project_id == definition.project_id => {
                *existing = definition.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Info, NodeKind};

    fn store_with_project() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .add_project(Project {
                id: 1,
                info: Info {
                    title: "Pets".to_string(),
                    description: None,
                    version: "1.0.0".to_string(),
                },
                servers: Vec::new(),
            })
            .unwrap();
        store
    }

    fn new_node(parent: NodeId, title: &str, order: i64) -> NewTreeNode {
        NewTreeNode {
            project_id: 1,
            parent_id: parent,
            title: title.to_string(),
            kind: NodeKind::Category,
            content_kind: None,
            content: None,
            display_order: order,
            created_by: 0,
        }
    }

    #[test]
    fn test_listing_order() {
        let store = store_with_project();
        let a = store.create_node(new_node(0, "a", 1)).unwrap();
        let b = store.create_node(new_node(0, "b", 0)).unwrap();
        let c = store.create_node(new_node(0, "c", 1)).unwrap();

        let ids: Vec<_> = store.list_nodes(1).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[test]
    fn test_create_rejects_foreign_parent() {
        let store = store_with_project();
        let err = store.create_node(new_node(42, "orphan", 0)).unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[test]
    fn test_failed_transaction_discards_writes() {
        let store = store_with_project();
        let a = store.create_node(new_node(0, "a", 0)).unwrap();
        let b = store.create_node(new_node(0, "b", 0)).unwrap();
        store.fail_tombstone_of(b.id).unwrap();

        let result = store.transaction(&mut |tx| {
            tx.tombstone(1, a.id, 0, Utc::now())?;
            tx.tombstone(1, b.id, 0, Utc::now())
        });

        assert!(result.is_err());
        assert!(store.get_node(1, a.id).unwrap().is_some());
        assert!(store.list_tombstoned(1).unwrap().is_empty());
    }

    #[test]
    fn test_definition_names_unique_per_domain() {
        let store = store_with_project();
        store
            .create_definition(1, ReferenceDomain::Schema, "User", "{}".into())
            .unwrap();
        store
            .create_definition(1, ReferenceDomain::Response, "User", "{}".into())
            .unwrap();
        let err = store
            .create_definition(1, ReferenceDomain::Schema, "User", "{}".into())
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }
}
