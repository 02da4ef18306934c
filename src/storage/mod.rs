//! Storage collaborators.
//!
//! The engine never talks to a database directly. It depends on three
//! narrow contracts:
//!
//! | Trait | Responsibility |
//! |-------|----------------|
//! | [`TreeStore`] | CRUD on tree nodes, live/tombstoned queries, transactions |
//! | [`TagStore`] | Tags attached to tree nodes |
//! | [`Catalog`] | Projects and the definitions of every reference domain |
//!
//! [`MemoryStore`] implements all three and backs the tests and the CLI.
//!
//! [`MemoryStore`]: memory::MemoryStore

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ActorId, ContentKind, Info, NodeId, NodeKind, ProjectId, Server};
use crate::reference::ReferenceDomain;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item does not exist.
    #[error("not found")]
    NotFound,

    /// An item with the same key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Persisted types
// ---------------------------------------------------------------------------

/// A persisted node of a project's collection tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub project_id: ProjectId,
    /// `0` for nodes at the root of the project
    pub parent_id: NodeId,
    pub title: String,
    pub kind: NodeKind,
    pub content_kind: Option<ContentKind>,
    /// Encoded content body; present only for documents
    pub content: Option<String>,
    /// Sibling ordering hint
    pub display_order: i64,
    pub created_by: ActorId,
    pub updated_by: ActorId,
    pub deleted_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Tombstone; `None` while the node is live
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TreeNode {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_category(&self) -> bool {
        self.kind == NodeKind::Category
    }
}

/// Fields supplied when creating a tree node; the store assigns the rest
#[derive(Debug, Clone, PartialEq)]
pub struct NewTreeNode {
    pub project_id: ProjectId,
    pub parent_id: NodeId,
    pub title: String,
    pub kind: NodeKind,
    pub content_kind: Option<ContentKind>,
    pub content: Option<String>,
    pub display_order: i64,
    pub created_by: ActorId,
}

/// A shared definition of one reference domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub id: u64,
    pub project_id: ProjectId,
    pub domain: ReferenceDomain,
    pub name: String,
    /// Encoded definition body, with references in id form
    pub body: String,
}

/// Project metadata carried into exported documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistence of the collection tree.
///
/// Every query except [`TreeStore::get_node_unscoped`] and
/// [`TreeStore::list_tombstoned`] sees live nodes only.
pub trait TreeStore {
    fn create_node(&self, node: NewTreeNode) -> Result<TreeNode, StorageError>;

    /// Overwrite a node's mutable fields
    fn update_node(&self, node: &TreeNode) -> Result<(), StorageError>;

    fn get_node(&self, project: ProjectId, id: NodeId) -> Result<Option<TreeNode>, StorageError>;

    /// Fetch a node whether or not it is tombstoned
    fn get_node_unscoped(&self, project: ProjectId, id: NodeId) -> Result<Option<TreeNode>, StorageError>;

    /// All live nodes of a project ordered by `(display_order asc, id desc)`
    fn list_nodes(&self, project: ProjectId) -> Result<Vec<TreeNode>, StorageError>;

    fn list_children(&self, project: ProjectId, parent: NodeId) -> Result<Vec<TreeNode>, StorageError>;

    fn list_tombstoned(&self, project: ProjectId) -> Result<Vec<TreeNode>, StorageError>;

    /// Clear a tombstone and reposition the node
    fn restore_node(
        &self,
        project: ProjectId,
        id: NodeId,
        parent: NodeId,
        display_order: i64,
    ) -> Result<TreeNode, StorageError>;

    /// Run `work` inside one transaction boundary. Every write issued through
    /// the transaction is committed if `work` returns `Ok`, and discarded
    /// otherwise.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn TreeTransaction) -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;
}

/// The operations available inside [`TreeStore::transaction`]
pub trait TreeTransaction {
    fn get_node(&self, project: ProjectId, id: NodeId) -> Result<Option<TreeNode>, StorageError>;

    fn list_children(&self, project: ProjectId, parent: NodeId) -> Result<Vec<TreeNode>, StorageError>;

    fn tombstone(
        &mut self,
        project: ProjectId,
        id: NodeId,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Tags attached to tree nodes
pub trait TagStore {
    fn import_tags(&self, project: ProjectId, node: NodeId, tags: &[String]) -> Result<(), StorageError>;

    fn export_tags(&self, project: ProjectId, node: NodeId) -> Result<Vec<String>, StorageError>;
}

/// Projects and their shared definitions
pub trait Catalog {
    fn project(&self, project: ProjectId) -> Result<Option<Project>, StorageError>;

    /// Live definitions of one domain, in creation order
    fn list_definitions(
        &self,
        project: ProjectId,
        domain: ReferenceDomain,
    ) -> Result<Vec<Definition>, StorageError>;

    fn create_definition(
        &self,
        project: ProjectId,
        domain: ReferenceDomain,
        name: &str,
        body: String,
    ) -> Result<Definition, StorageError>;

    fn update_definition(&self, definition: &Definition) -> Result<(), StorageError>;
}

/// Everything the end-to-end pipeline needs from storage
pub trait Store: TreeStore + TagStore + Catalog {}

impl<T: TreeStore + TagStore + Catalog> Store for T {}
