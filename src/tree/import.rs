//! Tree Importer
//!
//! Walks a collection tree pre-order and persists it: categories first, then
//! their subtree, then the next sibling. Document content is serialized and
//! every reference token is rewritten from name to id before it is stored.

use crate::config::ItemErrorPolicy;
use crate::error::{InterchangeError, Result};
use crate::model::{ActorId, CollectItem, ContentKind, NodeId, NodeKind, ProjectId};
use crate::reference::ReferenceMaps;
use crate::storage::{NewTreeNode, StorageError, TagStore, TreeNode, TreeStore};

/// An item the importer could not persist
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    pub title: String,
    pub parent_id: NodeId,
    pub reason: String,
}

/// Outcome of an import
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Nodes created, in creation order (each category before its subtree)
    pub nodes: Vec<TreeNode>,
    /// Items skipped under [`ItemErrorPolicy::Skip`]; a skipped category
    /// takes its whole subtree with it
    pub skipped: Vec<SkippedItem>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Persists collection trees into a [`TreeStore`]
pub struct TreeImporter<'a, S: ?Sized> {
    store: &'a S,
    actor: ActorId,
    policy: ItemErrorPolicy,
}

impl<'a, S: TreeStore + TagStore + ?Sized> TreeImporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            actor: 0,
            policy: ItemErrorPolicy::default(),
        }
    }

    pub fn with_actor(mut self, actor: ActorId) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_policy(mut self, policy: ItemErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Import `items` under `parent`, rewriting reference names to ids.
    pub fn import(
        &self,
        project: ProjectId,
        parent: NodeId,
        items: &[CollectItem],
        refs: &ReferenceMaps,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        self.import_level(project, parent, items, refs, &mut report)?;
        tracing::info!(
            project,
            parent,
            created = report.nodes.len(),
            skipped = report.skipped.len(),
            "collection import finished"
        );
        Ok(report)
    }

    fn import_level(
        &self,
        project: ProjectId,
        parent: NodeId,
        items: &[CollectItem],
        refs: &ReferenceMaps,
        report: &mut ImportReport,
    ) -> Result<()> {
        for (position, item) in items.iter().enumerate() {
            let display_order = position as i64;
            if item.is_category() {
                let new = NewTreeNode {
                    project_id: project,
                    parent_id: parent,
                    title: item.title.clone(),
                    kind: NodeKind::Category,
                    content_kind: None,
                    content: None,
                    display_order,
                    created_by: self.actor,
                };
                let Some(category) = self.create(new, parent, report)? else {
                    continue;
                };
                let category_id = category.id;
                report.nodes.push(category);
                self.import_level(project, category_id, &item.items, refs, report)?;
            } else {
                let serialized = serde_json::to_string(&item.content)?;
                let new = NewTreeNode {
                    project_id: project,
                    parent_id: parent,
                    title: item.title.clone(),
                    kind: NodeKind::Document,
                    content_kind: Some(item.content_kind.unwrap_or(ContentKind::HttpOperation)),
                    content: Some(refs.names_to_ids(&serialized)),
                    display_order,
                    created_by: self.actor,
                };
                let Some(document) = self.create(new, parent, report)? else {
                    continue;
                };
                if !item.tags.is_empty() {
                    if let Err(e) = self.store.import_tags(project, document.id, &item.tags) {
                        match self.policy {
                            ItemErrorPolicy::Abort => {
                                return Err(InterchangeError::ImportFailed {
                                    title: item.title.clone(),
                                    source: e,
                                })
                            }
                            ItemErrorPolicy::Skip => {
                                tracing::warn!(node = document.id, error = %e, "tags not imported")
                            }
                        }
                    }
                }
                report.nodes.push(document);
            }
        }
        Ok(())
    }

    /// Create a node, applying the item error policy on failure
    fn create(
        &self,
        new: NewTreeNode,
        parent: NodeId,
        report: &mut ImportReport,
    ) -> Result<Option<TreeNode>> {
        let title = new.title.clone();
        match self.store.create_node(new) {
            Ok(node) => {
                tracing::debug!(id = node.id, parent, title = %node.title, "node created");
                Ok(Some(node))
            }
            Err(e) => self.on_failure(title, parent, e, report).map(|_| None),
        }
    }

    fn on_failure(
        &self,
        title: String,
        parent: NodeId,
        error: StorageError,
        report: &mut ImportReport,
    ) -> Result<()> {
        match self.policy {
            ItemErrorPolicy::Abort => Err(InterchangeError::ImportFailed { title, source: error }),
            ItemErrorPolicy::Skip => {
                tracing::warn!(title = %title, parent, error = %error, "item skipped");
                report.skipped.push(SkippedItem {
                    title,
                    parent_id: parent,
                    reason: error.to_string(),
                });
                Ok(())
            }
        }
    }
}
