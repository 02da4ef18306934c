//! Tree Exporter
//!
//! Rebuilds collection trees from persisted nodes. All live nodes of the
//! project are fetched in one pass and partitioned by parent id; reference
//! maps are built once per export. Children keep the order the store listed
//! them in.

use std::collections::HashMap;

use crate::error::{InterchangeError, Result};
use crate::model::{CollectItem, ContentNode, NodeId, ProjectId, ROOT_ID};
use crate::reference::{ReferenceMaps, ReferenceResolver};
use crate::storage::{Catalog, TagStore, TreeNode, TreeStore};

/// Rebuilds [`CollectItem`] trees from a [`TreeStore`]
pub struct TreeExporter<'a, S: ?Sized> {
    store: &'a S,
    inherit_category_tags: bool,
}

/// Live nodes indexed by parent id
struct Arena<'n> {
    children: HashMap<NodeId, Vec<&'n TreeNode>>,
    by_id: HashMap<NodeId, &'n TreeNode>,
}

impl<'n> Arena<'n> {
    fn new(nodes: &'n [TreeNode]) -> Self {
        let mut children: HashMap<NodeId, Vec<&TreeNode>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(nodes.len());
        for node in nodes {
            children.entry(node.parent_id).or_default().push(node);
            by_id.insert(node.id, node);
        }
        Self { children, by_id }
    }

    fn children_of(&self, parent: NodeId) -> &[&'n TreeNode] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl<'a, S: TreeStore + TagStore + Catalog + ?Sized> TreeExporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            inherit_category_tags: true,
        }
    }

    pub fn inherit_category_tags(mut self, enabled: bool) -> Self {
        self.inherit_category_tags = enabled;
        self
    }

    /// Export the whole project tree
    pub fn export(&self, project: ProjectId) -> Result<Vec<CollectItem>> {
        let refs = ReferenceResolver::new(self.store).build_all(project)?;
        self.export_with(project, &refs)
    }

    /// Export the whole project tree using maps the caller already built
    pub fn export_with(&self, project: ProjectId, refs: &ReferenceMaps) -> Result<Vec<CollectItem>> {
        let nodes = self.store.list_nodes(project)?;
        let arena = Arena::new(&nodes);

        let items = self.build_level(project, &arena, None, ROOT_ID, refs);
        tracing::info!(project, nodes = nodes.len(), "collection export finished");
        Ok(items)
    }

    /// Export the subtree rooted at `root`, returned as a single-item list
    pub fn export_subtree(&self, project: ProjectId, root: NodeId) -> Result<Vec<CollectItem>> {
        let refs = ReferenceResolver::new(self.store).build_all(project)?;
        let nodes = self.store.list_nodes(project)?;
        let arena = Arena::new(&nodes);

        let node = arena
            .by_id
            .get(&root)
            .copied()
            .ok_or_else(|| InterchangeError::not_found("node", root))?;
        let parent = arena.by_id.get(&node.parent_id).copied();
        Ok(vec![self.build_item(project, &arena, parent, node, &refs)])
    }

    fn build_level(
        &self,
        project: ProjectId,
        arena: &Arena<'_>,
        parent: Option<&TreeNode>,
        parent_id: NodeId,
        refs: &ReferenceMaps,
    ) -> Vec<CollectItem> {
        arena
            .children_of(parent_id)
            .iter()
            .map(|node| self.build_item(project, arena, parent, node, refs))
            .collect()
    }

    fn build_item(
        &self,
        project: ProjectId,
        arena: &Arena<'_>,
        parent: Option<&TreeNode>,
        node: &TreeNode,
        refs: &ReferenceMaps,
    ) -> CollectItem {
        let mut item = CollectItem {
            id: node.id,
            parent_id: node.parent_id,
            title: node.title.clone(),
            kind: node.kind,
            content_kind: node.content_kind,
            tags: Vec::new(),
            items: Vec::new(),
            content: Vec::new(),
        };

        // One level only: the direct parent category, never the full chain
        if self.inherit_category_tags {
            if let Some(parent) = parent.filter(|p| p.id > ROOT_ID) {
                item.add_tag(parent.title.clone());
            }
        }

        match self.store.export_tags(project, node.id) {
            Ok(tags) => {
                for tag in tags {
                    item.add_tag(tag);
                }
            }
            Err(e) => tracing::warn!(node = node.id, error = %e, "tags not exported"),
        }

        if !node.is_category() {
            item.content = decode_content(node, refs);
        }

        item.items = self.build_level(project, arena, Some(node), node.id, refs);
        tracing::debug!(id = node.id, title = %node.title, "node exported");
        item
    }
}

/// Rewrite ids back to names and decode. Undecodable content degrades to an
/// empty body for that node only.
fn decode_content(node: &TreeNode, refs: &ReferenceMaps) -> Vec<ContentNode> {
    let Some(raw) = node.content.as_deref() else {
        return Vec::new();
    };
    let named = refs.ids_to_names(raw);
    match serde_json::from_str::<Vec<ContentNode>>(&named) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(node = node.id, error = %e, "content not decodable, exported empty");
            Vec::new()
        }
    }
}
