//! Collection Tree Pipeline
//!
//! Materializes [`CollectItem`] trees into persisted [`TreeNode`]s and back,
//! and manages the node lifecycle (cascading soft-delete, restore, move,
//! copy).
//!
//! All traversal is synchronous depth-first recursion over a flat arena of
//! nodes keyed by id; recursion depth is bounded by tree depth.
//!
//! [`CollectItem`]: crate::model::CollectItem
//! [`TreeNode`]: crate::storage::TreeNode

pub mod export;
pub mod import;
pub mod lifecycle;

pub use export::TreeExporter;
pub use import::{ImportReport, SkippedItem, TreeImporter};
pub use lifecycle::{RestoreOutcome, RestoreTarget, TreeLifecycle};
