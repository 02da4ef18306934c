//! API Specification Interchange
//!
//! Converts API description documents (Swagger 2.0, OpenAPI 3.0.x, OpenAPI
//! 3.1) to and from a dialect-neutral model, and moves that model in and out
//! of a project's persisted collection tree.
//!
//! ## Features
//!
//! - **Dialect Codec**: detection, decoding and encoding of all three dialects,
//!   with schema keyword translation between them
//! - **Reference Resolution**: shared definitions are referenced by name in
//!   documents and by id in storage, per reference domain
//! - **Tree Import/Export**: pre-order materialization of collection trees,
//!   one-level category tag inheritance on export
//! - **Lifecycle**: atomic cascading soft-delete, restore, move and copy
//!
//! ## Data flow
//!
//! ```text
//! bytes ─► dialect::decode ─► SpecDocument ─► TreeImporter ─► TreeStore
//!                                  ▲                              │
//! bytes ◄─ dialect::encode ◄───────┴──────── TreeExporter ◄───────┘
//!                       (ReferenceMaps: names ⇄ ids)
//! ```

pub mod config;
pub mod dialect;
pub mod error;
pub mod interchange;
pub mod model;
pub mod reference;
pub mod storage;
pub mod tree;

pub use config::InterchangeConfig;
pub use dialect::{Dialect, DialectVersion};
pub use error::{InterchangeError, Result};
pub use interchange::{DocumentImport, Interchange};
pub use model::{CollectItem, ContentNode, SpecDocument};
pub use reference::{ReferenceDomain, ReferenceMap, ReferenceMaps, ReferenceResolver};
pub use storage::memory::MemoryStore;
pub use storage::{Store, StorageError, TreeNode};
pub use tree::{TreeExporter, TreeImporter, TreeLifecycle};
