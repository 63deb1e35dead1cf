//! catsync: category path resolution and assignment reconciliation
//!
//! Import pipelines name an article's categories either by id or by a
//! human-readable path such as `English->Cars->Mazda`. This crate resolves
//! those references to concrete category nodes, creating missing path
//! segments on demand, and then reconciles the article's stored assignments
//! with a minimal insert/delete diff.
//!
//! # Core Concepts
//!
//! - **CategoryResolver**: one reference in, one existing category id out
//! - **AssignmentSynchronizer**: resolves a batch, diffs it against storage,
//!   applies the difference and notifies listeners
//! - **CategoryStore**: the storage boundary (`SqliteStore`, `MemoryStore`)
//!
//! # Example
//!
//! ```
//! use catsync::{
//!     ArticleId, AssignmentSynchronizer, CategoryId, CategoryReference, MemoryStore,
//!     NoopListener, SyncConfig,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::with_root(CategoryId::new(1)));
//! let sync = AssignmentSynchronizer::new(store, Arc::new(NoopListener), &SyncConfig::default());
//!
//! let refs = vec![CategoryReference::path("English->Cars->Mazda").unwrap()];
//! let outcome = sync.reconcile(ArticleId::new(7), &refs).unwrap();
//! assert_eq!(outcome.added.len(), 1);
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
mod resolve;
pub mod storage;
mod sync;

pub use catalog::{
    AncestorPath, ArticleId, CategoryId, CategoryNode, CategoryPath, CategoryReference, NewCategory,
    RawCategoryRef,
};
pub use config::{ConfigError, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use events::{
    AttributeWriter, CatalogEvent, ChangeListener, ChannelListener, ListenerError, ListenerSet, NoopListener,
    RecordingListener,
};
pub use resolve::CategoryResolver;
pub use storage::{CategoryStore, MemoryStore, OpenStore, SqliteStore, StorageError, StorageResult};
pub use sync::{AssignmentDiff, AssignmentSynchronizer, ReconcileOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
