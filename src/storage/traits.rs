//! Storage trait definitions

use crate::catalog::{ArticleId, CategoryId, CategoryNode, NewCategory};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backend could not serve the request right now
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Transient failures a caller may retry as a whole.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Conflict(_) => true,
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for category storage backends
///
/// Implementations must be thread-safe (Send + Sync): the resolver and the
/// synchronizer may be shared across threads.
pub trait CategoryStore: Send + Sync {
    // === Assignment Operations ===

    /// Category ids currently assigned to an article
    fn find_assignments(&self, article: ArticleId) -> StorageResult<BTreeSet<CategoryId>>;

    /// Insert `article × categories`. An already stored pair is a no-op.
    fn insert_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()>;

    /// Delete `article × categories`. Missing pairs are ignored.
    fn delete_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()>;

    // === Node Operations ===

    /// All children of `parent` named `description`.
    ///
    /// More than one result means the sibling uniqueness invariant is broken.
    fn find_nodes(&self, parent: CategoryId, description: &str) -> StorageResult<Vec<CategoryId>>;

    /// Check if a node exists
    fn node_exists(&self, id: CategoryId) -> StorageResult<bool>;

    /// Check if any node has `id` as its parent
    fn has_children(&self, id: CategoryId) -> StorageResult<bool>;

    /// Insert a node and return its new id.
    ///
    /// Fails with [`StorageError::Conflict`] when a sibling with the same
    /// description already exists.
    fn create_node(&self, node: &NewCategory) -> StorageResult<CategoryId>;

    /// Check if the designated root node exists
    fn root_exists(&self, root: CategoryId) -> StorageResult<bool> {
        self.node_exists(root)
    }

    /// Load a node by ID
    fn load_node(&self, id: CategoryId) -> StorageResult<Option<CategoryNode>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: CategoryStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
