//! Error taxonomy for category resolution and assignment reconciliation

use crate::catalog::CategoryId;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the resolver and the synchronizer
///
/// Every variant except `Storage` is raised during resolution, before any
/// assignment is written.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An explicit category id does not exist
    #[error("Category with id {0} could not be found")]
    NotFound(CategoryId),

    /// More than one sibling shares the same name. This is data corruption,
    /// not caller error.
    #[error("Category with name '{segment}' is duplicated under parent {parent} ({count} matches)")]
    DuplicateSibling {
        parent: CategoryId,
        segment: String,
        count: usize,
    },

    /// A path resolved to a node that already has children
    #[error("Category with id {id} is not a leaf (path '{path}')")]
    NotLeaf { id: CategoryId, path: String },

    /// The designated root category is absent
    #[error("Root category {0} does not exist")]
    RootMissing(CategoryId),

    /// A path string could not be split into non-empty segments
    #[error("Invalid category path: '{0}'")]
    InvalidPath(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Whether retrying the same call may succeed without out-of-band repair.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for resolver and synchronizer operations
pub type SyncResult<T> = Result<T, SyncError>;
