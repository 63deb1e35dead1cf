//! CategoryResolver: turns category references into concrete category ids

use crate::catalog::{AncestorPath, CategoryId, CategoryPath, CategoryReference, NewCategory, DEFAULT_SEPARATOR};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{dispatch, CatalogEvent, ChangeListener};
use crate::storage::{CategoryStore, StorageError};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// `(parent, description)`: the identity of a sibling slot
type SiblingKey = (CategoryId, String);

/// Resolves category references, creating missing path segments on demand
///
/// Path segments hang below the configured root. Creation of a given
/// `(parent, description)` slot is serialized in-process by a keyed lock;
/// across processes the storage unique index turns a lost race into a
/// [`StorageError::Conflict`], after which the winner's node is re-read.
pub struct CategoryResolver {
    store: Arc<dyn CategoryStore>,
    listener: Arc<dyn ChangeListener>,
    root: CategoryId,
    separator: String,
    creation_locks: DashMap<SiblingKey, Arc<Mutex<()>>>,
}

impl CategoryResolver {
    pub fn new(store: Arc<dyn CategoryStore>, listener: Arc<dyn ChangeListener>, root: CategoryId) -> Self {
        Self {
            store,
            listener,
            root,
            separator: DEFAULT_SEPARATOR.to_string(),
            creation_locks: DashMap::new(),
        }
    }

    pub fn from_config(store: Arc<dyn CategoryStore>, listener: Arc<dyn ChangeListener>, config: &SyncConfig) -> Self {
        Self::new(store, listener, config.root_id).with_separator(config.path_separator.clone())
    }

    /// Separator used when a path is echoed back in an error
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// The root below which first path segments are resolved
    pub fn root(&self) -> CategoryId {
        self.root
    }

    /// Resolve one reference to an existing category id.
    ///
    /// Explicit ids skip the leaf check; paths must end on a leaf.
    pub fn resolve(&self, reference: &CategoryReference) -> SyncResult<CategoryId> {
        match reference {
            CategoryReference::Id(id) => self.resolve_id(*id),
            CategoryReference::Path(path) => self.resolve_path(path),
            CategoryReference::IdOrPath { id, path } => {
                if self.store.node_exists(*id)? {
                    Ok(*id)
                } else {
                    tracing::debug!(category = %id, %path, "category id absent, resolving by path");
                    self.resolve_path(path)
                }
            }
        }
    }

    fn resolve_id(&self, id: CategoryId) -> SyncResult<CategoryId> {
        if self.store.node_exists(id)? {
            Ok(id)
        } else {
            Err(SyncError::NotFound(id))
        }
    }

    /// Walk `path` from the root, creating missing segments, and return the
    /// id of the final segment.
    #[tracing::instrument(level = "debug", skip(self, path), fields(path = %path))]
    pub fn resolve_path(&self, path: &CategoryPath) -> SyncResult<CategoryId> {
        if path.is_empty() {
            return Err(SyncError::InvalidPath(String::new()));
        }

        let mut parent = self.root;
        let mut parent_path = AncestorPath::default();

        for segment in path.segments() {
            let id = match self.lookup(parent, segment)? {
                Some(id) => id,
                None => self.create_segment(parent, &parent_path, segment)?,
            };
            parent_path = parent_path.child_of(parent);
            parent = id;
        }

        if self.store.has_children(parent)? {
            return Err(SyncError::NotLeaf {
                id: parent,
                path: path.join(&self.separator),
            });
        }

        Ok(parent)
    }

    /// The single child of `parent` named `segment`, if any.
    fn lookup(&self, parent: CategoryId, segment: &str) -> SyncResult<Option<CategoryId>> {
        let matches = self.store.find_nodes(parent, segment)?;
        match matches.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            _ => Err(SyncError::DuplicateSibling {
                parent,
                segment: segment.to_string(),
                count: matches.len(),
            }),
        }
    }

    fn create_segment(&self, parent: CategoryId, parent_path: &AncestorPath, segment: &str) -> SyncResult<CategoryId> {
        let key: SiblingKey = (parent, segment.to_string());
        let lock = self.creation_locks.entry(key.clone()).or_default().clone();

        let result = match lock.lock() {
            Ok(_guard) => self.create_locked(parent, parent_path, segment),
            Err(_) => Err(StorageError::Unavailable(format!("creation lock for '{}' poisoned", segment)).into()),
        };

        drop(lock);
        self.creation_locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);

        result
    }

    fn create_locked(&self, parent: CategoryId, parent_path: &AncestorPath, segment: &str) -> SyncResult<CategoryId> {
        // Another resolver may have created the slot while we waited on the lock.
        if let Some(id) = self.lookup(parent, segment)? {
            return Ok(id);
        }

        if parent == self.root && !self.store.root_exists(self.root)? {
            return Err(SyncError::RootMissing(self.root));
        }

        let node = NewCategory::new(parent, segment, parent_path.child_of(parent));
        match self.store.create_node(&node) {
            Ok(id) => {
                tracing::debug!(category = %id, %parent, segment, "created category");
                dispatch(self.listener.as_ref(), CatalogEvent::CategoryCreated { category: id });
                Ok(id)
            }
            Err(StorageError::Conflict(reason)) => {
                tracing::debug!(%parent, segment, %reason, "category created concurrently, re-reading");
                match self.lookup(parent, segment)? {
                    Some(id) => Ok(id),
                    None => Err(StorageError::Conflict(reason).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
