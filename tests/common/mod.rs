//! Shared helpers for catsync integration tests
//!
//! `CountingStore` wraps a real store and records every write so tests can
//! assert on the exact storage traffic a reconcile produces.

#![allow(dead_code)]

use catsync::{
    ArticleId, CategoryId, CategoryNode, CategoryStore, NewCategory, OpenStore, SqliteStore, StorageError,
    StorageResult,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const ROOT: CategoryId = CategoryId::new(1);

/// A write observed by `CountingStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Insert(ArticleId, BTreeSet<CategoryId>),
    Delete(ArticleId, BTreeSet<CategoryId>),
    CreateNode(CategoryId, String),
}

pub struct CountingStore<S> {
    inner: S,
    writes: Mutex<Vec<Write>>,
    fail_deletes: AtomicBool,
}

impl<S: CategoryStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes: Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Make every following `delete_assignments` call fail
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn record(&self, write: Write) {
        self.writes.lock().unwrap().push(write);
    }
}

impl<S: CategoryStore> CategoryStore for CountingStore<S> {
    fn find_assignments(&self, article: ArticleId) -> StorageResult<BTreeSet<CategoryId>> {
        self.inner.find_assignments(article)
    }

    fn insert_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()> {
        self.record(Write::Insert(article, categories.clone()));
        self.inner.insert_assignments(article, categories)
    }

    fn delete_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("delete rejected by test".to_string()));
        }
        self.record(Write::Delete(article, categories.clone()));
        self.inner.delete_assignments(article, categories)
    }

    fn find_nodes(&self, parent: CategoryId, description: &str) -> StorageResult<Vec<CategoryId>> {
        self.inner.find_nodes(parent, description)
    }

    fn node_exists(&self, id: CategoryId) -> StorageResult<bool> {
        self.inner.node_exists(id)
    }

    fn has_children(&self, id: CategoryId) -> StorageResult<bool> {
        self.inner.has_children(id)
    }

    fn create_node(&self, node: &NewCategory) -> StorageResult<CategoryId> {
        let id = self.inner.create_node(node)?;
        self.record(Write::CreateNode(id, node.description.clone()));
        Ok(id)
    }

    fn root_exists(&self, root: CategoryId) -> StorageResult<bool> {
        self.inner.root_exists(root)
    }

    fn load_node(&self, id: CategoryId) -> StorageResult<Option<CategoryNode>> {
        self.inner.load_node(id)
    }
}

/// A SQLite store with a root node, wrapped for write counting
pub fn counting_sqlite() -> Arc<CountingStore<SqliteStore>> {
    let store = SqliteStore::open_in_memory().unwrap();
    store.ensure_root(ROOT, "Root").unwrap();
    Arc::new(CountingStore::new(store))
}

/// Create a child node directly, bypassing the resolver
pub fn add_child(store: &dyn CategoryStore, parent: CategoryId, description: &str) -> CategoryId {
    let parent_path = store.load_node(parent).unwrap().unwrap().path;
    store
        .create_node(&NewCategory::new(parent, description, parent_path.child_of(parent)))
        .unwrap()
}

pub fn ids(values: &[i64]) -> BTreeSet<CategoryId> {
    values.iter().copied().map(CategoryId::new).collect()
}
