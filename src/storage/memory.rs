//! In-process storage backend

use super::traits::{CategoryStore, StorageError, StorageResult};
use crate::catalog::{AncestorPath, ArticleId, CategoryId, CategoryNode, NewCategory};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<CategoryId, CategoryNode>,
    assignments: BTreeSet<(ArticleId, CategoryId)>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> CategoryId {
        let next = self.nodes.keys().next_back().map_or(1, |id| id.get() + 1).max(self.next_id);
        self.next_id = next + 1;
        CategoryId::new(next)
    }

    fn insert(&mut self, node: &NewCategory) -> CategoryId {
        let id = self.allocate_id();
        self.nodes.insert(
            id,
            CategoryNode {
                id,
                parent: Some(node.parent),
                description: node.description.clone(),
                path: node.path.clone(),
                active: true,
                added: node.added,
                changed: node.added,
                leaf: true,
            },
        );
        id
    }

    fn siblings<'a>(&'a self, parent: CategoryId, description: &'a str) -> impl Iterator<Item = &'a CategoryNode> + 'a {
        self.nodes
            .values()
            .filter(move |n| n.parent == Some(parent) && n.description == description)
    }
}

/// Category store held entirely in memory
///
/// Mirrors the SQLite backend's contract, including the sibling
/// uniqueness check in `create_node`. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only a root node with the given id.
    pub fn with_root(root: CategoryId) -> Self {
        let store = Self::new();
        let now = Utc::now();
        if let Ok(mut state) = store.state.lock() {
            state.nodes.insert(
                root,
                CategoryNode {
                    id: root,
                    parent: None,
                    description: "Root".to_string(),
                    path: AncestorPath::default(),
                    active: true,
                    added: now,
                    changed: now,
                    leaf: true,
                },
            );
        }
        store
    }

    fn state(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store mutex poisoned".to_string()))
    }

    /// Insert a node without the sibling uniqueness check.
    ///
    /// Lets fixtures reproduce trees that already hold duplicate siblings.
    pub fn insert_node_unchecked(&self, node: &NewCategory) -> StorageResult<CategoryId> {
        Ok(self.state()?.insert(node))
    }

    /// Number of stored nodes, root included
    pub fn node_count(&self) -> StorageResult<usize> {
        Ok(self.state()?.nodes.len())
    }
}

impl CategoryStore for MemoryStore {
    fn find_assignments(&self, article: ArticleId) -> StorageResult<BTreeSet<CategoryId>> {
        let state = self.state()?;
        Ok(state
            .assignments
            .range((article, CategoryId::new(i64::MIN))..=(article, CategoryId::new(i64::MAX)))
            .map(|(_, category)| *category)
            .collect())
    }

    fn insert_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()> {
        let mut state = self.state()?;
        state.assignments.extend(categories.iter().map(|c| (article, *c)));
        Ok(())
    }

    fn delete_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()> {
        let mut state = self.state()?;
        for category in categories {
            state.assignments.remove(&(article, *category));
        }
        Ok(())
    }

    fn find_nodes(&self, parent: CategoryId, description: &str) -> StorageResult<Vec<CategoryId>> {
        let state = self.state()?;
        Ok(state.siblings(parent, description).map(|n| n.id).collect())
    }

    fn node_exists(&self, id: CategoryId) -> StorageResult<bool> {
        Ok(self.state()?.nodes.contains_key(&id))
    }

    fn has_children(&self, id: CategoryId) -> StorageResult<bool> {
        Ok(self.state()?.nodes.values().any(|n| n.parent == Some(id)))
    }

    fn create_node(&self, node: &NewCategory) -> StorageResult<CategoryId> {
        let mut state = self.state()?;
        if state.siblings(node.parent, &node.description).next().is_some() {
            return Err(StorageError::Conflict(format!(
                "category '{}' under parent {}",
                node.description, node.parent
            )));
        }
        Ok(state.insert(node))
    }

    fn load_node(&self, id: CategoryId) -> StorageResult<Option<CategoryNode>> {
        let state = self.state()?;
        let leaf = !state.nodes.values().any(|n| n.parent == Some(id));
        Ok(state.nodes.get(&id).map(|n| CategoryNode { leaf, ..n.clone() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: CategoryId = CategoryId::new(1);

    #[test]
    fn ids_continue_after_root() {
        let store = MemoryStore::with_root(ROOT);
        let id = store
            .create_node(&NewCategory::new(ROOT, "English", AncestorPath::new(vec![ROOT])))
            .unwrap();
        assert_eq!(id, CategoryId::new(2));
    }

    #[test]
    fn create_rejects_existing_sibling() {
        let store = MemoryStore::with_root(ROOT);
        let node = NewCategory::new(ROOT, "English", AncestorPath::new(vec![ROOT]));
        store.create_node(&node).unwrap();
        assert!(matches!(store.create_node(&node), Err(StorageError::Conflict(_))));
    }

    #[test]
    fn unchecked_insert_allows_duplicates() {
        let store = MemoryStore::with_root(ROOT);
        let node = NewCategory::new(ROOT, "Cars", AncestorPath::new(vec![ROOT]));
        store.insert_node_unchecked(&node).unwrap();
        store.insert_node_unchecked(&node).unwrap();
        assert_eq!(store.find_nodes(ROOT, "Cars").unwrap().len(), 2);
    }

    #[test]
    fn assignments_are_scoped_by_article() {
        let store = MemoryStore::with_root(ROOT);
        let ids = BTreeSet::from([CategoryId::new(4), CategoryId::new(5)]);
        store.insert_assignments(ArticleId::new(1), &ids).unwrap();
        store.insert_assignments(ArticleId::new(2), &ids).unwrap();
        store
            .delete_assignments(ArticleId::new(1), &BTreeSet::from([CategoryId::new(4)]))
            .unwrap();

        assert_eq!(
            store.find_assignments(ArticleId::new(1)).unwrap(),
            BTreeSet::from([CategoryId::new(5)])
        );
        assert_eq!(store.find_assignments(ArticleId::new(2)).unwrap(), ids);
    }

    #[test]
    fn load_node_reports_leaf_state() {
        let store = MemoryStore::with_root(ROOT);
        assert!(store.load_node(ROOT).unwrap().unwrap().leaf);
        store
            .create_node(&NewCategory::new(ROOT, "English", AncestorPath::new(vec![ROOT])))
            .unwrap();
        assert!(!store.load_node(ROOT).unwrap().unwrap().leaf);
    }
}
