//! AssignmentSynchronizer: makes an article's stored categories match a
//! list of references

use super::diff::AssignmentDiff;
use crate::catalog::{decode_references, ArticleId, CategoryId, CategoryReference, RawCategoryRef, DEFAULT_SEPARATOR};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::events::{dispatch, CatalogEvent, ChangeListener};
use crate::resolve::CategoryResolver;
use crate::storage::CategoryStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What a `reconcile()` call changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub article: ArticleId,
    /// Categories newly assigned, ascending
    pub added: Vec<CategoryId>,
    /// Categories no longer assigned, ascending
    pub removed: Vec<CategoryId>,
}

impl ReconcileOutcome {
    /// True if nothing was written
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Reconciles article category assignments
///
/// Stateless between calls: calls for different articles are independent.
/// Calls for the same article are not serialized here; duplicate inserts
/// are absorbed by the store's upsert and inserts run before deletes.
pub struct AssignmentSynchronizer {
    store: Arc<dyn CategoryStore>,
    resolver: CategoryResolver,
    listener: Arc<dyn ChangeListener>,
    separator: String,
}

impl AssignmentSynchronizer {
    /// Build a synchronizer and its resolver over the same store and listener.
    pub fn new(store: Arc<dyn CategoryStore>, listener: Arc<dyn ChangeListener>, config: &SyncConfig) -> Self {
        let resolver = CategoryResolver::from_config(store.clone(), listener.clone(), config);
        Self::with_resolver(store, resolver, listener).with_separator(config.path_separator.clone())
    }

    pub fn with_resolver(
        store: Arc<dyn CategoryStore>,
        resolver: CategoryResolver,
        listener: Arc<dyn ChangeListener>,
    ) -> Self {
        Self {
            store,
            resolver,
            listener,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    /// Separator used by [`AssignmentSynchronizer::reconcile_raw`] to split path strings
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn resolver(&self) -> &CategoryResolver {
        &self.resolver
    }

    /// Resolve every reference, failing on the first one that cannot be
    /// resolved. Duplicates collapse.
    pub fn resolve_all(&self, references: &[CategoryReference]) -> SyncResult<BTreeSet<CategoryId>> {
        references.iter().map(|r| self.resolver.resolve(r)).collect()
    }

    /// Make the stored assignments of `article` equal the resolved
    /// `references`.
    ///
    /// All references are resolved before anything is written, so a
    /// resolution error leaves the assignments untouched. A storage error
    /// while applying aborts the rest of the call without undoing what was
    /// already applied; running the same call again converges.
    #[tracing::instrument(skip_all, fields(article = %article, references = references.len()))]
    pub fn reconcile(&self, article: ArticleId, references: &[CategoryReference]) -> SyncResult<ReconcileOutcome> {
        let desired = self.resolve_all(references)?;
        let current = self.store.find_assignments(article)?;
        let diff = AssignmentDiff::compute(&current, &desired);

        if diff.is_empty() {
            tracing::debug!(assigned = current.len(), "assignments already up to date");
            return Ok(ReconcileOutcome {
                article,
                added: Vec::new(),
                removed: Vec::new(),
            });
        }

        if !diff.to_add.is_empty() {
            self.store.insert_assignments(article, &diff.to_add)?;
            for &category in &diff.to_add {
                dispatch(self.listener.as_ref(), CatalogEvent::AssignmentAdded { article, category });
            }
        }

        if !diff.to_remove.is_empty() {
            self.store.delete_assignments(article, &diff.to_remove)?;
            for &category in &diff.to_remove {
                dispatch(self.listener.as_ref(), CatalogEvent::AssignmentRemoved { article, category });
            }
        }

        tracing::info!(
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "reconciled category assignments"
        );

        Ok(ReconcileOutcome {
            article,
            added: diff.to_add.into_iter().collect(),
            removed: diff.to_remove.into_iter().collect(),
        })
    }

    /// Decode import rows and reconcile. Rows with neither id nor path are skipped.
    pub fn reconcile_raw(
        &self,
        article: ArticleId,
        raw: impl IntoIterator<Item = RawCategoryRef>,
    ) -> SyncResult<ReconcileOutcome> {
        let references = decode_references(raw, &self.separator)?;
        self.reconcile(article, &references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AncestorPath, NewCategory};
    use crate::error::SyncError;
    use crate::events::RecordingListener;
    use crate::storage::MemoryStore;

    const ROOT: CategoryId = CategoryId::new(1);
    const ARTICLE: ArticleId = ArticleId::new(7);

    fn setup() -> (Arc<MemoryStore>, Arc<RecordingListener>, AssignmentSynchronizer) {
        let store = Arc::new(MemoryStore::with_root(ROOT));
        let listener = Arc::new(RecordingListener::new());
        let sync = AssignmentSynchronizer::new(store.clone(), listener.clone(), &SyncConfig::default());
        (store, listener, sync)
    }

    fn leaf(store: &MemoryStore, description: &str) -> CategoryId {
        store
            .create_node(&NewCategory::new(ROOT, description, AncestorPath::new(vec![ROOT])))
            .unwrap()
    }

    #[test]
    fn empty_article_gets_all_references() {
        let (store, listener, sync) = setup();
        let a = leaf(&store, "A");
        let b = leaf(&store, "B");

        let outcome = sync
            .reconcile(ARTICLE, &[CategoryReference::Id(b), CategoryReference::Id(a)])
            .unwrap();

        assert_eq!(outcome.added, vec![a, b]);
        assert!(outcome.removed.is_empty());
        assert_eq!(store.find_assignments(ARTICLE).unwrap(), BTreeSet::from([a, b]));
        assert_eq!(
            listener.events(),
            vec![
                CatalogEvent::AssignmentAdded { article: ARTICLE, category: a },
                CatalogEvent::AssignmentAdded { article: ARTICLE, category: b },
            ]
        );
    }

    #[test]
    fn duplicate_references_collapse() {
        let (store, _, sync) = setup();
        let a = leaf(&store, "A");

        let outcome = sync
            .reconcile(ARTICLE, &[CategoryReference::Id(a), CategoryReference::Id(a)])
            .unwrap();
        assert_eq!(outcome.added, vec![a]);
    }

    #[test]
    fn empty_reference_list_clears_assignments() {
        let (store, _, sync) = setup();
        let a = leaf(&store, "A");
        sync.reconcile(ARTICLE, &[CategoryReference::Id(a)]).unwrap();

        let outcome = sync.reconcile(ARTICLE, &[]).unwrap();
        assert_eq!(outcome.removed, vec![a]);
        assert!(store.find_assignments(ARTICLE).unwrap().is_empty());
    }

    #[test]
    fn resolution_failure_writes_nothing() {
        let (store, listener, sync) = setup();
        let a = leaf(&store, "A");
        store.insert_assignments(ARTICLE, &BTreeSet::from([a])).unwrap();

        let err = sync
            .reconcile(ARTICLE, &[CategoryReference::path("B").unwrap(), CategoryReference::id(404)])
            .unwrap_err();

        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(store.find_assignments(ARTICLE).unwrap(), BTreeSet::from([a]));
        assert!(!listener
            .events()
            .iter()
            .any(|e| matches!(e, CatalogEvent::AssignmentAdded { .. } | CatalogEvent::AssignmentRemoved { .. })));
    }

    #[test]
    fn raw_rows_use_configured_separator() {
        let store = Arc::new(MemoryStore::with_root(ROOT));
        let config = SyncConfig::default().with_separator("/");
        let sync = AssignmentSynchronizer::new(store.clone(), Arc::new(RecordingListener::new()), &config);

        let outcome = sync
            .reconcile_raw(
                ARTICLE,
                vec![
                    RawCategoryRef {
                        category_id: None,
                        category_path: Some("English/Cars".to_string()),
                    },
                    RawCategoryRef::default(),
                ],
            )
            .unwrap();

        let english = store.find_nodes(ROOT, "English").unwrap()[0];
        assert_eq!(outcome.added, store.find_nodes(english, "Cars").unwrap());
    }
}
