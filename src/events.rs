//! Change notifications fired by the resolver and the synchronizer
//!
//! Listeners are fire-and-forget: a failing listener is logged and never
//! aborts the operation that triggered it.

use crate::catalog::{ArticleId, CategoryId};
use crate::storage::SqliteStore;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A change made to the category tree or to an article's assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A category node was created while resolving a path
    CategoryCreated { category: CategoryId },
    /// An assignment row was inserted
    AssignmentAdded { article: ArticleId, category: CategoryId },
    /// An assignment row was deleted
    AssignmentRemoved { article: ArticleId, category: CategoryId },
}

/// Failure inside a listener
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener channel closed")]
    Closed,
    #[error("listener storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("listener error: {0}")]
    Other(String),
}

/// Receives change notifications
///
/// All methods default to doing nothing, so implementations only override
/// the events they care about.
pub trait ChangeListener: Send + Sync {
    fn on_category_created(&self, _category: CategoryId) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_assignment_added(&self, _article: ArticleId, _category: CategoryId) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_assignment_removed(&self, _article: ArticleId, _category: CategoryId) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Deliver an event to a listener, logging and swallowing any failure.
pub(crate) fn dispatch(listener: &dyn ChangeListener, event: CatalogEvent) {
    let result = match event {
        CatalogEvent::CategoryCreated { category } => listener.on_category_created(category),
        CatalogEvent::AssignmentAdded { article, category } => listener.on_assignment_added(article, category),
        CatalogEvent::AssignmentRemoved { article, category } => listener.on_assignment_removed(article, category),
    };
    if let Err(e) = result {
        tracing::warn!(?event, error = %e, "change listener failed");
    }
}

/// Listener that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ChangeListener for NoopListener {}

/// Listener that keeps every event in memory, in delivery order
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<CatalogEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: CatalogEvent) -> Result<(), ListenerError> {
        self.events
            .lock()
            .map_err(|_| ListenerError::Other("event log mutex poisoned".to_string()))?
            .push(event);
        Ok(())
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<CatalogEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Remove and return the recorded events
    pub fn take(&self) -> Vec<CatalogEvent> {
        self.events.lock().map(|mut e| std::mem::take(&mut *e)).unwrap_or_default()
    }
}

impl ChangeListener for RecordingListener {
    fn on_category_created(&self, category: CategoryId) -> Result<(), ListenerError> {
        self.push(CatalogEvent::CategoryCreated { category })
    }

    fn on_assignment_added(&self, article: ArticleId, category: CategoryId) -> Result<(), ListenerError> {
        self.push(CatalogEvent::AssignmentAdded { article, category })
    }

    fn on_assignment_removed(&self, article: ArticleId, category: CategoryId) -> Result<(), ListenerError> {
        self.push(CatalogEvent::AssignmentRemoved { article, category })
    }
}

/// Listener that forwards events into an unbounded tokio channel
///
/// Sending never blocks, so a synchronous reconcile can feed an async
/// consumer (for example a rebuild of a read-optimized assignment view).
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: UnboundedSender<CatalogEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its queue.
    pub fn channel() -> (Self, UnboundedReceiver<CatalogEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CatalogEvent) -> Result<(), ListenerError> {
        self.tx.send(event).map_err(|_| ListenerError::Closed)
    }
}

impl ChangeListener for ChannelListener {
    fn on_category_created(&self, category: CategoryId) -> Result<(), ListenerError> {
        self.send(CatalogEvent::CategoryCreated { category })
    }

    fn on_assignment_added(&self, article: ArticleId, category: CategoryId) -> Result<(), ListenerError> {
        self.send(CatalogEvent::AssignmentAdded { article, category })
    }

    fn on_assignment_removed(&self, article: ArticleId, category: CategoryId) -> Result<(), ListenerError> {
        self.send(CatalogEvent::AssignmentRemoved { article, category })
    }
}

/// Fans every event out to several listeners
///
/// One listener failing does not stop delivery to the others.
#[derive(Default, Clone)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn ChangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl ChangeListener for ListenerSet {
    fn on_category_created(&self, category: CategoryId) -> Result<(), ListenerError> {
        for listener in &self.listeners {
            dispatch(listener.as_ref(), CatalogEvent::CategoryCreated { category });
        }
        Ok(())
    }

    fn on_assignment_added(&self, article: ArticleId, category: CategoryId) -> Result<(), ListenerError> {
        for listener in &self.listeners {
            dispatch(listener.as_ref(), CatalogEvent::AssignmentAdded { article, category });
        }
        Ok(())
    }

    fn on_assignment_removed(&self, article: ArticleId, category: CategoryId) -> Result<(), ListenerError> {
        for listener in &self.listeners {
            dispatch(listener.as_ref(), CatalogEvent::AssignmentRemoved { article, category });
        }
        Ok(())
    }
}

/// Writes the attribute side record for every newly created category
pub struct AttributeWriter {
    store: Arc<SqliteStore>,
}

impl AttributeWriter {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

impl ChangeListener for AttributeWriter {
    fn on_category_created(&self, category: CategoryId) -> Result<(), ListenerError> {
        self.store.insert_category_attributes(category)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingListener;

    impl ChangeListener for FailingListener {
        fn on_assignment_added(&self, _article: ArticleId, _category: CategoryId) -> Result<(), ListenerError> {
            Err(ListenerError::Other("boom".to_string()))
        }
    }

    fn added(article: i64, category: i64) -> CatalogEvent {
        CatalogEvent::AssignmentAdded {
            article: ArticleId::new(article),
            category: CategoryId::new(category),
        }
    }

    #[test]
    fn recording_listener_keeps_order() {
        let listener = RecordingListener::new();
        dispatch(&listener, added(1, 10));
        dispatch(&listener, CatalogEvent::CategoryCreated { category: CategoryId::new(3) });

        assert_eq!(
            listener.take(),
            vec![added(1, 10), CatalogEvent::CategoryCreated { category: CategoryId::new(3) }]
        );
        assert!(listener.events().is_empty());
    }

    #[test]
    fn failing_listener_does_not_block_the_rest_of_the_set() {
        let recorder = Arc::new(RecordingListener::new());
        let set = ListenerSet::new()
            .with(Arc::new(FailingListener))
            .with(recorder.clone());

        assert!(set.on_assignment_added(ArticleId::new(1), CategoryId::new(10)).is_ok());
        assert_eq!(recorder.events(), vec![added(1, 10)]);
    }

    #[test]
    fn closed_channel_reports_error() {
        let (listener, rx) = ChannelListener::channel();
        drop(rx);
        assert!(matches!(
            listener.on_category_created(CategoryId::new(1)),
            Err(ListenerError::Closed)
        ));
    }

    #[tokio::test]
    async fn channel_listener_delivers_events() {
        let (listener, mut rx) = ChannelListener::channel();
        listener
            .on_assignment_removed(ArticleId::new(2), CategoryId::new(20))
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(CatalogEvent::AssignmentRemoved {
                article: ArticleId::new(2),
                category: CategoryId::new(20),
            })
        );
    }

    #[test]
    fn attribute_writer_inserts_side_record() {
        use crate::catalog::{AncestorPath, NewCategory};
        use crate::storage::{CategoryStore, OpenStore};

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.ensure_root(CategoryId::new(1), "Root").unwrap();
        let id = store
            .create_node(&NewCategory::new(
                CategoryId::new(1),
                "English",
                AncestorPath::new(vec![CategoryId::new(1)]),
            ))
            .unwrap();

        AttributeWriter::new(store.clone()).on_category_created(id).unwrap();
        assert!(store.has_category_attributes(id).unwrap());
    }
}
