//! Testing utilities: an in-memory database implementing the driver seam.
//!
//! [`MockDatabase`] simulates just enough of a document store to exercise
//! the container end-to-end: capped-collection tailing, change streams with
//! monotonic resume tokens, the full-document lookup policy, and unhealthy
//! cursor handshakes for the startup retry loop. Every opened cursor's spec
//! is recorded so tests can assert what reached the driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use parking_lot::Mutex;

use crate::driver::{
    BoxChangeStreamCursor, BoxDocumentCursor, ChangeStreamSpec, DatabaseClient, SourceCursor,
    TailSpec,
};
use crate::error::DriverError;
use crate::event::{
    ChangeStreamEvent, EventNamespace, OperationType, ResumeToken, UpdateDescription,
};
use crate::options::FullDocumentMode;

/// In-memory stand-in for one database of a document store.
pub struct MockDatabase {
    name: String,
    collections: Mutex<HashMap<String, Arc<MockCollection>>>,
    next_cursor_id: AtomicI64,
    failing_handshakes: AtomicUsize,
    change_stream_specs: Mutex<Vec<(String, ChangeStreamSpec)>>,
    tail_specs: Mutex<Vec<(String, TailSpec)>>,
}

impl MockDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: Mutex::new(HashMap::new()),
            next_cursor_id: AtomicI64::new(1),
            failing_handshakes: AtomicUsize::new(0),
            change_stream_specs: Mutex::new(Vec::new()),
            tail_specs: Mutex::new(Vec::new()),
        }
    }

    /// Returns the named collection, creating it on first access.
    #[must_use]
    pub fn collection(&self, name: &str) -> Arc<MockCollection> {
        let mut collections = self.collections.lock();
        Arc::clone(collections.entry(name.to_string()).or_insert_with(|| {
            Arc::new(MockCollection::new(self.name.clone(), name.to_string()))
        }))
    }

    /// Makes the next `count` cursor handshakes return cursors with a zero
    /// server-side id, exercising the startup retry loop.
    pub fn fail_next_handshakes(&self, count: usize) {
        self.failing_handshakes.store(count, Ordering::SeqCst);
    }

    /// Change-stream specs recorded from [`DatabaseClient::open_change_stream`].
    #[must_use]
    pub fn recorded_change_stream_specs(&self) -> Vec<(String, ChangeStreamSpec)> {
        self.change_stream_specs.lock().clone()
    }

    /// Tail specs recorded from [`DatabaseClient::open_tail_cursor`].
    #[must_use]
    pub fn recorded_tail_specs(&self) -> Vec<(String, TailSpec)> {
        self.tail_specs.lock().clone()
    }

    fn next_cursor_id(&self) -> i64 {
        if self
            .failing_handshakes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return 0;
        }
        self.next_cursor_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabase {
    fn database_name(&self) -> &str {
        &self.name
    }

    async fn open_change_stream(
        &self,
        collection: &str,
        spec: ChangeStreamSpec,
    ) -> Result<BoxChangeStreamCursor, DriverError> {
        self.change_stream_specs
            .lock()
            .push((collection.to_string(), spec.clone()));

        let collection = self.collection(collection);
        let position = match &spec.resume_after {
            // Resume after the matching event; an unknown token replays
            // the whole log.
            Some(token) => collection
                .events
                .lock()
                .iter()
                .position(|event| event.id.as_document() == token)
                .map_or(0, |index| index + 1),
            // A fresh stream starts at "now".
            None => collection.events.lock().len(),
        };

        Ok(Box::new(MockChangeStreamCursor {
            collection,
            position,
            full_document: spec.full_document,
            cursor_id: self.next_cursor_id(),
        }))
    }

    async fn open_tail_cursor(
        &self,
        collection: &str,
        spec: TailSpec,
    ) -> Result<BoxDocumentCursor, DriverError> {
        self.tail_specs
            .lock()
            .push((collection.to_string(), spec.clone()));

        Ok(Box::new(MockTailCursor {
            collection: self.collection(collection),
            position: 0,
            filter: spec.filter,
            cursor_id: self.next_cursor_id(),
        }))
    }
}

impl std::fmt::Debug for MockDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDatabase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A capped collection keeping both its documents and its change-event log.
pub struct MockCollection {
    database: String,
    name: String,
    documents: Mutex<Vec<Document>>,
    events: Mutex<Vec<ChangeStreamEvent>>,
    next_token: AtomicU64,
}

impl MockCollection {
    fn new(database: String, name: String) -> Self {
        Self {
            database,
            name,
            documents: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Appends a document and emits the matching insert event. Returns the
    /// event's resume token.
    pub fn insert(&self, document: Document) -> ResumeToken {
        let token = self.mint_token();
        self.documents.lock().push(document.clone());
        self.events.lock().push(ChangeStreamEvent {
            id: token.clone(),
            operation_type: OperationType::Insert,
            ns: Some(EventNamespace::new(self.database.clone(), self.name.clone())),
            document_key: document_key(&document),
            update_description: None,
            full_document: Some(document),
        });
        token
    }

    /// Replaces the document with the given `_id` and emits an update
    /// event carrying the post-image. Cursors opened without update lookup
    /// see the event stripped of its full document.
    ///
    /// # Panics
    ///
    /// Panics when no document with that `_id` exists.
    pub fn update(&self, id: &Bson, document: Document, updated_fields: Document) -> ResumeToken {
        {
            let mut documents = self.documents.lock();
            let existing = documents
                .iter_mut()
                .find(|doc| doc.get("_id") == Some(id))
                .expect("no document with matching _id");
            *existing = document.clone();
        }

        let token = self.mint_token();
        self.events.lock().push(ChangeStreamEvent {
            id: token.clone(),
            operation_type: OperationType::Update,
            ns: Some(EventNamespace::new(self.database.clone(), self.name.clone())),
            document_key: Some(doc! { "_id": id.clone() }),
            update_description: Some(UpdateDescription {
                updated_fields: Some(updated_fields),
                removed_fields: Vec::new(),
            }),
            full_document: Some(document),
        });
        token
    }

    /// Emits an invalidate event, as the server does when the collection
    /// is dropped.
    pub fn invalidate(&self) -> ResumeToken {
        let token = self.mint_token();
        self.events.lock().push(ChangeStreamEvent {
            id: token.clone(),
            operation_type: OperationType::Invalidate,
            ns: None,
            document_key: None,
            update_description: None,
            full_document: None,
        });
        token
    }

    /// Number of documents currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    /// Whether the collection holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    fn mint_token(&self) -> ResumeToken {
        let value = self.next_token.fetch_add(1, Ordering::SeqCst);
        ResumeToken::new(doc! { "_data": value as i64 })
    }
}

struct MockChangeStreamCursor {
    collection: Arc<MockCollection>,
    position: usize,
    full_document: FullDocumentMode,
    cursor_id: i64,
}

#[async_trait]
impl SourceCursor for MockChangeStreamCursor {
    type Event = ChangeStreamEvent;

    async fn try_next(&mut self) -> Result<Option<ChangeStreamEvent>, DriverError> {
        let events = self.collection.events.lock();
        let Some(event) = events.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let mut event = event.clone();
        if event.operation_type == OperationType::Update
            && self.full_document == FullDocumentMode::Default
        {
            event.full_document = None;
        }
        Ok(Some(event))
    }

    fn server_cursor_id(&self) -> Option<i64> {
        Some(self.cursor_id)
    }

    async fn close(&mut self) {}
}

struct MockTailCursor {
    collection: Arc<MockCollection>,
    position: usize,
    filter: Document,
    cursor_id: i64,
}

#[async_trait]
impl SourceCursor for MockTailCursor {
    type Event = Document;

    async fn try_next(&mut self) -> Result<Option<Document>, DriverError> {
        let documents = self.collection.documents.lock();
        while let Some(document) = documents.get(self.position) {
            self.position += 1;
            if matches_filter(&self.filter, document) {
                return Ok(Some(document.clone()));
            }
        }
        Ok(None)
    }

    fn server_cursor_id(&self) -> Option<i64> {
        Some(self.cursor_id)
    }

    async fn close(&mut self) {}
}

fn document_key(document: &Document) -> Option<Document> {
    document.get("_id").map(|id| doc! { "_id": id.clone() })
}

/// Top-level equality matching, the only query shape the mock supports.
fn matches_filter(filter: &Document, document: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tail_cursor_sees_existing_and_new_documents() {
        let db = MockDatabase::new("db");
        db.collection("col").insert(doc! { "_id": 1 });

        let mut cursor = db
            .open_tail_cursor("col", TailSpec::default())
            .await
            .unwrap();
        assert_eq!(cursor.try_next().await.unwrap(), Some(doc! { "_id": 1 }));
        assert_eq!(cursor.try_next().await.unwrap(), None);

        db.collection("col").insert(doc! { "_id": 2 });
        assert_eq!(cursor.try_next().await.unwrap(), Some(doc! { "_id": 2 }));
    }

    #[tokio::test]
    async fn test_tail_cursor_applies_filter() {
        let db = MockDatabase::new("db");
        db.collection("col").insert(doc! { "_id": 1, "kind": "a" });
        db.collection("col").insert(doc! { "_id": 2, "kind": "b" });
        db.collection("col").insert(doc! { "_id": 3, "kind": "a" });

        let mut cursor = db
            .open_tail_cursor(
                "col",
                TailSpec {
                    filter: doc! { "kind": "a" },
                    collation: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            cursor.try_next().await.unwrap(),
            Some(doc! { "_id": 1, "kind": "a" })
        );
        assert_eq!(
            cursor.try_next().await.unwrap(),
            Some(doc! { "_id": 3, "kind": "a" })
        );
        assert_eq!(cursor.try_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_change_stream_starts_at_now() {
        let db = MockDatabase::new("db");
        db.collection("col").insert(doc! { "_id": "before" });

        let mut cursor = db
            .open_change_stream("col", ChangeStreamSpec::default())
            .await
            .unwrap();
        assert_eq!(cursor.try_next().await.unwrap(), None);

        db.collection("col").insert(doc! { "_id": "after" });
        let event = cursor.try_next().await.unwrap().unwrap();
        assert_eq!(event.full_document, Some(doc! { "_id": "after" }));
    }

    #[tokio::test]
    async fn test_change_stream_resumes_after_token() {
        let db = MockDatabase::new("db");
        let col = db.collection("col");
        let first = col.insert(doc! { "_id": 1 });
        col.insert(doc! { "_id": 2 });
        col.insert(doc! { "_id": 3 });

        let mut cursor = db
            .open_change_stream(
                "col",
                ChangeStreamSpec {
                    resume_after: Some(first.into_document()),
                    ..ChangeStreamSpec::default()
                },
            )
            .await
            .unwrap();

        let event = cursor.try_next().await.unwrap().unwrap();
        assert_eq!(event.full_document, Some(doc! { "_id": 2 }));
        let event = cursor.try_next().await.unwrap().unwrap();
        assert_eq!(event.full_document, Some(doc! { "_id": 3 }));
        assert_eq!(cursor.try_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_event_full_document_depends_on_mode() {
        let db = MockDatabase::new("db");
        let col = db.collection("col");
        col.insert(doc! { "_id": 1, "age": 7 });

        let mut plain = db
            .open_change_stream("col", ChangeStreamSpec::default())
            .await
            .unwrap();
        let mut lookup = db
            .open_change_stream(
                "col",
                ChangeStreamSpec {
                    full_document: FullDocumentMode::UpdateLookup,
                    ..ChangeStreamSpec::default()
                },
            )
            .await
            .unwrap();

        col.update(&Bson::from(1), doc! { "_id": 1, "age": 8 }, doc! { "age": 8 });

        let event = plain.try_next().await.unwrap().unwrap();
        assert_eq!(event.operation_type, OperationType::Update);
        assert!(event.full_document.is_none());

        let event = lookup.try_next().await.unwrap().unwrap();
        assert_eq!(event.full_document, Some(doc! { "_id": 1, "age": 8 }));
    }

    #[tokio::test]
    async fn test_failing_handshakes_yield_zero_cursor_ids() {
        let db = MockDatabase::new("db");
        db.fail_next_handshakes(2);

        let cursor = db
            .open_change_stream("col", ChangeStreamSpec::default())
            .await
            .unwrap();
        assert_eq!(cursor.server_cursor_id(), Some(0));

        let cursor = db
            .open_tail_cursor("col", TailSpec::default())
            .await
            .unwrap();
        assert_eq!(cursor.server_cursor_id(), Some(0));

        let cursor = db
            .open_change_stream("col", ChangeStreamSpec::default())
            .await
            .unwrap();
        assert_ne!(cursor.server_cursor_id(), Some(0));
    }
}
