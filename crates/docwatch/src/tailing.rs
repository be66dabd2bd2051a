//! Tailing-cursor strategy.
//!
//! Opens a tailable-await cursor on a capped collection and delivers every
//! appended document as a message whose raw value and body are the document
//! itself.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use serde::de::DeserializeOwned;

use crate::driver::{DatabaseClient, SourceCursor, TailSpec};
use crate::error::Error;
use crate::message::{Message, MessageProperties};
use crate::options::TailingOptions;
use crate::request::{MessageListener, TailingRequest};
use crate::task::{emit, CursorStrategy};

/// Strategy backing tailing subscriptions with target body type `T`.
pub struct TailingStrategy<T> {
    listener: Arc<dyn MessageListener<Document, T>>,
    options: TailingOptions,
    target: PhantomData<fn() -> T>,
}

impl<T> TailingStrategy<T> {
    /// Creates the strategy for a request.
    #[must_use]
    pub fn new(request: &TailingRequest<T>) -> Self {
        Self {
            listener: request.listener(),
            options: request.options().clone(),
            target: PhantomData,
        }
    }
}

#[async_trait]
impl<T> CursorStrategy for TailingStrategy<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Event = Document;

    async fn open_cursor(
        &self,
        db: &dyn DatabaseClient,
    ) -> Result<Box<dyn SourceCursor<Event = Document>>, Error> {
        let spec = match self.options.query() {
            Some(query) => TailSpec {
                filter: query.filter().clone(),
                collation: query.collation().cloned(),
            },
            None => TailSpec::default(),
        };

        let cursor = db
            .open_tail_cursor(self.options.collection_name(), spec)
            .await?;
        Ok(cursor)
    }

    fn deliver(&self, event: Document, database_name: &str) -> Result<(), Error> {
        let properties = MessageProperties::builder()
            .database_name(database_name)
            .collection_name(self.options.collection_name())
            .build();

        let message = Message::new(Some(event.clone()), Some(event), properties);
        emit(&self.listener, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Collation, TailQuery};
    use crate::testing::MockDatabase;
    use bson::doc;
    use parking_lot::Mutex;

    #[test]
    fn test_deliver_raw_equals_body() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let request: TailingRequest<Document> = TailingRequest::new(
            move |message: Message<Document, Document>| {
                sink.lock().push(message);
            },
            TailingOptions::builder().collection("audit").build(),
        );
        let strategy = TailingStrategy::new(&request);

        let doc = doc! { "_id": "id-1", "value": "foo" };
        strategy.deliver(doc.clone(), "db").unwrap();

        let received = received.lock();
        let message = &received[0];
        assert_eq!(message.raw(), Some(&doc));
        assert_eq!(message.body().unwrap().unwrap(), doc);
        assert_eq!(message.properties().database_name(), Some("db"));
        assert_eq!(message.properties().collection_name(), Some("audit"));
    }

    #[tokio::test]
    async fn test_open_cursor_passes_query_through() {
        let db = Arc::new(MockDatabase::new("db"));
        let request: TailingRequest<Document> = TailingRequest::new(
            |_message: Message<Document, Document>| {},
            TailingOptions::builder()
                .collection("audit")
                .query(
                    TailQuery::new(doc! { "kind": "error" })
                        .with_collation(Collation::new("en")),
                )
                .build(),
        );
        let strategy = TailingStrategy::new(&request);

        let _cursor = strategy.open_cursor(db.as_ref()).await.unwrap();

        let specs = db.recorded_tail_specs();
        let (collection, spec) = &specs[0];
        assert_eq!(collection, "audit");
        assert_eq!(spec.filter, doc! { "kind": "error" });
        assert_eq!(spec.collation.as_ref().unwrap().locale(), "en");
    }

    #[tokio::test]
    async fn test_open_cursor_without_query_matches_everything() {
        let db = Arc::new(MockDatabase::new("db"));
        let request: TailingRequest<Document> = TailingRequest::new(
            |_message: Message<Document, Document>| {},
            TailingOptions::builder().collection("audit").build(),
        );
        let strategy = TailingStrategy::new(&request);

        let _cursor = strategy.open_cursor(db.as_ref()).await.unwrap();

        let specs = db.recorded_tail_specs();
        assert!(specs[0].1.filter.is_empty());
        assert!(specs[0].1.collation.is_none());
    }
}
