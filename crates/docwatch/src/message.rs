//! Message abstraction for events delivered to listeners.
//!
//! A [`Message`] carries the raw event as emitted by the source cursor, the
//! payload of interest (the `fullDocument` of a change event, or the tailed
//! document itself), and [`MessageProperties`] describing the origin. The
//! body is converted into the caller's target type lazily, on every
//! [`body()`](Message::body) call — conversion failures surface to the
//! caller of `body()`, never into the task loop that delivered the message.

use std::any::type_name;
use std::marker::PhantomData;

use bson::Document;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Information about a message's origin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageProperties {
    database_name: Option<String>,
    collection_name: Option<String>,
}

impl MessageProperties {
    /// Returns empty properties.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a builder for message properties.
    #[must_use]
    pub fn builder() -> MessagePropertiesBuilder {
        MessagePropertiesBuilder::default()
    }

    /// The database the message originated from.
    #[must_use]
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    /// The collection the message originated from.
    #[must_use]
    pub fn collection_name(&self) -> Option<&str> {
        self.collection_name.as_deref()
    }
}

/// Fluent builder for [`MessageProperties`].
#[derive(Debug, Default)]
pub struct MessagePropertiesBuilder {
    properties: MessageProperties,
}

impl MessagePropertiesBuilder {
    /// Sets the origin database name.
    #[must_use]
    pub fn database_name(mut self, database_name: impl Into<String>) -> Self {
        self.properties.database_name = Some(database_name.into());
        self
    }

    /// Sets the origin collection name.
    #[must_use]
    pub fn collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.properties.collection_name = Some(collection_name.into());
        self
    }

    /// Freezes the properties.
    #[must_use]
    pub fn build(self) -> MessageProperties {
        self.properties
    }
}

/// An event delivered to a listener, with lazy body conversion into `T`.
///
/// `R` is the raw event type (`ChangeStreamEvent` for change streams, a
/// plain [`Document`] for tailing cursors). The body document, when present,
/// is deserialized into `T` on demand; asking for `T = Document` hands the
/// payload back unchanged.
pub struct Message<R, T> {
    raw: Option<R>,
    body: Option<Document>,
    properties: MessageProperties,
    target: PhantomData<fn() -> T>,
}

impl<R, T> Message<R, T> {
    /// Creates a message from a raw event, an optional body document, and
    /// origin properties.
    #[must_use]
    pub fn new(raw: Option<R>, body: Option<Document>, properties: MessageProperties) -> Self {
        Self {
            raw,
            body,
            properties,
            target: PhantomData,
        }
    }

    /// The raw event as emitted by the source cursor.
    #[must_use]
    pub fn raw(&self) -> Option<&R> {
        self.raw.as_ref()
    }

    /// The unconverted body document.
    #[must_use]
    pub fn body_document(&self) -> Option<&Document> {
        self.body.as_ref()
    }

    /// Properties describing the message origin.
    #[must_use]
    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }
}

impl<R, T> Message<R, T>
where
    T: DeserializeOwned,
{
    /// Converts the body into the target type.
    ///
    /// Returns `Ok(None)` when the event carried no body (e.g. an update
    /// without full-document lookup). Conversion runs on every call; there
    /// is no internal caching.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] naming the source and target types when
    /// the body cannot be deserialized into `T`.
    pub fn body(&self) -> Result<Option<T>, Error> {
        let Some(doc) = &self.body else {
            return Ok(None);
        };

        bson::from_document(doc.clone())
            .map(Some)
            .map_err(|e| Error::Conversion {
                from: type_name::<Document>().to_string(),
                to: type_name::<T>().to_string(),
                message: e.to_string(),
            })
    }
}

impl<R: std::fmt::Debug, T> std::fmt::Debug for Message<R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("raw", &self.raw)
            .field("body", &self.body)
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        #[serde(rename = "_id")]
        id: String,
        firstname: String,
    }

    #[test]
    fn test_properties_builder() {
        let properties = MessageProperties::builder()
            .database_name("db")
            .collection_name("col")
            .build();
        assert_eq!(properties.database_name(), Some("db"));
        assert_eq!(properties.collection_name(), Some("col"));
    }

    #[test]
    fn test_properties_empty() {
        let properties = MessageProperties::empty();
        assert!(properties.database_name().is_none());
        assert!(properties.collection_name().is_none());
    }

    #[test]
    fn test_body_converts_to_target_type() {
        let doc = doc! { "_id": "id-1", "firstname": "foo" };
        let message: Message<Document, Person> =
            Message::new(Some(doc.clone()), Some(doc), MessageProperties::empty());

        let body = message.body().unwrap().unwrap();
        assert_eq!(
            body,
            Person {
                id: "id-1".into(),
                firstname: "foo".into()
            }
        );
    }

    #[test]
    fn test_body_document_target_is_identity() {
        let doc = doc! { "_id": "id-1", "value": "bar" };
        let message: Message<Document, Document> =
            Message::new(Some(doc.clone()), Some(doc.clone()), MessageProperties::empty());

        assert_eq!(message.body().unwrap().unwrap(), doc);
    }

    #[test]
    fn test_missing_body_converts_to_none() {
        let message: Message<Document, Person> =
            Message::new(None, None, MessageProperties::empty());
        assert!(message.body().unwrap().is_none());
    }

    #[test]
    fn test_conversion_failure_names_both_types() {
        // firstname has the wrong shape for Person.
        let doc = doc! { "_id": "id-1", "firstname": { "nested": true } };
        let message: Message<Document, Person> =
            Message::new(None, Some(doc), MessageProperties::empty());

        let err = message.body().unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("Document"), "missing source type: {rendered}");
        assert!(rendered.contains("Person"), "missing target type: {rendered}");
    }

    #[test]
    fn test_conversion_runs_per_call() {
        let doc = doc! { "_id": "id-1", "firstname": "foo" };
        let message: Message<Document, Person> =
            Message::new(None, Some(doc), MessageProperties::empty());

        let first = message.body().unwrap().unwrap();
        let second = message.body().unwrap().unwrap();
        assert_eq!(first, second);
    }
}
