//! Change-stream event value types.
//!
//! [`ChangeStreamEvent`] is the raw record emitted by the server for a data
//! mutation: an opaque [`ResumeToken`], the operation kind, the namespace it
//! happened in, and — depending on the full-document lookup policy — the
//! post-image of the document. Tailing cursors emit plain
//! [`Document`](bson::Document)s and do not use these types.

use bson::Document;

/// Opaque marker identifying a position in the change-event stream.
///
/// The driver accepts a previously observed token to continue a stream
/// after the event that produced it. The token's content is meaningful only
/// to the server; callers treat it as a value to store and replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeToken(Document);

impl ResumeToken {
    /// Wraps a raw token document.
    #[must_use]
    pub fn new(token: Document) -> Self {
        Self(token)
    }

    /// Returns the token as the document the driver expects.
    #[must_use]
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    /// Consumes the token, returning the underlying document.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.0
    }
}

impl From<Document> for ResumeToken {
    fn from(token: Document) -> Self {
        Self::new(token)
    }
}

/// The kind of mutation a change event describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationType {
    /// A document was inserted.
    Insert,
    /// A document was updated in place.
    Update,
    /// A document was replaced wholesale.
    Replace,
    /// A document was deleted.
    Delete,
    /// The watched collection was dropped.
    Drop,
    /// The watched collection was renamed.
    Rename,
    /// The stream became invalid (e.g. the collection was dropped);
    /// such events carry no namespace.
    Invalidate,
    /// An operation type this crate does not model.
    Other(String),
}

/// The namespace (database + collection) an event originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNamespace {
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
}

impl EventNamespace {
    /// Creates a namespace.
    #[must_use]
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

/// Description of the fields touched by an update event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateDescription {
    /// Fields that were set, with their new values.
    pub updated_fields: Option<Document>,
    /// Fields that were removed.
    pub removed_fields: Vec<String>,
}

/// A raw change event as emitted by the server.
///
/// `full_document` is present for inserts and replaces; for updates it is
/// only present when the cursor was opened with
/// [`FullDocumentMode::UpdateLookup`](crate::options::FullDocumentMode::UpdateLookup).
/// `ns` is absent on invalidate events.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeStreamEvent {
    /// Resume token identifying this event's position in the stream.
    pub id: ResumeToken,
    /// The kind of mutation.
    pub operation_type: OperationType,
    /// Origin namespace, absent for invalidate events.
    pub ns: Option<EventNamespace>,
    /// The `_id` (and shard key, if any) of the affected document.
    pub document_key: Option<Document>,
    /// Field-level description of an update.
    pub update_description: Option<UpdateDescription>,
    /// Post-image of the affected document, when available.
    pub full_document: Option<Document>,
}
