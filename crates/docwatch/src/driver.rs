//! The database-driver seam.
//!
//! The container does not speak the wire protocol itself; it consumes a
//! narrow slice of a driver through these traits. A production binding
//! adapts the real client; the [`testing`](crate::testing) module ships an
//! in-memory implementation used by this crate's own tests.

use async_trait::async_trait;
use bson::Document;

use crate::error::DriverError;
use crate::event::ChangeStreamEvent;
use crate::options::{Collation, FullDocumentMode};

/// Everything needed to open a change-stream cursor.
#[derive(Debug, Clone, Default)]
pub struct ChangeStreamSpec {
    /// Aggregation pipeline filtering the stream; empty means unfiltered.
    pub pipeline: Vec<Document>,
    /// Resume token document to continue after, if any.
    pub resume_after: Option<Document>,
    /// Collation to apply, if any.
    pub collation: Option<Collation>,
    /// Full-document lookup mode.
    pub full_document: FullDocumentMode,
}

/// Everything needed to open a tailing cursor on a capped collection.
///
/// Tail cursors use tailable-await semantics with no server-side cursor
/// timeout; both are part of this contract, not separate flags.
#[derive(Debug, Clone, Default)]
pub struct TailSpec {
    /// Filter restricting the tailed documents; empty matches everything.
    pub filter: Document,
    /// Collation to apply, if any.
    pub collation: Option<Collation>,
}

/// A server-side cursor yielding events of one kind.
#[async_trait]
pub trait SourceCursor: Send {
    /// The event type this cursor emits.
    type Event: Send + 'static;

    /// Polls the cursor without blocking on new data.
    ///
    /// Returns `Ok(None)` when no event is currently available; the caller
    /// decides when to poll again.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the server or transport fails.
    async fn try_next(&mut self) -> Result<Option<Self::Event>, DriverError>;

    /// The id of the server-side cursor backing this handle.
    ///
    /// `None` or `0` means the cursor is exhausted or was never
    /// established — the health probe used during task startup.
    fn server_cursor_id(&self) -> Option<i64>;

    /// Closes the cursor, releasing its server-side resources.
    async fn close(&mut self);
}

/// Boxed change-stream cursor.
pub type BoxChangeStreamCursor = Box<dyn SourceCursor<Event = ChangeStreamEvent>>;

/// Boxed tailing cursor.
pub type BoxDocumentCursor = Box<dyn SourceCursor<Event = Document>>;

/// Handle to one database of the document store.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// The name of the database this client is bound to.
    fn database_name(&self) -> &str;

    /// Opens a change-stream cursor on a collection.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the stream cannot be established.
    async fn open_change_stream(
        &self,
        collection: &str,
        spec: ChangeStreamSpec,
    ) -> Result<BoxChangeStreamCursor, DriverError>;

    /// Opens a tailable-await cursor with no cursor timeout on a capped
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the cursor cannot be established.
    async fn open_tail_cursor(
        &self,
        collection: &str,
        spec: TailSpec,
    ) -> Result<BoxDocumentCursor, DriverError>;
}
