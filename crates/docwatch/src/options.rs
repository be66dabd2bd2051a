//! Immutable per-subscription request options.
//!
//! Options describe *what* to subscribe to: the collection, an optional
//! filter, and cursor tuning such as resume tokens, collation, and the
//! full-document lookup policy. They are built through fluent builders;
//! `build()` hands out a frozen snapshot that the builder no longer touches.

use bson::Document;

use crate::event::ResumeToken;
use crate::filter::StreamFilter;

/// Server-side collation applied to a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collation {
    locale: String,
    strength: Option<u32>,
}

impl Collation {
    /// Creates a collation for the given ICU locale.
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            strength: None,
        }
    }

    /// Sets the comparison strength level (1–5).
    #[must_use]
    pub fn with_strength(mut self, strength: u32) -> Self {
        self.strength = Some(strength);
        self
    }

    /// Returns the locale.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Returns the strength level, if set.
    #[must_use]
    pub fn strength(&self) -> Option<u32> {
        self.strength
    }

    /// Renders the collation as the document the driver sends to the server.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("locale", self.locale.clone());
        if let Some(strength) = self.strength {
            doc.insert("strength", i64::from(strength));
        }
        doc
    }
}

/// Policy deciding whether the server attaches the post-image of the
/// document to update events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullDocumentMode {
    /// Server default: update events carry no full document.
    #[default]
    Default,
    /// The server looks up and attaches the current document on updates.
    UpdateLookup,
}

/// Options for a change-stream subscription.
///
/// ```
/// use docwatch::{ChangeStreamOptions, FullDocumentMode, StreamFilter};
/// use bson::doc;
///
/// let options = ChangeStreamOptions::builder()
///     .collection("orders")
///     .filter(StreamFilter::criteria(doc! { "status": "shipped" }))
///     .full_document(FullDocumentMode::UpdateLookup)
///     .build();
/// assert_eq!(options.collection_name(), "orders");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeStreamOptions {
    collection_name: String,
    filter: Option<StreamFilter>,
    resume_token: Option<ResumeToken>,
    full_document: Option<FullDocumentMode>,
    collation: Option<Collation>,
}

impl ChangeStreamOptions {
    /// Returns a builder for change-stream options.
    #[must_use]
    pub fn builder() -> ChangeStreamOptionsBuilder {
        ChangeStreamOptionsBuilder::default()
    }

    /// The collection to watch.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// The event filter, if any.
    #[must_use]
    pub fn filter(&self) -> Option<&StreamFilter> {
        self.filter.as_ref()
    }

    /// The resume token to continue after, if any.
    #[must_use]
    pub fn resume_token(&self) -> Option<&ResumeToken> {
        self.resume_token.as_ref()
    }

    /// The caller-chosen full-document lookup policy, if any.
    ///
    /// When unset, the task derives the policy from the target body type.
    #[must_use]
    pub fn full_document(&self) -> Option<FullDocumentMode> {
        self.full_document
    }

    /// The collation to apply to the cursor, if any.
    #[must_use]
    pub fn collation(&self) -> Option<&Collation> {
        self.collation.as_ref()
    }
}

/// Fluent builder for [`ChangeStreamOptions`].
#[derive(Debug, Default)]
pub struct ChangeStreamOptionsBuilder {
    options: ChangeStreamOptions,
}

impl ChangeStreamOptionsBuilder {
    /// Sets the collection to watch.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.options.collection_name = collection.into();
        self
    }

    /// Sets the event filter.
    #[must_use]
    pub fn filter(mut self, filter: StreamFilter) -> Self {
        self.options.filter = Some(filter);
        self
    }

    /// Sets the resume token after which to start listening.
    #[must_use]
    pub fn resume_token(mut self, token: impl Into<ResumeToken>) -> Self {
        self.options.resume_token = Some(token.into());
        self
    }

    /// Sets the full-document lookup policy.
    #[must_use]
    pub fn full_document(mut self, mode: FullDocumentMode) -> Self {
        self.options.full_document = Some(mode);
        self
    }

    /// Shortcut for [`FullDocumentMode::UpdateLookup`].
    #[must_use]
    pub fn return_full_document_on_update(self) -> Self {
        self.full_document(FullDocumentMode::UpdateLookup)
    }

    /// Sets the cursor collation.
    #[must_use]
    pub fn collation(mut self, collation: Collation) -> Self {
        self.options.collation = Some(collation);
        self
    }

    /// Freezes the options into an immutable snapshot.
    #[must_use]
    pub fn build(self) -> ChangeStreamOptions {
        self.options
    }
}

/// Filter and collation applied to a tailing cursor.
#[derive(Debug, Clone, Default)]
pub struct TailQuery {
    filter: Document,
    collation: Option<Collation>,
}

impl TailQuery {
    /// Creates a query matching documents against the given filter.
    #[must_use]
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            collation: None,
        }
    }

    /// Sets the collation to apply.
    #[must_use]
    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = Some(collation);
        self
    }

    /// The filter document.
    #[must_use]
    pub fn filter(&self) -> &Document {
        &self.filter
    }

    /// The collation, if any.
    #[must_use]
    pub fn collation(&self) -> Option<&Collation> {
        self.collation.as_ref()
    }
}

/// Options for a tailing subscription on a capped collection.
#[derive(Debug, Clone, Default)]
pub struct TailingOptions {
    collection_name: String,
    query: Option<TailQuery>,
}

impl TailingOptions {
    /// Returns a builder for tailing options.
    #[must_use]
    pub fn builder() -> TailingOptionsBuilder {
        TailingOptionsBuilder::default()
    }

    /// The capped collection to tail.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// The query restricting the tailed documents, if any.
    #[must_use]
    pub fn query(&self) -> Option<&TailQuery> {
        self.query.as_ref()
    }
}

/// Fluent builder for [`TailingOptions`].
#[derive(Debug, Default)]
pub struct TailingOptionsBuilder {
    options: TailingOptions,
}

impl TailingOptionsBuilder {
    /// Sets the capped collection to tail.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.options.collection_name = collection.into();
        self
    }

    /// Sets the query restricting the tailed documents.
    #[must_use]
    pub fn query(mut self, query: TailQuery) -> Self {
        self.options.query = Some(query);
        self
    }

    /// Freezes the options into an immutable snapshot.
    #[must_use]
    pub fn build(self) -> TailingOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_collation_to_document() {
        let collation = Collation::new("en").with_strength(2);
        assert_eq!(
            collation.to_document(),
            doc! { "locale": "en", "strength": 2_i64 }
        );

        let collation = Collation::new("fr");
        assert_eq!(collation.to_document(), doc! { "locale": "fr" });
    }

    #[test]
    fn test_change_stream_options_builder() {
        let options = ChangeStreamOptions::builder()
            .collection("orders")
            .resume_token(doc! { "_data": 7_i64 })
            .return_full_document_on_update()
            .collation(Collation::new("en"))
            .build();

        assert_eq!(options.collection_name(), "orders");
        assert_eq!(
            options.resume_token().unwrap().as_document(),
            &doc! { "_data": 7_i64 }
        );
        assert_eq!(options.full_document(), Some(FullDocumentMode::UpdateLookup));
        assert_eq!(options.collation().unwrap().locale(), "en");
        assert!(options.filter().is_none());
    }

    #[test]
    fn test_builder_returns_frozen_snapshot() {
        let first = ChangeStreamOptions::builder().collection("a").build();
        let second = ChangeStreamOptions::builder()
            .collection("b")
            .return_full_document_on_update()
            .build();

        assert_eq!(first.collection_name(), "a");
        assert!(first.full_document().is_none());
        assert_eq!(second.collection_name(), "b");
    }

    #[test]
    fn test_tailing_options_builder() {
        let options = TailingOptions::builder()
            .collection("events")
            .query(TailQuery::new(doc! { "kind": "audit" }).with_collation(Collation::new("en")))
            .build();

        assert_eq!(options.collection_name(), "events");
        let query = options.query().unwrap();
        assert_eq!(query.filter(), &doc! { "kind": "audit" });
        assert_eq!(query.collation().unwrap().locale(), "en");
    }

    #[test]
    fn test_full_document_mode_default() {
        assert_eq!(FullDocumentMode::default(), FullDocumentMode::Default);
    }
}
