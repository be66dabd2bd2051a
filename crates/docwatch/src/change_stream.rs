//! Change-stream cursor strategy.
//!
//! Opens the change-stream cursor described by a [`ChangeStreamOptions`]
//! and turns each [`ChangeStreamEvent`] into a message whose body is the
//! event's `fullDocument`.
//!
//! # Full-document policy
//!
//! When the caller set no explicit [`FullDocumentMode`], the policy is
//! derived from the target body type: a caller asking for typed bodies gets
//! [`FullDocumentMode::UpdateLookup`] — update events without a full
//! document could never be mapped — while the plain [`Document`] target
//! keeps the server default.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use serde::de::DeserializeOwned;

use crate::driver::{ChangeStreamSpec, DatabaseClient, SourceCursor};
use crate::error::Error;
use crate::event::ChangeStreamEvent;
use crate::filter;
use crate::message::{Message, MessageProperties};
use crate::options::{ChangeStreamOptions, FullDocumentMode};
use crate::request::{ChangeStreamRequest, MessageListener};
use crate::task::{emit, CursorStrategy};

/// Namespace name reported when an event carries none (e.g. invalidate).
const UNKNOWN_NAMESPACE: &str = "unknown";

/// Strategy backing change-stream subscriptions with target body type `T`.
pub struct ChangeStreamStrategy<T> {
    listener: Arc<dyn MessageListener<ChangeStreamEvent, T>>,
    options: ChangeStreamOptions,
    target: PhantomData<fn() -> T>,
}

impl<T: 'static> ChangeStreamStrategy<T> {
    /// Creates the strategy for a request.
    #[must_use]
    pub fn new(request: &ChangeStreamRequest<T>) -> Self {
        Self {
            listener: request.listener(),
            options: request.options().clone(),
            target: PhantomData,
        }
    }

    /// Resolves the full-document policy: the caller's explicit choice, or
    /// a type-derived default.
    fn full_document_mode(&self) -> FullDocumentMode {
        self.options.full_document().unwrap_or_else(|| {
            if TypeId::of::<T>() == TypeId::of::<Document>() {
                FullDocumentMode::Default
            } else {
                FullDocumentMode::UpdateLookup
            }
        })
    }
}

#[async_trait]
impl<T> CursorStrategy for ChangeStreamStrategy<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Event = ChangeStreamEvent;

    async fn open_cursor(
        &self,
        db: &dyn DatabaseClient,
    ) -> Result<Box<dyn SourceCursor<Event = ChangeStreamEvent>>, Error> {
        let spec = ChangeStreamSpec {
            pipeline: self.options.filter().map(filter::compile).unwrap_or_default(),
            resume_after: self
                .options
                .resume_token()
                .map(|token| token.as_document().clone()),
            collation: self.options.collation().cloned(),
            full_document: self.full_document_mode(),
        };

        let cursor = db
            .open_change_stream(self.options.collection_name(), spec)
            .await?;
        Ok(cursor)
    }

    fn deliver(&self, event: ChangeStreamEvent, _database_name: &str) -> Result<(), Error> {
        let (database, collection) = match &event.ns {
            Some(ns) => (ns.database.clone(), ns.collection.clone()),
            None => (UNKNOWN_NAMESPACE.to_string(), UNKNOWN_NAMESPACE.to_string()),
        };
        let properties = MessageProperties::builder()
            .database_name(database)
            .collection_name(collection)
            .build();

        let body = event.full_document.clone();
        let message = Message::new(Some(event), body, properties);
        emit(&self.listener, message)
    }
}
