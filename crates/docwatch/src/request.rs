//! Subscription requests: a listener callback bound to request options.
//!
//! A request names *what* to subscribe to (its options) and *who* receives
//! the events (its [`MessageListener`]). Requests are cheap to clone — the
//! listener is shared behind an [`Arc`] — so the container can retain them
//! and rebuild tasks across stop/start cycles.

use std::sync::Arc;

use bson::Document;

use crate::event::ChangeStreamEvent;
use crate::message::Message;
use crate::options::{ChangeStreamOptions, TailingOptions};

/// Callback receiving messages for a subscription.
///
/// Invoked synchronously on the subscription's worker; a long-running
/// listener blocks that subscription's progress but no other. Closures of
/// the matching shape implement this trait directly:
///
/// ```
/// use bson::Document;
/// use docwatch::{ChangeStreamEvent, ChangeStreamOptions, ChangeStreamRequest, Message};
///
/// let request: ChangeStreamRequest<Document> = ChangeStreamRequest::new(
///     |message: Message<ChangeStreamEvent, Document>| println!("{message:?}"),
///     ChangeStreamOptions::builder().collection("orders").build(),
/// );
/// ```
///
/// A panicking listener does not tear down the subscription; the panic is
/// routed to the task's error handler and polling continues.
pub trait MessageListener<R, B>: Send + Sync {
    /// Called for each message emitted by the subscription's cursor.
    fn on_message(&self, message: Message<R, B>);
}

impl<R, B, F> MessageListener<R, B> for F
where
    F: Fn(Message<R, B>) + Send + Sync,
{
    fn on_message(&self, message: Message<R, B>) {
        self(message);
    }
}

/// Request to listen to a collection's change stream, converting event
/// bodies into `T`.
pub struct ChangeStreamRequest<T> {
    listener: Arc<dyn MessageListener<ChangeStreamEvent, T>>,
    options: ChangeStreamOptions,
}

impl<T> ChangeStreamRequest<T> {
    /// Binds a listener to change-stream options.
    pub fn new(
        listener: impl MessageListener<ChangeStreamEvent, T> + 'static,
        options: ChangeStreamOptions,
    ) -> Self {
        Self {
            listener: Arc::new(listener),
            options,
        }
    }

    /// The listener receiving the messages.
    #[must_use]
    pub fn listener(&self) -> Arc<dyn MessageListener<ChangeStreamEvent, T>> {
        Arc::clone(&self.listener)
    }

    /// The request options.
    #[must_use]
    pub fn options(&self) -> &ChangeStreamOptions {
        &self.options
    }
}

impl<T> Clone for ChangeStreamRequest<T> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            options: self.options.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ChangeStreamRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeStreamRequest")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Request to tail a capped collection, converting document bodies into `T`.
pub struct TailingRequest<T> {
    listener: Arc<dyn MessageListener<Document, T>>,
    options: TailingOptions,
}

impl<T> TailingRequest<T> {
    /// Binds a listener to tailing options.
    pub fn new(
        listener: impl MessageListener<Document, T> + 'static,
        options: TailingOptions,
    ) -> Self {
        Self {
            listener: Arc::new(listener),
            options,
        }
    }

    /// The listener receiving the messages.
    #[must_use]
    pub fn listener(&self) -> Arc<dyn MessageListener<Document, T>> {
        Arc::clone(&self.listener)
    }

    /// The request options.
    #[must_use]
    pub fn options(&self) -> &TailingOptions {
        &self.options
    }
}

impl<T> Clone for TailingRequest<T> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            options: self.options.clone(),
        }
    }
}

impl<T> std::fmt::Debug for TailingRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailingRequest")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A subscription request of either kind, as accepted by the container.
#[derive(Debug, Clone)]
pub enum SubscriptionRequest<T> {
    /// Listen to a change stream.
    ChangeStream(ChangeStreamRequest<T>),
    /// Tail a capped collection.
    Tailing(TailingRequest<T>),
}

impl<T> SubscriptionRequest<T> {
    /// The collection this request subscribes to.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        match self {
            Self::ChangeStream(request) => request.options().collection_name(),
            Self::Tailing(request) => request.options().collection_name(),
        }
    }
}

impl<T> From<ChangeStreamRequest<T>> for SubscriptionRequest<T> {
    fn from(request: ChangeStreamRequest<T>) -> Self {
        Self::ChangeStream(request)
    }
}

impl<T> From<TailingRequest<T>> for SubscriptionRequest<T> {
    fn from(request: TailingRequest<T>) -> Self {
        Self::Tailing(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageProperties;
    use bson::doc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener: Arc<dyn MessageListener<Document, Document>> =
            Arc::new(move |_message: Message<Document, Document>| {
                counter.fetch_add(1, Ordering::Relaxed);
            });

        listener.on_message(Message::new(None, None, MessageProperties::empty()));
        listener.on_message(Message::new(None, None, MessageProperties::empty()));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_request_clone_shares_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let request: TailingRequest<Document> = TailingRequest::new(
            move |_message: Message<Document, Document>| {
                counter.fetch_add(1, Ordering::Relaxed);
            },
            TailingOptions::builder().collection("col").build(),
        );

        let cloned = request.clone();
        cloned
            .listener()
            .on_message(Message::new(None, None, MessageProperties::empty()));
        request
            .listener()
            .on_message(Message::new(None, None, MessageProperties::empty()));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_request_collection_name() {
        let change_stream: SubscriptionRequest<Document> = ChangeStreamRequest::new(
            |_message: Message<ChangeStreamEvent, Document>| {},
            ChangeStreamOptions::builder()
                .collection("orders")
                .filter(crate::filter::StreamFilter::criteria(doc! { "a": 1 }))
                .build(),
        )
        .into();
        assert_eq!(change_stream.collection_name(), "orders");

        let tailing: SubscriptionRequest<Document> = TailingRequest::new(
            |_message: Message<Document, Document>| {},
            TailingOptions::builder().collection("audit").build(),
        )
        .into();
        assert_eq!(tailing.collection_name(), "audit");
    }
}
