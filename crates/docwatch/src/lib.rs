//! # docwatch
//!
//! A change-feed subscription container for document databases. Application
//! code registers subscriptions — change streams or tailable cursors on
//! capped collections — and the container runs one long-lived worker per
//! subscription, delivering every event to the registered listener with
//! lazy conversion of the event body into a caller-chosen target type.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► RequestOptions ──► SubscriptionRequest ──► Container::register
//!                                                           │
//!                              TaskFactory ◄────────────────┤
//!                                  │                        ▼
//!                              CursorTask  ──────────► Subscription
//!                                  │
//!                 cursor ──► Message ──► MessageListener
//! ```
//!
//! The container owns the subscription set and a worker per active task;
//! each task owns its cursor and polls it non-blockingly, sleeping briefly
//! on empty polls. Stopping the container cancels every task but retains
//! the registrations, so a later start rebuilds and resubmits them.
//!
//! The wire driver and the typed conversion are external collaborators:
//! the driver is consumed through the [`driver`] traits, and bodies are
//! deserialized with `serde` via the BSON document model.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Common test patterns that are acceptable
#![cfg_attr(
    test,
    allow(
        clippy::float_cmp,
        clippy::needless_pass_by_value,
        clippy::significant_drop_tightening,
        clippy::unreadable_literal
    )
)]

/// Lifecycle + registry + worker dispatch.
pub mod container;

/// The database-driver seam.
pub mod driver;

/// Error types, error handler, and error translator.
pub mod error;

/// Change-stream event value types.
pub mod event;

/// Change-stream filter compilation.
pub mod filter;

/// Messages delivered to listeners.
pub mod message;

/// Per-subscription request options.
pub mod options;

/// Subscription requests and listener callbacks.
pub mod request;

/// Subscription handles.
pub mod subscription;

/// Cursor-reading tasks.
pub mod task;

/// Polling configuration.
pub mod config;

/// Task creation from requests.
pub mod factory;

/// In-memory mock driver for tests.
pub mod testing;

mod change_stream;
mod metrics;
mod tailing;

pub use change_stream::ChangeStreamStrategy;
pub use config::PollingConfig;
pub use container::SubscriptionContainer;
pub use driver::{
    BoxChangeStreamCursor, BoxDocumentCursor, ChangeStreamSpec, DatabaseClient, SourceCursor,
    TailSpec,
};
pub use error::{
    DriverError, Error, ErrorHandler, ErrorTranslator, LoggingErrorHandler, NoErrorTranslation,
};
pub use event::{
    ChangeStreamEvent, EventNamespace, OperationType, ResumeToken, UpdateDescription,
};
pub use factory::TaskFactory;
pub use filter::StreamFilter;
pub use message::{Message, MessageProperties};
pub use metrics::TaskMetricsSnapshot;
pub use options::{
    ChangeStreamOptions, ChangeStreamOptionsBuilder, Collation, FullDocumentMode, TailQuery,
    TailingOptions, TailingOptionsBuilder,
};
pub use request::{ChangeStreamRequest, MessageListener, SubscriptionRequest, TailingRequest};
pub use subscription::{Subscription, SubscriptionId};
pub use tailing::TailingStrategy;
pub use task::{CursorStrategy, CursorTask, Task, TaskState};
