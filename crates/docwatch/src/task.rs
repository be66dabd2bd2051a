//! Cursor-reading tasks.
//!
//! A [`Task`] is the per-subscription worker: a state machine that obtains a
//! healthy cursor, polls it, and hands every event to the subscription's
//! listener until cancelled. The two subscription kinds share one concrete
//! implementation, [`CursorTask`]; what differs — how the cursor is opened
//! and how an event becomes a message — lives in a [`CursorStrategy`].
//!
//! # Lifecycle
//!
//! ```text
//! Created ──run──► Starting ──healthy cursor──► Running ──cancel──► Cancelled
//!                     │                                                ▲
//!                     └────────────────cancel─────────────────────────┘
//! ```
//!
//! `Cancelled` is terminal; a fresh task object is required to subscribe
//! again. While `Starting`, cursor creation is retried on a fixed backoff
//! until a cursor with a live server-side id is obtained or the task is
//! cancelled.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::PollingConfig;
use crate::driver::{DatabaseClient, SourceCursor};
use crate::error::{Error, ErrorHandler, ErrorTranslator};
use crate::message::Message;
use crate::metrics::{TaskMetrics, TaskMetricsSnapshot};
use crate::request::MessageListener;

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Built but never executed.
    Created,
    /// Executing, waiting for a healthy cursor.
    Starting,
    /// Polling its cursor and delivering messages.
    Running,
    /// Cancelled. Terminal; the task will not deliver again.
    Cancelled,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// A long-lived cursor-reading worker.
#[async_trait]
pub trait Task: Send + Sync {
    /// Executes the task: obtain a cursor, poll it, deliver messages.
    /// Returns when the task is cancelled.
    async fn run(self: Arc<Self>);

    /// Cancels the task and releases its cursor.
    ///
    /// Safe to call repeatedly; a no-op unless the task is starting or
    /// running.
    fn cancel(&self);

    /// The current lifecycle state.
    fn state(&self) -> TaskState;

    /// Whether this task should occupy a dedicated long-running worker
    /// rather than a bounded queue slot. Always `true` for cursor tasks.
    fn is_long_lived(&self) -> bool {
        true
    }

    /// Delivery counters for this task.
    fn metrics(&self) -> TaskMetricsSnapshot;
}

/// The subscription-kind-specific half of a cursor task: opening the cursor
/// and turning a raw event into a delivered message.
#[async_trait]
pub trait CursorStrategy: Send + Sync + 'static {
    /// The raw event type emitted by this strategy's cursor.
    type Event: Send + 'static;

    /// Opens the cursor described by the subscription's options.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the options are invalid or the driver fails;
    /// during startup such failures are retried.
    async fn open_cursor(
        &self,
        db: &dyn DatabaseClient,
    ) -> Result<Box<dyn SourceCursor<Event = Self::Event>>, Error>;

    /// Wraps an event as a message and invokes the listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listener`] when the listener panics.
    fn deliver(&self, event: Self::Event, database_name: &str) -> Result<(), Error>;
}

/// Invokes a listener, isolating the task loop from listener panics.
pub(crate) fn emit<R, B>(
    listener: &Arc<dyn MessageListener<R, B>>,
    message: Message<R, B>,
) -> Result<(), Error> {
    catch_unwind(AssertUnwindSafe(|| listener.on_message(message)))
        .map_err(|payload| Error::Listener(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "listener panicked".to_string()
    }
}

/// The shared cursor-reading state machine.
///
/// One `CursorTask` backs one subscription. The task owns its cursor for
/// the duration of the run loop and closes it exactly once on the way out;
/// [`cancel`](Task::cancel) flips the state under the lifecycle lock and
/// wakes any pending sleep, and the loop observes the change at its next
/// poll.
pub struct CursorTask<S: CursorStrategy> {
    strategy: S,
    db: Arc<dyn DatabaseClient>,
    config: PollingConfig,
    error_handler: Arc<dyn ErrorHandler>,
    translator: Arc<dyn ErrorTranslator>,
    state: Mutex<TaskState>,
    wakeup: Notify,
    metrics: TaskMetrics,
}

impl<S: CursorStrategy> CursorTask<S> {
    /// Creates a task in the `Created` state.
    pub fn new(
        strategy: S,
        db: Arc<dyn DatabaseClient>,
        config: PollingConfig,
        error_handler: Arc<dyn ErrorHandler>,
        translator: Arc<dyn ErrorTranslator>,
    ) -> Self {
        Self {
            strategy,
            db,
            config,
            error_handler,
            translator,
            state: Mutex::new(TaskState::Created),
            wakeup: Notify::new(),
            metrics: TaskMetrics::default(),
        }
    }

    fn is_running(&self) -> bool {
        *self.state.lock() == TaskState::Running
    }

    /// Sleeps for `duration`, returning early when the task is cancelled.
    async fn idle(&self, duration: Duration) {
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = self.wakeup.notified() => {}
        }
    }

    /// Startup: obtain a healthy cursor, retrying on a fixed backoff.
    ///
    /// Returns `None` when the task was cancelled before a cursor could be
    /// established, or when the task is not in a startable state.
    async fn start_cursor(&self) -> Option<Box<dyn SourceCursor<Event = S::Event>>> {
        {
            let mut state = self.state.lock();
            match *state {
                TaskState::Created => *state = TaskState::Starting,
                TaskState::Starting => {}
                TaskState::Running | TaskState::Cancelled => return None,
            }
        }

        loop {
            if *self.state.lock() != TaskState::Starting {
                return None;
            }

            match self.strategy.open_cursor(self.db.as_ref()).await {
                Ok(mut cursor) => {
                    if cursor.server_cursor_id().is_some_and(|id| id != 0) {
                        let promoted = {
                            let mut state = self.state.lock();
                            if *state == TaskState::Starting {
                                *state = TaskState::Running;
                                true
                            } else {
                                false
                            }
                        };
                        if promoted {
                            return Some(cursor);
                        }
                        // Cancelled while the cursor was being opened.
                        cursor.close().await;
                        return None;
                    }
                    cursor.close().await;
                }
                Err(error) => {
                    tracing::debug!("cursor creation failed, retrying: {error}");
                }
            }

            self.idle(self.config.startup_retry_interval).await;
        }
    }
}

#[async_trait]
impl<S: CursorStrategy> Task for CursorTask<S> {
    async fn run(self: Arc<Self>) {
        let Some(mut cursor) = self.start_cursor().await else {
            return;
        };
        tracing::debug!(database = self.db.database_name(), "cursor task running");

        while self.is_running() {
            match cursor.try_next().await {
                Ok(Some(event)) => {
                    if !self.is_running() {
                        break;
                    }
                    match self.strategy.deliver(event, self.db.database_name()) {
                        Ok(()) => self.metrics.record_delivery(),
                        Err(error) => {
                            self.metrics.record_error();
                            self.error_handler.handle(error);
                        }
                    }
                }
                Ok(None) => {
                    self.metrics.record_empty_poll();
                    self.idle(self.config.poll_interval).await;
                }
                Err(error) => {
                    if !self.is_running() {
                        // Cursor failures after cancellation are expected.
                        break;
                    }
                    self.metrics.record_error();
                    let error = self
                        .translator
                        .translate(&error)
                        .unwrap_or(Error::Driver(error));
                    self.error_handler.handle(error);
                    self.idle(self.config.poll_interval).await;
                }
            }
        }

        cursor.close().await;
        tracing::debug!(database = self.db.database_name(), "cursor task stopped");
    }

    fn cancel(&self) {
        let mut state = self.state.lock();
        if matches!(*state, TaskState::Starting | TaskState::Running) {
            *state = TaskState::Cancelled;
            drop(state);
            self.wakeup.notify_waiters();
        }
    }

    fn state(&self) -> TaskState {
        *self.state.lock()
    }

    fn metrics(&self) -> TaskMetricsSnapshot {
        self.metrics.snapshot()
    }
}
