//! The subscription container: lifecycle, registry, and worker dispatch.
//!
//! A [`SubscriptionContainer`] owns an arbitrary set of subscriptions and a
//! worker per active one. Subscriptions may be registered before or after
//! [`start`](SubscriptionContainer::start); [`stop`](SubscriptionContainer::stop)
//! cancels every active task but keeps the registrations, so a later start
//! resumes the same set. Because cancelled tasks are terminal, restart
//! rebuilds fresh tasks from the retained request specifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::config::PollingConfig;
use crate::driver::DatabaseClient;
use crate::error::{Error, ErrorHandler, ErrorTranslator, LoggingErrorHandler, NoErrorTranslation};
use crate::factory::TaskFactory;
use crate::request::SubscriptionRequest;
use crate::subscription::{Subscription, SubscriptionId};
use crate::task::{Task, TaskState};

/// Start-last / stop-first ordering hint for external lifecycle frameworks.
const DEFAULT_PHASE: i32 = i32::MAX;

struct Registration {
    subscription: Arc<Subscription>,
    rebuild: Box<dyn Fn() -> Result<Arc<dyn Task>, Error> + Send + Sync>,
}

struct Inner {
    running: bool,
    registrations: Vec<Registration>,
}

/// Container coordinating change-feed subscriptions against one database.
///
/// ```no_run
/// use std::sync::Arc;
/// use bson::Document;
/// use docwatch::{
///     Message, SubscriptionContainer, TailingOptions, TailingRequest,
/// };
/// # use docwatch::testing::MockDatabase;
///
/// # #[tokio::main] async fn main() -> Result<(), docwatch::Error> {
/// # let db = Arc::new(MockDatabase::new("db"));
/// let container = SubscriptionContainer::new(db);
/// let subscription = container.register(TailingRequest::new(
///     |message: Message<Document, Document>| println!("{message:?}"),
///     TailingOptions::builder().collection("events").build(),
/// ))?;
/// container.start();
/// // ... later
/// container.stop();
/// # Ok(()) }
/// ```
pub struct SubscriptionContainer {
    db: Arc<dyn DatabaseClient>,
    config: PollingConfig,
    translator: Arc<dyn ErrorTranslator>,
    error_handler: Arc<dyn ErrorHandler>,
    factory: TaskFactory,
    runtime: tokio::runtime::Handle,
    phase: i32,
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl SubscriptionContainer {
    /// Creates a container with default polling intervals, a logging error
    /// handler, and no error translation.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; the container spawns its
    /// workers on the runtime it was created in.
    #[must_use]
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        let config = PollingConfig::default();
        let translator: Arc<dyn ErrorTranslator> = Arc::new(NoErrorTranslation);
        let factory = TaskFactory::new(Arc::clone(&db), config, Arc::clone(&translator));
        Self {
            db,
            config,
            translator,
            error_handler: Arc::new(LoggingErrorHandler),
            factory,
            runtime: tokio::runtime::Handle::current(),
            phase: DEFAULT_PHASE,
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                running: false,
                registrations: Vec::new(),
            }),
        }
    }

    /// Replaces the polling configuration.
    #[must_use]
    pub fn with_config(mut self, config: PollingConfig) -> Self {
        self.config = config;
        self.rebuild_factory();
        self
    }

    /// Replaces the error handler receiving task errors.
    #[must_use]
    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Replaces the driver-error translator.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn ErrorTranslator>) -> Self {
        self.translator = translator;
        self.rebuild_factory();
        self
    }

    fn rebuild_factory(&mut self) {
        self.factory =
            TaskFactory::new(Arc::clone(&self.db), self.config, Arc::clone(&self.translator));
    }

    /// Registers a subscription request.
    ///
    /// The registration is retained until [`remove`](Self::remove)d,
    /// surviving stop/start cycles. When the container is already running,
    /// the subscription's task is submitted to a worker immediately;
    /// otherwise it is submitted by the next [`start`](Self::start).
    ///
    /// Registering the same logical request twice yields two independent
    /// subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the request is invalid.
    pub fn register<T, R>(&self, request: R) -> Result<Arc<Subscription>, Error>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        R: Into<SubscriptionRequest<T>>,
    {
        let request = request.into();
        let task = self
            .factory
            .create(&request, Arc::clone(&self.error_handler))?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription::new(id, Arc::clone(&task)));

        let rebuild = {
            let factory = self.factory.clone();
            let error_handler = Arc::clone(&self.error_handler);
            Box::new(move || factory.create(&request, Arc::clone(&error_handler)))
                as Box<dyn Fn() -> Result<Arc<dyn Task>, Error> + Send + Sync>
        };

        let mut inner = self.inner.lock();
        inner.registrations.push(Registration {
            subscription: Arc::clone(&subscription),
            rebuild,
        });
        if inner.running {
            self.submit(task);
        }
        tracing::debug!(%id, "subscription registered");
        Ok(subscription)
    }

    /// Cancels a subscription, if active, and drops its registration.
    /// Removed subscriptions do not come back on the next start.
    pub fn remove(&self, subscription: &Subscription) {
        let mut inner = self.inner.lock();
        if let Some(index) = inner
            .registrations
            .iter()
            .position(|registration| registration.subscription.id() == subscription.id())
        {
            let registration = inner.registrations.remove(index);
            if registration.subscription.is_active() {
                registration.subscription.cancel();
            }
            tracing::debug!(id = %subscription.id(), "subscription removed");
        }
    }

    /// Starts the container: every registered subscription that is not
    /// already active gets a worker. Tasks left terminal by a previous stop
    /// are rebuilt from their retained requests.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.running {
            return;
        }

        for registration in &inner.registrations {
            let subscription = &registration.subscription;
            if subscription.is_active() {
                continue;
            }

            let task = if subscription.task_state() == TaskState::Cancelled {
                match (registration.rebuild)() {
                    Ok(task) => {
                        subscription.replace_task(Arc::clone(&task));
                        task
                    }
                    Err(error) => {
                        self.error_handler.handle(error);
                        continue;
                    }
                }
            } else {
                subscription.current_task()
            };
            self.submit(task);
        }

        inner.running = true;
        tracing::debug!(database = self.db.database_name(), "container started");
    }

    /// Stops the container, cancelling every registered subscription.
    /// Registrations are retained for a later start.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        Self::stop_locked(&mut inner);
    }

    /// Stops the container and runs `on_done` once every subscription has
    /// been cancelled, still under the lifecycle lock.
    pub fn stop_with(&self, on_done: impl FnOnce()) {
        let mut inner = self.inner.lock();
        Self::stop_locked(&mut inner);
        on_done();
    }

    fn stop_locked(inner: &mut Inner) {
        if inner.running {
            for registration in &inner.registrations {
                registration.subscription.cancel();
            }
            inner.running = false;
            tracing::debug!("container stopped");
        }
    }

    /// Whether the container has been started and not yet stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// Containers never start themselves; the host decides when.
    #[must_use]
    pub fn is_auto_startup(&self) -> bool {
        false
    }

    /// Ordering hint for external lifecycle frameworks: start last, stop
    /// first.
    #[must_use]
    pub fn phase(&self) -> i32 {
        self.phase
    }

    /// Number of retained registrations.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().registrations.len()
    }

    fn submit(&self, task: Arc<dyn Task>) {
        self.runtime.spawn(task.run());
    }
}

impl std::fmt::Debug for SubscriptionContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionContainer")
            .field("database", &self.db.database_name())
            .field("running", &self.is_running())
            .field("subscriptions", &self.subscription_count())
            .finish_non_exhaustive()
    }
}
