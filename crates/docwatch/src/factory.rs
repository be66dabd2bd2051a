//! Task creation from subscription requests.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::change_stream::ChangeStreamStrategy;
use crate::config::PollingConfig;
use crate::driver::DatabaseClient;
use crate::error::{Error, ErrorHandler, ErrorTranslator};
use crate::request::SubscriptionRequest;
use crate::tailing::TailingStrategy;
use crate::task::{CursorTask, Task};

/// Builds the matching [`Task`] for a [`SubscriptionRequest`].
#[derive(Clone)]
pub struct TaskFactory {
    db: Arc<dyn DatabaseClient>,
    config: PollingConfig,
    translator: Arc<dyn ErrorTranslator>,
}

impl TaskFactory {
    /// Creates a factory producing tasks against the given database.
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        config: PollingConfig,
        translator: Arc<dyn ErrorTranslator>,
    ) -> Self {
        Self {
            db,
            config,
            translator,
        }
    }

    /// Creates a task for the request, dispatching on the request kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the request names no
    /// collection.
    pub fn create<T>(
        &self,
        request: &SubscriptionRequest<T>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Result<Arc<dyn Task>, Error>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        if request.collection_name().is_empty() {
            return Err(Error::Configuration(
                "subscription request names no collection".into(),
            ));
        }

        Ok(match request {
            SubscriptionRequest::ChangeStream(request) => Arc::new(CursorTask::new(
                ChangeStreamStrategy::new(request),
                Arc::clone(&self.db),
                self.config,
                error_handler,
                Arc::clone(&self.translator),
            )),
            SubscriptionRequest::Tailing(request) => Arc::new(CursorTask::new(
                TailingStrategy::new(request),
                Arc::clone(&self.db),
                self.config,
                error_handler,
                Arc::clone(&self.translator),
            )),
        })
    }
}

impl std::fmt::Debug for TaskFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFactory")
            .field("database", &self.db.database_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
