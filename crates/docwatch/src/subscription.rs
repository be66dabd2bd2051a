//! Subscription handles.
//!
//! A [`Subscription`] is the caller-facing handle for one registration: it
//! exposes whether the backing task is running and allows cancellation. The
//! container may swap the backing task across stop/start cycles (cancelled
//! tasks are terminal); the handle always reflects the current one.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::metrics::TaskMetricsSnapshot;
use crate::task::{Task, TaskState};

/// Unique subscription identifier, assigned by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle to a registered subscription.
pub struct Subscription {
    id: SubscriptionId,
    task: Mutex<Arc<dyn Task>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, task: Arc<dyn Task>) -> Self {
        Self {
            id,
            task: Mutex::new(task),
        }
    }

    /// The subscription's identifier.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the backing task is currently running.
    ///
    /// `false` while the task is still starting up, after cancellation, and
    /// before the container has been started.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.lock().state() == TaskState::Running
    }

    /// Cancels the backing task. Its cursor is released and no further
    /// messages are delivered.
    pub fn cancel(&self) {
        self.task.lock().cancel();
    }

    /// Delivery counters of the backing task.
    #[must_use]
    pub fn metrics(&self) -> TaskMetricsSnapshot {
        self.task.lock().metrics()
    }

    pub(crate) fn task_state(&self) -> TaskState {
        self.task.lock().state()
    }

    pub(crate) fn current_task(&self) -> Arc<dyn Task> {
        Arc::clone(&self.task.lock())
    }

    pub(crate) fn replace_task(&self, task: Arc<dyn Task>) {
        *self.task.lock() = task;
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &self.task_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::TaskMetricsSnapshot;
    use async_trait::async_trait;
    use parking_lot::Mutex as PlMutex;

    struct StubTask {
        state: PlMutex<TaskState>,
    }

    impl StubTask {
        fn with_state(state: TaskState) -> Arc<Self> {
            Arc::new(Self {
                state: PlMutex::new(state),
            })
        }
    }

    #[async_trait]
    impl Task for StubTask {
        async fn run(self: Arc<Self>) {}

        fn cancel(&self) {
            let mut state = self.state.lock();
            if matches!(*state, TaskState::Starting | TaskState::Running) {
                *state = TaskState::Cancelled;
            }
        }

        fn state(&self) -> TaskState {
            *self.state.lock()
        }

        fn metrics(&self) -> TaskMetricsSnapshot {
            TaskMetricsSnapshot::default()
        }
    }

    #[test]
    fn test_active_iff_task_running() {
        let subscription =
            Subscription::new(SubscriptionId(1), StubTask::with_state(TaskState::Created));
        assert!(!subscription.is_active());

        subscription.replace_task(StubTask::with_state(TaskState::Running));
        assert!(subscription.is_active());

        subscription.cancel();
        assert!(!subscription.is_active());
        assert_eq!(subscription.task_state(), TaskState::Cancelled);
    }

    #[test]
    fn test_equality_by_id() {
        let a = Subscription::new(SubscriptionId(1), StubTask::with_state(TaskState::Created));
        let b = Subscription::new(SubscriptionId(1), StubTask::with_state(TaskState::Running));
        let c = Subscription::new(SubscriptionId(2), StubTask::with_state(TaskState::Created));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_subscription_id_display() {
        assert_eq!(SubscriptionId(42).to_string(), "sub-42");
    }
}
