//! Error types and the pluggable error policy seam.
//!
//! Two layers of errors:
//! - [`DriverError`]: failures reported by the database driver behind the
//!   [`DatabaseClient`](crate::driver::DatabaseClient) seam.
//! - [`Error`]: the domain-level hierarchy surfaced to callers and to the
//!   [`ErrorHandler`].
//!
//! Tasks never decide error policy themselves: driver errors are passed
//! through the [`ErrorTranslator`] and handed to the [`ErrorHandler`], and
//! the cursor loop keeps polling.

use thiserror::Error;

/// Errors reported by the database driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Failed to reach the server or open a connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server-side cursor was killed or has expired.
    #[error("cursor no longer available: {0}")]
    CursorKilled(String),

    /// A server command failed.
    #[error("command failed (code {code}): {message}")]
    Command {
        /// Server error code.
        code: i32,
        /// Server error message.
        message: String,
    },

    /// An I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A driver failure that does not fit other categories.
    #[error("driver error: {0}")]
    Internal(String),
}

/// Errors surfaced by the subscription container and its tasks.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid subscription configuration, detected at registration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation was attempted in the wrong lifecycle state.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// The expected state.
        expected: String,
        /// The actual state.
        actual: String,
    },

    /// A message body could not be converted into the target type.
    #[error("no conversion from {from} to {to}: {message}")]
    Conversion {
        /// Runtime type of the underlying body.
        from: String,
        /// Requested target type.
        to: String,
        /// Details from the converter.
        message: String,
    },

    /// A driver error that was not translated into a domain error.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A listener callback panicked while handling a message.
    #[error("listener failed: {0}")]
    Listener(String),
}

/// Terminal receiver for errors raised inside a running task.
///
/// The task loop itself never cancels on error; whether an error is logged,
/// rethrown out-of-band, or answered with a cancellation through a side
/// channel is up to the handler.
pub trait ErrorHandler: Send + Sync {
    /// Handles an error raised by a subscription task.
    fn handle(&self, error: Error);
}

/// Optional conversion of driver errors into the domain hierarchy.
///
/// Returning `None` means "no translation"; the task then wraps the driver
/// error as [`Error::Driver`] before handing it to the [`ErrorHandler`].
pub trait ErrorTranslator: Send + Sync {
    /// Translates a driver error, if a domain-level equivalent exists.
    fn translate(&self, error: &DriverError) -> Option<Error>;
}

/// Default translator that performs no translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoErrorTranslation;

impl ErrorTranslator for NoErrorTranslation {
    fn translate(&self, _error: &DriverError) -> Option<Error> {
        None
    }
}

/// Default [`ErrorHandler`] that logs and continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn handle(&self, error: Error) {
        tracing::error!("subscription task error: {error}");
    }
}
