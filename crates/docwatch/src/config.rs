//! Polling configuration for cursor-reading tasks.

use std::time::Duration;

/// Timing configuration shared by all tasks of a container.
///
/// The defaults match the container's delivery contract: an empty poll backs
/// off for 10 ms before the cursor is asked again, and a failed cursor
/// handshake during startup is retried every 100 ms until a healthy cursor
/// is obtained or the task is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Sleep between polls when the cursor returned no document.
    pub poll_interval: Duration,

    /// Sleep between cursor-creation attempts while a task is starting.
    pub startup_retry_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            startup_retry_interval: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_config_default() {
        let config = PollingConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.startup_retry_interval, Duration::from_millis(100));
    }
}
