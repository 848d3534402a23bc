//! Error types for the task queue
//!
//! All errors implement the `std::error::Error` trait via `thiserror::Error`.
//! Task failures surface twice: once through the submitter's result channel
//! and once mirrored on the `queue.task.error` event. Configuration errors
//! and [`QueueError::NotFound`] are returned synchronously from the call that
//! caused them.
//!
//! # Example
//!
//! ```rust,ignore
//! use tempoq::{TaskQueue, QueueError};
//!
//! match queue.set_priority("report-7", 5).await {
//!     Ok(()) => { /* re-prioritized */ },
//!     Err(QueueError::NotFound(id)) => {
//!         eprintln!("no waiting task with id '{}'", id);
//!     },
//!     Err(e) => {
//!         eprintln!("unexpected error: {}", e);
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Task queue error type
///
/// # Variants
///
/// * `Config` - Construction or runtime setter validation failed
/// * `Timeout` - Task exceeded its per-task deadline
/// * `Cancelled` - The task's cancel token tripped
/// * `NotFound` - `set_priority` named an id not currently waiting
/// * `Task` - A failure raised by the user's task, passed through unmodified
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Task timeout
    #[error("task timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Task cancelled
    #[error("task cancelled: {0}")]
    Cancelled(String),

    /// No waiting task with the given id
    #[error("no waiting task with id: {0}")]
    NotFound(String),

    /// Task execution failure
    #[error("{0}")]
    Task(String),
}

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_error() {
        let error = QueueError::Config("concurrency must be at least 1".to_string());
        assert_eq!(
            error.to_string(),
            "configuration error: concurrency must be at least 1"
        );
    }

    #[test]
    fn test_timeout_error() {
        let error = QueueError::Timeout(Duration::from_secs(5));
        assert_eq!(error.to_string(), "task timed out after 5s");
    }

    #[test]
    fn test_cancelled_error() {
        let error = QueueError::Cancelled("task cancelled before start".to_string());
        assert_eq!(
            error.to_string(),
            "task cancelled: task cancelled before start"
        );
    }

    #[test]
    fn test_not_found_error() {
        let error = QueueError::NotFound("report-7".to_string());
        assert_eq!(error.to_string(), "no waiting task with id: report-7");
    }

    #[test]
    fn test_task_error_passthrough() {
        let error = QueueError::Task("disk full".to_string());
        assert_eq!(error.to_string(), "disk full");
    }

    #[test]
    fn test_error_debug() {
        let error = QueueError::NotFound("x".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("NotFound"));
    }

    #[test]
    fn test_error_serialization() {
        let error = QueueError::Timeout(Duration::from_millis(50));
        let json = serde_json::to_string(&error).unwrap();
        let parsed: QueueError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, error);
    }
}
