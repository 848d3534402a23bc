//! # tempoq
//!
//! Priority task queue with concurrency control and interval rate limiting.
//!
//! This library provides an in-process asynchronous task queue: deferred
//! units of work are admitted in priority order under a concurrency cap and
//! an optional interval rate cap, with per-task timeouts, cancellation, and
//! lifecycle events.
//!
//! ## Features
//!
//! - **Priority scheduling**: higher priority runs earlier; ties keep
//!   submission order
//! - **Concurrency control**: bound the number of tasks running at once
//! - **Rate limiting**: fixed-window or strict sliding-window admission caps
//! - **Timeouts and cancellation**: per-task deadlines and external cancel
//!   tokens
//! - **Event system**: subscribe to lifecycle events, or await conditions
//!   (`on_empty`, `on_idle`, `on_rate_limit`, ...)
//! - **Pluggable container**: supply an alternative waiting-queue
//!   implementation through a factory
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tempoq::{FnTask, QueueConfig, TaskQueue};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // At most 2 tasks at once, at most 10 admissions per second
//!     let queue = TaskQueue::new(
//!         QueueConfig::new()
//!             .with_concurrency(2)
//!             .with_rate_limit(10, Duration::from_secs(1)),
//!     )?;
//!
//!     let rx = queue
//!         .add(Box::new(FnTask::new(|_cancel| async {
//!             Ok(serde_json::json!("done"))
//!         })))
//!         .await;
//!
//!     println!("result: {:?}", rx.await??);
//!     queue.on_idle().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Rate-limit modes
//!
//! | Mode | Behaviour |
//! |------|-----------|
//! | fixed window | at most `interval_cap` admissions per window, counted since the last reset |
//! | strict (sliding) | at most `interval_cap` admissions in *every* rolling `interval` |

pub mod config;
pub mod error;
pub mod event;
pub mod pqueue;
pub mod queue;
mod ratelimit;

// Re-export main types
pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use event::{events, EventEmitter, EventKey, EventPayload, EventStream, QueueEvent};
pub use pqueue::{
    PriorityWaitingQueue, TaskFilter, TaskId, TaskRecord, TaskSnapshot, WaitingQueue,
};
pub use queue::{
    FnTask, QueueFactory, RunningTaskInfo, Task, TaskOptions, TaskQueue, TaskReceiver,
};

use serde::{Deserialize, Serialize};

/// Queue counters snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub size: usize,
    pub pending: usize,
    pub paused: bool,
    pub rate_limited: bool,
}
