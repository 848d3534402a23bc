//! Waiting-task container: record types and the priority-queue contract
//!
//! The queue keeps waiting tasks ordered by priority descending, insertion
//! order ascending. [`WaitingQueue`] is the customisation point: an
//! alternative container can be supplied through
//! [`TaskQueue::with_queue_factory`](crate::TaskQueue::with_queue_factory)
//! as long as it honours the same ordering contract.

use crate::error::{QueueError, Result};
use crate::queue::Task;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Identifier for a submitted task.
///
/// Auto-assigned ids live in their own namespace, so they can never collide
/// with user-supplied strings. Only user ids are addressable through
/// [`set_priority`](crate::TaskQueue::set_priority).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum TaskId {
    /// Monotonically increasing counter, assigned when no id was supplied
    Auto(u64),
    /// Caller-supplied identifier
    User(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Auto(n) => write!(f, "#{n}"),
            TaskId::User(s) => f.write_str(s),
        }
    }
}

/// A waiting task: the deferred computation plus its scheduling metadata
pub struct TaskRecord {
    pub(crate) task: Arc<dyn Task>,
    pub(crate) id: TaskId,
    pub(crate) priority: i32,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) result_tx: Option<oneshot::Sender<Result<serde_json::Value>>>,
    /// Submission counter; ties between equal priorities break on it
    pub(crate) seq: u64,
}

impl TaskRecord {
    /// Task identifier
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Scheduling priority; higher runs earlier
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Reassign the scheduling priority
    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// Submission order, monotonically increasing per queue
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Metadata snapshot for introspection
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            priority: self.priority,
            timeout: self.timeout,
        }
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Metadata of a waiting task, as returned by [`WaitingQueue::filter`]
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub priority: i32,
    pub timeout: Option<Duration>,
}

/// Predicate options for [`WaitingQueue::filter`] and
/// [`size_by`](crate::TaskQueue::size_by)
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Match tasks with exactly this priority
    pub priority: Option<i32>,
    /// Match tasks with this user-supplied id
    pub id: Option<String>,
}

impl TaskFilter {
    /// Filter by priority
    pub fn by_priority(priority: i32) -> Self {
        Self {
            priority: Some(priority),
            id: None,
        }
    }

    /// Filter by user-supplied id
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            priority: None,
            id: Some(id.into()),
        }
    }

    fn matches(&self, record: &TaskRecord) -> bool {
        if let Some(priority) = self.priority {
            if record.priority != priority {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if record.id != TaskId::User(id.clone()) {
                return false;
            }
        }
        true
    }
}

/// Contract for the waiting-task container.
///
/// Implementations must keep records ordered by priority descending with
/// stable ties (earlier insertions dequeue first), so that `dequeue` always
/// returns the highest-priority, oldest record.
pub trait WaitingQueue: Send {
    /// Insert a record at its ordered position
    fn enqueue(&mut self, record: TaskRecord);

    /// Remove and return the head record
    fn dequeue(&mut self) -> Option<TaskRecord>;

    /// Non-destructive scan returning metadata of matching records
    fn filter(&self, filter: &TaskFilter) -> Vec<TaskSnapshot>;

    /// Re-prioritize the first waiting record with the given user id,
    /// re-inserting it through the same path as `enqueue`
    fn set_priority(&mut self, id: &str, priority: i32) -> Result<()>;

    /// Number of waiting records
    fn size(&self) -> usize;
}

/// Default [`WaitingQueue`]: a flat deque ordered by priority descending,
/// insertion order ascending.
///
/// Appends of already-lowest priorities are O(1); out-of-order inserts find
/// their slot by binary search over the prefix of strictly greater
/// priorities.
#[derive(Default)]
pub struct PriorityWaitingQueue {
    records: VecDeque<TaskRecord>,
}

impl PriorityWaitingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// First index whose priority is strictly less than `priority`
    fn insertion_index(&self, priority: i32) -> usize {
        let mut lo = 0;
        let mut hi = self.records.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.records[mid].priority >= priority {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

impl WaitingQueue for PriorityWaitingQueue {
    fn enqueue(&mut self, record: TaskRecord) {
        match self.records.back() {
            Some(tail) if tail.priority >= record.priority => self.records.push_back(record),
            None => self.records.push_back(record),
            Some(_) => {
                let index = self.insertion_index(record.priority);
                self.records.insert(index, record);
            }
        }
    }

    fn dequeue(&mut self) -> Option<TaskRecord> {
        self.records.pop_front()
    }

    fn filter(&self, filter: &TaskFilter) -> Vec<TaskSnapshot> {
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .map(TaskRecord::snapshot)
            .collect()
    }

    fn set_priority(&mut self, id: &str, priority: i32) -> Result<()> {
        let position = self
            .records
            .iter()
            .position(|r| matches!(&r.id, TaskId::User(s) if s == id))
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        let Some(mut record) = self.records.remove(position) else {
            return Err(QueueError::NotFound(id.to_string()));
        };
        record.set_priority(priority);
        self.enqueue(record);
        Ok(())
    }

    fn size(&self) -> usize {
        self.records.len()
    }
}
