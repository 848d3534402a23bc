//! Core task queue: submission, scheduling, and the task lifecycle
//!
//! [`TaskQueue`] accepts deferred units of work and admits them under the
//! joint constraint of a concurrency cap and an interval rate limiter.
//! Admissions follow priority order (ties broken by insertion order); a
//! task that has started is never interrupted by the scheduler, only raced
//! against its timeout and cancel token.

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::event::{events, EventEmitter, EventPayload, EventStream, QueueEvent};
use crate::pqueue::{
    PriorityWaitingQueue, TaskFilter, TaskId, TaskRecord, TaskSnapshot, WaitingQueue,
};
use crate::ratelimit::IntervalLimiter;
use crate::QueueStats;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Broadcast capacity for lifecycle events
const EVENT_CAPACITY: usize = 256;

/// Task to be executed
#[async_trait]
pub trait Task: Send + Sync {
    /// Execute the task. The token trips when the submitter cancels; a task
    /// that wants to stop early should watch it, the scheduler only uses it
    /// to settle the submitter's result.
    async fn run(&self, cancel: CancellationToken) -> Result<serde_json::Value>;

    /// Get task type (for logging/debugging)
    fn task_type(&self) -> &str {
        "task"
    }
}

type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

/// Adapter turning an async closure into a [`Task`].
///
/// ```rust,ignore
/// let task = FnTask::new(|_cancel| async { Ok(serde_json::json!(42)) });
/// let rx = queue.add(Box::new(task)).await;
/// ```
pub struct FnTask {
    f: Box<dyn Fn(CancellationToken) -> BoxTaskFuture + Send + Sync>,
}

impl FnTask {
    /// Wrap a closure producing the task's future
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            f: Box::new(move |cancel| Box::pin(f(cancel))),
        }
    }
}

#[async_trait]
impl Task for FnTask {
    async fn run(&self, cancel: CancellationToken) -> Result<serde_json::Value> {
        (self.f)(cancel).await
    }

    fn task_type(&self) -> &str {
        "fn"
    }
}

/// Per-task submission options
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Scheduling priority; higher runs earlier (default 0)
    pub priority: i32,
    /// Stable identifier; auto-assigned when absent
    pub id: Option<String>,
    /// Per-task timeout, overriding the queue default
    pub timeout: Option<Duration>,
    /// External cancel token
    pub cancel: Option<CancellationToken>,
}

impl TaskOptions {
    /// Set the scheduling priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the task id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the per-task timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancel token
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Receives the submitter-facing outcome of a task
pub type TaskReceiver = oneshot::Receiver<Result<serde_json::Value>>;

/// Snapshot of a task currently executing
#[derive(Debug, Clone, Serialize)]
pub struct RunningTaskInfo {
    pub id: TaskId,
    pub priority: i32,
    pub started_at: chrono::DateTime<Utc>,
    pub timeout: Option<Duration>,
}

/// Factory producing waiting-queue instances; `clear` swaps in a fresh one
pub type QueueFactory = Box<dyn Fn() -> Box<dyn WaitingQueue> + Send + Sync>;

/// Queue state guarded by a single lock
struct State {
    waiting: Box<dyn WaitingQueue>,
    limiter: IntervalLimiter,
    pending: usize,
    paused: bool,
    concurrency: usize,
    default_timeout: Option<Duration>,
    auto_id: u64,
    insert_seq: u64,
    run_seq: u64,
    running: HashMap<u64, RunningTaskInfo>,
    window_timer: Option<JoinHandle<()>>,
    resume_timer: Option<JoinHandle<()>>,
    /// Last observed value of the rate-limit predicate, for transition events
    rate_limited: bool,
}

struct QueueCore {
    state: Mutex<State>,
    emitter: EventEmitter,
    factory: QueueFactory,
    interval: Duration,
}

/// Priority task queue with concurrency control and interval rate limiting.
///
/// Cheap to clone; clones share the same queue. All state lives behind one
/// lock, and every mutation re-runs the scheduler, so admissions happen as
/// soon as the constraints permit.
#[derive(Clone)]
pub struct TaskQueue {
    core: Arc<QueueCore>,
}

impl TaskQueue {
    /// Create a queue with the default priority-ordered container
    pub fn new(config: QueueConfig) -> Result<Self> {
        Self::with_queue_factory(
            config,
            Box::new(|| Box::new(PriorityWaitingQueue::new()) as Box<dyn WaitingQueue>),
        )
    }

    /// Create a queue backed by a custom [`WaitingQueue`] implementation.
    ///
    /// The factory is also invoked by [`clear`](TaskQueue::clear) to produce
    /// the replacement container.
    pub fn with_queue_factory(config: QueueConfig, factory: QueueFactory) -> Result<Self> {
        config.validate()?;
        let state = State {
            waiting: factory(),
            limiter: IntervalLimiter::new(&config),
            pending: 0,
            paused: !config.auto_start,
            concurrency: config.concurrency,
            default_timeout: config.timeout,
            auto_id: 0,
            insert_seq: 0,
            run_seq: 0,
            running: HashMap::new(),
            window_timer: None,
            resume_timer: None,
            rate_limited: false,
        };
        Ok(Self {
            core: Arc::new(QueueCore {
                state: Mutex::new(state),
                emitter: EventEmitter::new(EVENT_CAPACITY),
                factory,
                interval: config.interval,
            }),
        })
    }

    // ── Submission ─────────────────────────────────────────────────────────

    /// Submit a task with default options
    pub async fn add(&self, task: Box<dyn Task>) -> TaskReceiver {
        self.add_with(task, TaskOptions::default()).await
    }

    /// Submit a task.
    ///
    /// Returns a receiver that settles exactly once with the task's value or
    /// error. Dropping the receiver does not cancel the task; clearing the
    /// queue before admission drops the sender, closing the channel.
    pub async fn add_with(&self, task: Box<dyn Task>, options: TaskOptions) -> TaskReceiver {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.core.state.lock().await;
            let id = match options.id {
                Some(s) => TaskId::User(s),
                None => {
                    state.auto_id += 1;
                    TaskId::Auto(state.auto_id)
                }
            };
            let seq = state.insert_seq;
            state.insert_seq += 1;
            let record = TaskRecord {
                task: Arc::from(task),
                id: id.clone(),
                priority: options.priority,
                timeout: options.timeout.or(state.default_timeout),
                cancel: options.cancel,
                result_tx: Some(tx),
                seq,
            };
            debug!(id = %id, priority = options.priority, "task added");
            state.waiting.enqueue(record);
            self.core.emitter.emit(QueueEvent::with_map(
                events::QUEUE_TASK_ADDED,
                HashMap::from([
                    ("id".to_string(), serde_json::json!(id.to_string())),
                    ("priority".to_string(), serde_json::json!(options.priority)),
                ]),
            ));
            self.update_rate_observable(&mut state);
        }
        self.drain().await;
        rx
    }

    /// Submit several tasks with default options; receivers are returned in
    /// submission order
    pub async fn add_all(&self, tasks: Vec<Box<dyn Task>>) -> Vec<TaskReceiver> {
        self.add_all_with(tasks, TaskOptions::default()).await
    }

    /// Submit several tasks sharing the same options
    pub async fn add_all_with(
        &self,
        tasks: Vec<Box<dyn Task>>,
        options: TaskOptions,
    ) -> Vec<TaskReceiver> {
        let mut receivers = Vec::with_capacity(tasks.len());
        for task in tasks {
            receivers.push(self.add_with(task, options.clone()).await);
        }
        receivers
    }

    // ── Scheduler ──────────────────────────────────────────────────────────

    /// Admit ready tasks until no further progress is possible
    async fn drain(&self) {
        loop {
            let mut state = self.core.state.lock().await;
            let progressed = self.try_to_start_another(&mut state);
            drop(state);
            if !progressed {
                break;
            }
        }
    }

    /// One scheduling step. Returns true when a task was admitted (or
    /// settled pre-start), telling the drain loop to keep going.
    fn try_to_start_another(&self, state: &mut State) -> bool {
        if state.waiting.size() == 0 {
            if let Some(timer) = state.window_timer.take() {
                timer.abort();
            }
            self.core.emitter.emit(QueueEvent::empty(events::QUEUE_EMPTY));
            if state.pending == 0 {
                if let Some(timer) = state.resume_timer.take() {
                    timer.abort();
                }
                state.limiter.compact(Instant::now());
                self.core.emitter.emit(QueueEvent::empty(events::QUEUE_IDLE));
            }
            return false;
        }
        if state.paused {
            return false;
        }

        let now = Instant::now();
        let window_timer_active = state.window_timer.is_some();
        if let Some(delay) = state.limiter.paused_until(now, window_timer_active, state.pending) {
            self.arm_resume_timer(state, delay);
            return false;
        }
        if state.limiter.allows_another(now) && state.pending < state.concurrency {
            let Some(record) = state.waiting.dequeue() else {
                return false;
            };
            // A token that tripped while the task waited never becomes an
            // admission: nothing is consumed from the rate limiter and no
            // window timer arms. The drain loop moves on to the next record.
            if record.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                self.reject_before_start(state, record);
                return true;
            }
            if !state.limiter.is_ignored() {
                state.limiter.consume(now);
            }
            self.core.emitter.emit(QueueEvent::with_map(
                events::QUEUE_TASK_ACTIVE,
                HashMap::from([("id".to_string(), serde_json::json!(record.id().to_string()))]),
            ));
            self.run_task(state, record);
            self.init_window_timer(state, now);
            self.update_rate_observable(state);
            return true;
        }
        false
    }

    /// Settle a task whose cancel token tripped before admission. Runs
    /// inline in the drain loop, so mass cancellations stay a flat
    /// iteration.
    fn reject_before_start(&self, state: &mut State, mut record: TaskRecord) {
        let err = QueueError::Cancelled("task cancelled before start".to_string());
        if let Some(tx) = record.result_tx.take() {
            let _ = tx.send(Err(err.clone()));
        }
        self.core
            .emitter
            .emit(QueueEvent::with_error(events::QUEUE_TASK_ERROR, err));
        self.core.emitter.emit(QueueEvent::empty(events::QUEUE_NEXT));
        if state.pending == 0 {
            self.core
                .emitter
                .emit(QueueEvent::empty(events::QUEUE_PENDING_ZERO));
        }
        self.update_rate_observable(state);
    }

    /// Start an admitted task: bookkeeping, then the spawned execution with
    /// timeout and cancel races
    fn run_task(&self, state: &mut State, mut record: TaskRecord) {
        let handle = state.run_seq;
        state.run_seq += 1;
        state.pending += 1;
        state.running.insert(
            handle,
            RunningTaskInfo {
                id: record.id.clone(),
                priority: record.priority,
                started_at: Utc::now(),
                timeout: record.timeout,
            },
        );

        let queue = self.clone();
        let task = Arc::clone(&record.task);
        let cancel = record.cancel.clone();
        let timeout = record.timeout;
        let mut result_tx = record.result_tx.take();
        tokio::spawn(async move {
            let result = Self::execute_guarded(task, cancel, timeout).await;
            match &result {
                Ok(value) => queue.core.emitter.emit(QueueEvent::with_value(
                    events::QUEUE_TASK_COMPLETED,
                    value.clone(),
                )),
                Err(err) => queue
                    .core
                    .emitter
                    .emit(QueueEvent::with_error(events::QUEUE_TASK_ERROR, err.clone())),
            }
            if let Some(tx) = result_tx.take() {
                let _ = tx.send(result);
            }
            queue.finish_task(handle).await;
        });
    }

    /// Run the task on its own spawn, racing the timeout deadline and the
    /// cancel token against its completion. A fired deadline or tripped
    /// token only abandons the result; the task itself keeps running to
    /// completion in the background.
    async fn execute_guarded(
        task: Arc<dyn Task>,
        cancel: Option<CancellationToken>,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value> {
        let token = cancel.clone().unwrap_or_default();
        let mut join = tokio::spawn(async move { task.run(token).await });
        let bounded = async {
            match timeout {
                Some(deadline) => match tokio::time::timeout(deadline, &mut join).await {
                    Ok(joined) => Self::join_outcome(joined),
                    Err(_) => Err(QueueError::Timeout(deadline)),
                },
                None => Self::join_outcome((&mut join).await),
            }
        };
        match cancel {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => {
                        Err(QueueError::Cancelled("task cancelled".to_string()))
                    }
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }

    /// A panicked task surfaces as a task failure instead of killing the
    /// runner and leaking the pending slot
    fn join_outcome(
        joined: std::result::Result<Result<serde_json::Value>, tokio::task::JoinError>,
    ) -> Result<serde_json::Value> {
        match joined {
            Ok(result) => result,
            Err(join_err) => Err(QueueError::Task(format!("task panicked: {join_err}"))),
        }
    }

    /// Finalisation: runs in the task's own spawned context, so scheduler
    /// re-entry never deepens the submitter's stack
    async fn finish_task(&self, handle: u64) {
        {
            let mut state = self.core.state.lock().await;
            state.running.remove(&handle);
            state.pending -= 1;
            self.core.emitter.emit(QueueEvent::empty(events::QUEUE_NEXT));
            if state.pending == 0 {
                self.core
                    .emitter
                    .emit(QueueEvent::empty(events::QUEUE_PENDING_ZERO));
            }
            self.update_rate_observable(&mut state);
        }
        self.drain().await;
    }

    // ── Timers ─────────────────────────────────────────────────────────────

    /// One-shot wake-up at the earliest admissible instant
    fn arm_resume_timer(&self, state: &mut State, delay: Duration) {
        if state.resume_timer.is_some() {
            return;
        }
        debug!(?delay, "rate limited; arming resume timer");
        let weak = Arc::downgrade(&self.core);
        state.resume_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(core) = weak.upgrade() {
                let queue = TaskQueue { core };
                {
                    let mut state = queue.core.state.lock().await;
                    state.resume_timer = None;
                }
                queue.drain().await;
            }
        }));
    }

    /// Recurring window-boundary wake-up (fixed-window mode only)
    fn init_window_timer(&self, state: &mut State, now: Instant) {
        if state.limiter.is_ignored() || !state.limiter.is_fixed() || state.window_timer.is_some()
        {
            return;
        }
        state.limiter.window_started(now);
        let weak = Arc::downgrade(&self.core);
        let interval = self.core.interval;
        state.window_timer = Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else { break };
                if !(TaskQueue { core }.on_window_tick().await) {
                    break;
                }
            }
        }));
    }

    /// A window boundary elapsed: reset the admission count and re-drain.
    /// Returns false when the timer should stop (nothing admitted, nothing
    /// running).
    async fn on_window_tick(&self) -> bool {
        let keep_running;
        {
            let mut state = self.core.state.lock().await;
            let now = Instant::now();
            keep_running = !(state.limiter.admitted(now) == 0 && state.pending == 0);
            if !keep_running {
                // Dropping our own handle; the loop exits via the return
                state.window_timer = None;
            }
            let pending = state.pending;
            state.limiter.on_window_boundary(now, pending);
            self.update_rate_observable(&mut state);
        }
        self.drain().await;
        keep_running
    }

    // ── Rate-limit observable ──────────────────────────────────────────────

    fn compute_rate_limited(state: &mut State) -> bool {
        !state.limiter.is_ignored()
            && state.waiting.size() > 0
            && state.limiter.admitted(Instant::now()) >= state.limiter.cap()
    }

    /// Re-evaluate the rate-limit predicate; emit only on transitions
    fn update_rate_observable(&self, state: &mut State) {
        let limited = Self::compute_rate_limited(state);
        if limited != state.rate_limited {
            state.rate_limited = limited;
            self.core.emitter.emit(QueueEvent::empty(if limited {
                events::QUEUE_RATE_LIMITED
            } else {
                events::QUEUE_RATE_CLEARED
            }));
        }
    }

    // ── Control ────────────────────────────────────────────────────────────

    /// Stop admitting tasks; running tasks are unaffected. Idempotent.
    pub async fn pause(&self) {
        let mut state = self.core.state.lock().await;
        if !state.paused {
            state.paused = true;
            debug!("queue paused");
        }
    }

    /// Resume admissions. Idempotent.
    pub async fn start(&self) {
        {
            let mut state = self.core.state.lock().await;
            if !state.paused {
                return;
            }
            state.paused = false;
            debug!("queue started");
        }
        self.drain().await;
    }

    /// Discard all waiting tasks.
    ///
    /// Running tasks are untouched, and strict-mode admission history is
    /// preserved because it reflects real admissions. Dropped tasks' result
    /// channels close without a value.
    pub async fn clear(&self) {
        let mut state = self.core.state.lock().await;
        state.waiting = (self.core.factory)();
        if let Some(timer) = state.window_timer.take() {
            timer.abort();
        }
        debug!("queue cleared");
        self.update_rate_observable(&mut state);
        self.core.emitter.emit(QueueEvent::empty(events::QUEUE_EMPTY));
        if state.pending == 0 {
            if let Some(timer) = state.resume_timer.take() {
                timer.abort();
            }
            self.core.emitter.emit(QueueEvent::empty(events::QUEUE_IDLE));
        }
        self.core.emitter.emit(QueueEvent::empty(events::QUEUE_NEXT));
    }

    /// Re-prioritize a waiting task by its user-supplied id.
    ///
    /// Running tasks are unaffected; an id not currently waiting yields
    /// [`QueueError::NotFound`].
    pub async fn set_priority(&self, id: &str, priority: i32) -> Result<()> {
        let mut state = self.core.state.lock().await;
        state.waiting.set_priority(id, priority)
    }

    // ── Settings ───────────────────────────────────────────────────────────

    /// Current concurrency limit
    pub async fn concurrency(&self) -> usize {
        self.core.state.lock().await.concurrency
    }

    /// Change the concurrency limit and re-drain. Lowering it never
    /// interrupts already-running tasks.
    pub async fn set_concurrency(&self, concurrency: usize) -> Result<()> {
        if concurrency < 1 {
            return Err(QueueError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        {
            let mut state = self.core.state.lock().await;
            state.concurrency = concurrency;
        }
        self.drain().await;
        Ok(())
    }

    /// Current default per-task timeout
    pub async fn default_timeout(&self) -> Option<Duration> {
        self.core.state.lock().await.default_timeout
    }

    /// Change the default per-task timeout; applies to tasks submitted
    /// afterwards
    pub async fn set_default_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        if let Some(t) = timeout {
            if t.is_zero() {
                return Err(QueueError::Config("timeout must be positive".to_string()));
            }
        }
        self.core.state.lock().await.default_timeout = timeout;
        Ok(())
    }

    // ── Introspection ──────────────────────────────────────────────────────

    /// Number of tasks waiting (not yet admitted)
    pub async fn size(&self) -> usize {
        self.core.state.lock().await.waiting.size()
    }

    /// Number of waiting tasks matching the filter
    pub async fn size_by(&self, filter: &TaskFilter) -> usize {
        self.core.state.lock().await.waiting.filter(filter).len()
    }

    /// Metadata of waiting tasks matching the filter
    pub async fn waiting_tasks(&self, filter: &TaskFilter) -> Vec<TaskSnapshot> {
        self.core.state.lock().await.waiting.filter(filter)
    }

    /// Number of tasks currently executing
    pub async fn pending(&self) -> usize {
        self.core.state.lock().await.pending
    }

    /// Whether admissions are suspended
    pub async fn is_paused(&self) -> bool {
        self.core.state.lock().await.paused
    }

    /// Whether waiting tasks exist that the rate limiter would deny now
    pub async fn is_rate_limited(&self) -> bool {
        let mut state = self.core.state.lock().await;
        Self::compute_rate_limited(&mut state)
    }

    /// Whether the queue can make no progress: every concurrency slot taken
    /// or rate-limited, with tasks waiting either way
    pub async fn is_saturated(&self) -> bool {
        let mut state = self.core.state.lock().await;
        let size = state.waiting.size();
        (state.pending == state.concurrency && size > 0)
            || (Self::compute_rate_limited(&mut state) && size > 0)
    }

    /// Snapshot of the tasks currently executing
    pub async fn running_tasks(&self) -> Vec<RunningTaskInfo> {
        self.core
            .state
            .lock()
            .await
            .running
            .values()
            .cloned()
            .collect()
    }

    /// Counters snapshot
    pub async fn stats(&self) -> QueueStats {
        let mut state = self.core.state.lock().await;
        QueueStats {
            size: state.waiting.size(),
            pending: state.pending,
            paused: state.paused,
            rate_limited: Self::compute_rate_limited(&mut state),
        }
    }

    // ── Events ─────────────────────────────────────────────────────────────

    /// Subscribe to all lifecycle events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<QueueEvent> {
        self.core.emitter.subscribe()
    }

    /// Subscribe to all lifecycle events as an `EventStream`
    pub fn subscribe_stream(&self) -> EventStream {
        self.core.emitter.subscribe_stream()
    }

    /// Subscribe to filtered lifecycle events as an `EventStream`
    pub fn subscribe_filtered(
        &self,
        filter: impl Fn(&QueueEvent) -> bool + Send + Sync + 'static,
    ) -> EventStream {
        self.core.emitter.subscribe_filtered(filter)
    }

    // ── Waiters ────────────────────────────────────────────────────────────

    /// Resolves once no tasks are waiting (immediately if already true)
    pub async fn on_empty(&self) {
        let mut rx = self.core.emitter.subscribe();
        if self.size().await == 0 {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.key == events::QUEUE_EMPTY => return,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if self.size().await == 0 {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Resolves once no tasks are waiting or running (immediately if
    /// already true)
    pub async fn on_idle(&self) {
        let mut rx = self.core.emitter.subscribe();
        {
            let state = self.core.state.lock().await;
            if state.waiting.size() == 0 && state.pending == 0 {
                return;
            }
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.key == events::QUEUE_IDLE => return,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    let state = self.core.state.lock().await;
                    if state.waiting.size() == 0 && state.pending == 0 {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Resolves once no tasks are running, regardless of the waiting count
    pub async fn on_pending_zero(&self) {
        let mut rx = self.core.emitter.subscribe();
        if self.pending().await == 0 {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.key == events::QUEUE_PENDING_ZERO => return,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if self.pending().await == 0 {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Resolves once fewer than `limit` tasks are waiting; re-checked on
    /// every `next` event
    pub async fn on_size_less_than(&self, limit: usize) {
        let mut rx = self.core.emitter.subscribe();
        if self.size().await < limit {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.key == events::QUEUE_NEXT => {
                    if self.size().await < limit {
                        return;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if self.size().await < limit {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Resolves once the queue is rate-limited (immediately if already so)
    pub async fn on_rate_limit(&self) {
        let mut rx = self.core.emitter.subscribe();
        if self.is_rate_limited().await {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.key == events::QUEUE_RATE_LIMITED => return,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if self.is_rate_limited().await {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Resolves once the queue is not rate-limited (immediately if already
    /// so)
    pub async fn on_rate_limit_cleared(&self) {
        let mut rx = self.core.emitter.subscribe();
        if !self.is_rate_limited().await {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.key == events::QUEUE_RATE_CLEARED => return,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if !self.is_rate_limited().await {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Returns the first subsequent task error without consuming it from
    /// other subscribers. One-shot: call again to wait for the next error.
    ///
    /// Unawaited [`add`](TaskQueue::add) receivers still carry their own
    /// rejection and must be handled independently.
    pub async fn on_error(&self) -> QueueError {
        let mut rx = self.core.emitter.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) if event.key == events::QUEUE_TASK_ERROR => {
                    if let EventPayload::Error(err) = event.payload {
                        return err;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    return QueueError::Task("event channel closed".to_string())
                }
            }
        }
    }
}
