//! Bounded background task scheduler: thread-per-task with FIFO overflow.
//!
//! One scheduler instance is created, pumped, and shut down by a single
//! owner thread. Every admitted task runs on a dedicated OS thread — never
//! a pool — with at most `limit` running at once; the rest wait in
//! submission order. Workers report over a crossbeam channel, and
//! [`TaskScheduler::pump`] / [`TaskScheduler::run_until_idle`] process
//! those reports **on the owner thread**, so success callbacks and failure
//! handling never race the owner's own state.
//!
//! ```text
//! submit ──► [slot free?] ──yes──► worker thread ──report──► pump ──► callback
//!                │ no                                          │
//!                └─► FIFO queue ◄──────── promote ◄────────────┘
//! ```

pub mod task;
pub mod worker;

pub use task::{TaskEvent, TaskId, TaskStatus};
pub use worker::{emit_warning, WarningCategory};

use crate::config::SchedulerConfig;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::{HashMap, VecDeque};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use worker::{Report, TaskCallback, TaskFn, TaskOutput};

/// Grace period for joining workers that already reported, and for the
/// shutdown drain.
const DEFAULT_JOIN_GRACE: Duration = Duration::from_secs(2);

/// How often `run_until_idle` rechecks for missed wakeups.
const IDLE_POLL: Duration = Duration::from_millis(100);

struct PendingTask {
    id: TaskId,
    name: String,
    job: TaskFn,
}

type FailureHandler = Box<dyn FnMut(TaskId, &str, &str)>;

/// Owner-thread handle to the worker fleet.
pub struct TaskScheduler {
    limit: usize,
    join_grace: Duration,
    queue: VecDeque<PendingTask>,
    running: HashMap<TaskId, JoinHandle<()>>,
    callbacks: HashMap<TaskId, TaskCallback>,
    statuses: HashMap<TaskId, TaskStatus>,
    names: HashMap<TaskId, String>,
    report_tx: Sender<Report>,
    report_rx: Receiver<Report>,
    /// `None` once shut down; the receiver then drains and disconnects.
    event_tx: Option<Sender<TaskEvent>>,
    event_rx: Receiver<TaskEvent>,
    on_failure: FailureHandler,
    shut_down: bool,
}

impl TaskScheduler {
    /// Scheduler bounded by [`TaskScheduler::default_limit`].
    pub fn new() -> Self {
        Self::with_limit(Self::default_limit())
    }

    /// Scheduler bounded by `limit` concurrent workers (floor 1).
    pub fn with_limit(limit: usize) -> Self {
        let (report_tx, report_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        Self {
            limit: limit.max(1),
            join_grace: DEFAULT_JOIN_GRACE,
            queue: VecDeque::new(),
            running: HashMap::new(),
            callbacks: HashMap::new(),
            statuses: HashMap::new(),
            names: HashMap::new(),
            report_tx,
            report_rx,
            event_tx: Some(event_tx),
            event_rx,
            on_failure: Box::new(|id, name, error| {
                tracing::error!("Task {id} '{name}' failed: {error}");
            }),
            shut_down: false,
        }
    }

    /// Scheduler configured from the application config.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let mut scheduler = match config.max_workers {
            Some(limit) => Self::with_limit(limit),
            None => Self::new(),
        };
        scheduler.join_grace = Duration::from_millis(config.join_grace_ms);
        scheduler
    }

    /// Default concurrency bound: one slot per core, minus one for the
    /// owner thread, floor 2.
    pub fn default_limit() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .saturating_sub(1)
            .max(2)
    }

    /// Submit a job. Never blocks: the job either starts on a fresh worker
    /// thread immediately or waits in the FIFO queue.
    ///
    /// `callback` runs on the owner thread (inside [`Self::pump`] or
    /// [`Self::run_until_idle`]) with the job's output, and only when the
    /// job succeeded.
    pub fn submit<T, F, C>(&mut self, name: impl Into<String>, job: F, callback: C) -> TaskId
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let id = TaskId::next();
        let name = name.into();

        if self.shut_down {
            let error = "scheduler is shut down".to_string();
            self.statuses.insert(id, TaskStatus::Failed);
            self.names.insert(id, name.clone());
            (self.on_failure)(id, &name, &error);
            self.emit(TaskEvent::Failed { id, name, error });
            return id;
        }

        let job: TaskFn = Box::new(move || job().map(|value| Box::new(value) as TaskOutput));
        let callback: TaskCallback = Box::new(move |output: TaskOutput| {
            if let Ok(value) = output.downcast::<T>() {
                callback(*value);
            }
        });

        self.names.insert(id, name.clone());
        self.callbacks.insert(id, callback);

        let task = PendingTask { id, name, job };
        if self.running.len() < self.limit {
            self.spawn(task);
        } else {
            self.statuses.insert(id, TaskStatus::Queued);
            let name = task.name.clone();
            self.queue.push_back(task);
            let position = self.queue.len();
            tracing::debug!("Task {id} '{name}' queued at position {position}");
            self.emit(TaskEvent::Queued { id, name, position });
        }
        id
    }

    /// Replace the failure handler (default: `tracing::error!`). Called on
    /// the owner thread with the task id, name, and stringified error.
    pub fn on_failure(&mut self, handler: impl FnMut(TaskId, &str, &str) + 'static) {
        self.on_failure = Box::new(handler);
    }

    /// Drain finished workers without blocking, running callbacks and
    /// promoting queued tasks. Returns the number of reports processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(report) = self.report_rx.try_recv() {
            self.handle_report(report);
            self.promote();
            processed += 1;
        }
        processed
    }

    /// Block until every submitted task has finished and been processed.
    /// Returns the number of reports processed.
    pub fn run_until_idle(&mut self) -> usize {
        let mut processed = self.pump();
        while !self.is_idle() {
            match self.report_rx.recv_timeout(IDLE_POLL) {
                Ok(report) => {
                    self.handle_report(report);
                    self.promote();
                    processed += 1;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        processed
    }

    /// Drop queued tasks, give running workers a bounded grace period to
    /// finish (their reports are still processed), then detach stragglers
    /// and close the event stream. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if !self.queue.is_empty() {
            tracing::warn!("Shutdown dropping {} queued task(s)", self.queue.len());
        }
        let dropped: Vec<PendingTask> = self.queue.drain(..).collect();
        for task in dropped {
            self.statuses.insert(task.id, TaskStatus::Failed);
            self.callbacks.remove(&task.id);
            self.emit(TaskEvent::Failed {
                id: task.id,
                name: task.name,
                error: "dropped at shutdown".to_string(),
            });
        }

        let deadline = Instant::now() + self.join_grace;
        while !self.running.is_empty() {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            match self.report_rx.recv_timeout(remaining) {
                Ok(report) => self.handle_report(report),
                Err(_) => break,
            }
        }

        let stragglers: Vec<TaskId> = self.running.keys().copied().collect();
        for id in stragglers {
            let name = self.names.get(&id).cloned().unwrap_or_default();
            tracing::warn!("Detaching still-running task {id} '{name}' at shutdown");
            self.running.remove(&id);
        }
        self.callbacks.clear();
        self.event_tx = None;
        tracing::info!("Scheduler shut down");
    }

    /// Event receiver for interactive consumers. Drain with `try_iter`;
    /// disconnects after [`Self::shutdown`].
    pub fn events(&self) -> &Receiver<TaskEvent> {
        &self.event_rx
    }

    /// Last observed status of a task.
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.statuses.get(&id).copied()
    }

    /// Number of tasks currently running on worker threads.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Number of tasks waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Concurrency bound.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// True when nothing is running or waiting.
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.queue.is_empty()
    }

    // ── Internals (owner thread only) ──

    fn spawn(&mut self, task: PendingTask) {
        let PendingTask { id, name, job } = task;
        self.statuses.insert(id, TaskStatus::Running);

        let report_tx = self.report_tx.clone();
        let worker_name = name.clone();
        let handle = std::thread::spawn(move || {
            worker::run_job(id, &worker_name, job, &report_tx);
        });
        self.running.insert(id, handle);

        tracing::info!(
            "Task {id} '{name}' started ({} of {} slots in use)",
            self.running.len(),
            self.limit,
        );
        self.emit(TaskEvent::Started { id, name });
    }

    fn promote(&mut self) {
        while self.running.len() < self.limit {
            match self.queue.pop_front() {
                Some(task) => {
                    tracing::debug!("Promoting {} from the queue", task.id);
                    self.spawn(task);
                }
                None => break,
            }
        }
    }

    fn handle_report(&mut self, report: Report) {
        let Report {
            id,
            outcome,
            warnings,
        } = report;
        let name = self.names.get(&id).cloned().unwrap_or_default();

        // The worker sent this report as its last act, so the join is
        // normally instant; the grace period keeps a wedged thread from
        // hanging the owner.
        if let Some(handle) = self.running.remove(&id) {
            self.join_with_grace(id, &name, handle);
        }

        if let Some(message) = warnings {
            tracing::warn!("Task {id} '{name}': {message}");
            self.emit(TaskEvent::Warning {
                id,
                name: name.clone(),
                message,
            });
        }

        match outcome {
            Ok(output) => {
                self.statuses.insert(id, TaskStatus::Completed);
                tracing::info!("Task {id} '{name}' completed");
                self.emit(TaskEvent::Completed {
                    id,
                    name: name.clone(),
                });
                if let Some(callback) = self.callbacks.remove(&id) {
                    callback(output);
                }
            }
            Err(error) => {
                self.statuses.insert(id, TaskStatus::Failed);
                self.callbacks.remove(&id);
                (self.on_failure)(id, &name, &error);
                self.emit(TaskEvent::Failed { id, name, error });
            }
        }
    }

    fn join_with_grace(&self, id: TaskId, name: &str, handle: JoinHandle<()>) {
        let deadline = Instant::now() + self.join_grace;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    "Task {id} '{name}' did not exit within {:?}, detaching its thread",
                    self.join_grace,
                );
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        let _ = handle.join();
    }

    fn emit(&self, event: TaskEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Gate that blocks workers until the test releases them.
    fn gate() -> (Sender<()>, Receiver<()>) {
        unbounded()
    }

    fn drain_events(scheduler: &TaskScheduler) -> Vec<TaskEvent> {
        scheduler.events().try_iter().collect()
    }

    #[test]
    fn test_limit_bounds_concurrency_with_fifo_overflow() {
        let mut scheduler = TaskScheduler::with_limit(2);
        let (release, wait) = gate();

        let mut ids = Vec::new();
        for i in 0..3 {
            let wait = wait.clone();
            ids.push(scheduler.submit(
                format!("blocked-{i}"),
                move || {
                    wait.recv().ok();
                    Ok(())
                },
                |_| {},
            ));
        }

        assert_eq!(scheduler.running_count(), 2);
        assert_eq!(scheduler.queued_count(), 1);
        assert_eq!(scheduler.status(ids[0]), Some(TaskStatus::Running));
        assert_eq!(scheduler.status(ids[2]), Some(TaskStatus::Queued));

        let events = drain_events(&scheduler);
        assert!(matches!(
            events[2],
            TaskEvent::Queued { id, position: 1, .. } if id == ids[2]
        ));

        for _ in 0..3 {
            release.send(()).unwrap();
        }
        scheduler.run_until_idle();

        assert!(scheduler.is_idle());
        for id in ids {
            assert_eq!(scheduler.status(id), Some(TaskStatus::Completed));
        }
        // The queued task started only after a slot freed up.
        let events = drain_events(&scheduler);
        let started_third = events
            .iter()
            .position(|e| matches!(e, TaskEvent::Started { name, .. } if name == "blocked-2"));
        let first_completion = events
            .iter()
            .position(|e| matches!(e, TaskEvent::Completed { .. }));
        assert!(started_third.unwrap() > first_completion.unwrap());
    }

    #[test]
    fn test_callback_runs_exactly_once_with_output() {
        let mut scheduler = TaskScheduler::with_limit(2);
        let total = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&total);
        scheduler.submit(
            "count",
            || Ok(42_usize),
            move |value| {
                sink.fetch_add(value, Ordering::SeqCst);
            },
        );

        scheduler.run_until_idle();
        assert_eq!(total.load(Ordering::SeqCst), 42);

        // Nothing left to process; the callback cannot fire again.
        assert_eq!(scheduler.pump(), 0);
        assert_eq!(total.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_failure_skips_callback_and_spares_siblings() {
        let mut scheduler = TaskScheduler::with_limit(2);
        let callback_ran = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));

        let recorded = Arc::clone(&failures);
        scheduler.on_failure(move |_, _, error| {
            assert!(error.contains("no points in file"));
            recorded.fetch_add(1, Ordering::SeqCst);
        });

        let flag = Arc::clone(&callback_ran);
        let bad = scheduler.submit(
            "bad",
            || -> anyhow::Result<()> { Err(anyhow::anyhow!("no points in file")) },
            move |_| {
                flag.fetch_add(1, Ordering::SeqCst);
            },
        );
        let good = scheduler.submit("good", || Ok(7_usize), |_| {});

        scheduler.run_until_idle();

        assert_eq!(scheduler.status(bad), Some(TaskStatus::Failed));
        assert_eq!(scheduler.status(good), Some(TaskStatus::Completed));
        assert_eq!(callback_ran.load(Ordering::SeqCst), 0);
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        let events = drain_events(&scheduler);
        assert!(events.iter().any(|e| matches!(
            e,
            TaskEvent::Failed { error, .. } if error.contains("no points in file")
        )));
    }

    #[test]
    fn test_panic_is_contained_and_scheduler_stays_usable() {
        let mut scheduler = TaskScheduler::with_limit(1);
        let panicking = scheduler.submit(
            "panics",
            || -> anyhow::Result<()> { panic!("corrupt record") },
            |_| {},
        );
        scheduler.run_until_idle();
        assert_eq!(scheduler.status(panicking), Some(TaskStatus::Failed));

        let after = scheduler.submit("after", || Ok(1_usize), |_| {});
        scheduler.run_until_idle();
        assert_eq!(scheduler.status(after), Some(TaskStatus::Completed));

        let events = drain_events(&scheduler);
        assert!(events.iter().any(|e| matches!(
            e,
            TaskEvent::Failed { error, .. } if error.contains("corrupt record")
        )));
    }

    #[test]
    fn test_queue_positions_are_one_based_in_order() {
        let mut scheduler = TaskScheduler::with_limit(1);
        let (release, wait) = gate();

        for i in 0..3 {
            let wait = wait.clone();
            scheduler.submit(
                format!("t{i}"),
                move || {
                    wait.recv().ok();
                    Ok(())
                },
                |_| {},
            );
        }

        let positions: Vec<usize> = drain_events(&scheduler)
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Queued { position, .. } => Some(position),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![1, 2]);

        for _ in 0..3 {
            release.send(()).unwrap();
        }
        scheduler.run_until_idle();
    }

    #[test]
    fn test_task_warnings_surface_as_one_event() {
        let mut scheduler = TaskScheduler::with_limit(1);
        scheduler.submit(
            "warns",
            || {
                emit_warning(WarningCategory::General, "degenerate face skipped");
                emit_warning(WarningCategory::Deprecation, "legacy key");
                Ok(())
            },
            |_| {},
        );
        scheduler.run_until_idle();

        let warnings: Vec<String> = drain_events(&scheduler)
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Warning { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec!["warning: degenerate face skipped".to_string()]);
    }

    #[test]
    fn test_shutdown_drops_queued_and_detaches_stragglers() {
        let mut scheduler = TaskScheduler::from_config(&SchedulerConfig {
            max_workers: Some(1),
            join_grace_ms: 50,
        });
        let (release, wait) = gate();

        let stuck = {
            let wait = wait.clone();
            scheduler.submit(
                "stuck",
                move || {
                    wait.recv().ok();
                    Ok(())
                },
                |_| {},
            )
        };
        let queued = scheduler.submit("queued", || Ok(()), |_| {});

        scheduler.shutdown();
        scheduler.shutdown();

        assert_eq!(scheduler.status(queued), Some(TaskStatus::Failed));
        // Still running on its detached thread; never reported.
        assert_eq!(scheduler.status(stuck), Some(TaskStatus::Running));

        let events = drain_events(&scheduler);
        assert!(events.iter().any(|e| matches!(
            e,
            TaskEvent::Failed { error, .. } if error == "dropped at shutdown"
        )));

        // Submissions after shutdown fail immediately.
        let late = scheduler.submit("late", || Ok(()), |_| {});
        assert_eq!(scheduler.status(late), Some(TaskStatus::Failed));

        // Unblock the detached worker so the test exits cleanly.
        release.send(()).unwrap();
    }
}
