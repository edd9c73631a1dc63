//! Task identity, lifecycle status, and the owner-facing event stream.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Unique id of one submitted task. Ids are unique across scheduler
/// instances for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of one task as seen by the owner thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting in the overflow queue for a free slot
    Queued,
    /// Executing on its own worker thread
    Running,
    /// Finished successfully; the callback has run
    Completed,
    /// Finished with an error, panicked, or was dropped at shutdown
    Failed,
}

/// Progress notifications, drained from [`super::TaskScheduler::events`] by
/// interactive consumers. Every event carries the task id and name.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// No slot was free at submission; `position` is 1-based.
    Queued {
        id: TaskId,
        name: String,
        position: usize,
    },
    /// The task's worker thread started.
    Started { id: TaskId, name: String },
    /// Coalesced warnings captured while the task ran.
    Warning {
        id: TaskId,
        name: String,
        message: String,
    },
    /// The task finished successfully.
    Completed { id: TaskId, name: String },
    /// The task failed; `error` is the stringified cause.
    Failed {
        id: TaskId,
        name: String,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_are_unique_and_ordered() {
        let first = TaskId::next();
        let second = TaskId::next();
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_task_id_display() {
        let id = TaskId(7);
        assert_eq!(id.to_string(), "task-7");
    }
}
