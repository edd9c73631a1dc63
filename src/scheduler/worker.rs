//! Worker unit: runs exactly one job on a dedicated thread.
//!
//! A worker installs a thread-local warning scope, runs its job under
//! `catch_unwind`, and reports the outcome over the scheduler's channel.
//! Workers never touch scheduler state; everything flows through the
//! report.

use crossbeam_channel::Sender;
use std::any::Any;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::task::TaskId;

/// Type-erased task result, downcast by the callback wrapper in `submit`.
pub(crate) type TaskOutput = Box<dyn Any + Send>;

/// Boxed job as stored in the queue and handed to a worker.
pub(crate) type TaskFn = Box<dyn FnOnce() -> anyhow::Result<TaskOutput> + Send>;

/// Boxed success callback, invoked on the owner thread.
pub(crate) type TaskCallback = Box<dyn FnOnce(TaskOutput) + Send>;

/// What one worker sends back when its job finishes.
pub(crate) struct Report {
    pub id: TaskId,
    /// The job's output, or the stringified error/panic.
    pub outcome: Result<TaskOutput, String>,
    /// Surfaced warnings, coalesced into newline-joined `category: message`
    /// lines. `None` when nothing surfaced.
    pub warnings: Option<String>,
}

/// Category of an emitted warning. Bookkeeping categories are dropped from
/// task reports instead of being surfaced to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCategory {
    /// Anything a user should see
    General,
    /// Use of a deprecated setting or operation
    Deprecation,
    /// Literature citation attached to an algorithm
    Citation,
}

impl WarningCategory {
    fn label(self) -> &'static str {
        match self {
            WarningCategory::General => "warning",
            WarningCategory::Deprecation => "deprecation",
            WarningCategory::Citation => "citation",
        }
    }

    fn surfaced(self) -> bool {
        matches!(self, WarningCategory::General)
    }
}

thread_local! {
    static WARNING_SCOPE: RefCell<Option<Vec<(WarningCategory, String)>>> =
        const { RefCell::new(None) };
}

/// Record a non-fatal condition. Inside a worker the warning is captured
/// and reported with the task outcome; on any other thread it logs
/// immediately.
pub fn emit_warning(category: WarningCategory, message: impl Into<String>) {
    let message = message.into();
    let leftover = WARNING_SCOPE.with(|scope| match scope.borrow_mut().as_mut() {
        Some(captured) => {
            captured.push((category, message));
            None
        }
        None => Some(message),
    });
    if let Some(message) = leftover {
        tracing::warn!("{}: {message}", category.label());
    }
}

/// Activates warning collection on the current thread until drained.
struct WarningScope;

impl WarningScope {
    fn enter() -> Self {
        WARNING_SCOPE.with(|scope| *scope.borrow_mut() = Some(Vec::new()));
        Self
    }

    fn drain(self) -> Vec<(WarningCategory, String)> {
        WARNING_SCOPE
            .with(|scope| scope.borrow_mut().take())
            .unwrap_or_default()
    }
}

/// Run one job to completion and report the outcome. This is the entire
/// body of a worker thread.
pub(crate) fn run_job(id: TaskId, name: &str, job: TaskFn, report_tx: &Sender<Report>) {
    let scope = WarningScope::enter();

    let outcome = match catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(error)) => Err(format!("{error:#}")),
        Err(panic) => Err(panic_message(panic)),
    };

    let warnings = coalesce(scope.drain());
    tracing::debug!("Worker for {id} '{name}' finished");
    let _ = report_tx.send(Report {
        id,
        outcome,
        warnings,
    });
}

/// Drop filtered categories, dedupe repeats, join the rest.
fn coalesce(warnings: Vec<(WarningCategory, String)>) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    for (category, message) in warnings {
        if !category.surfaced() {
            continue;
        }
        let line = format!("{}: {message}", category.label());
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}
