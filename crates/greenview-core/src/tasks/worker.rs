//! Runs a task on a dedicated thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::Task;
use crate::error::TaskError;
use crate::pipeline::CancellationToken;
use crate::ports::{ProgressEvent, ProgressSink, TaskKind};

/// Handle to a running task.
pub struct TaskHandle<T> {
    kind: TaskKind,
    cancel: CancellationToken,
    join: JoinHandle<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// Requests cooperative cancellation; the in-flight item still completes.
    pub fn cancel(&self) {
        debug!("Cancellation requested for {} task", self.kind);
        self.cancel.cancel();
    }

    /// Token observed by the task, for cancelling from elsewhere.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Kind of the running task.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Returns true once the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Blocks until the task ends and returns its result.
    ///
    /// # Errors
    ///
    /// Returns the task's own error, or [`TaskError::Panicked`] if it panicked.
    pub fn join(self) -> Result<T, TaskError> {
        self.join
            .join()
            .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())))?
    }
}

/// Starts `task` on a new thread.
///
/// Progress events go to `sink` from the worker thread. A batch-level error
/// or panic is also reported as [`ProgressEvent::Failed`].
///
/// # Errors
///
/// Returns [`TaskError::Spawn`] if the thread cannot be created.
pub fn spawn<T: Task>(
    task: T,
    sink: Arc<dyn ProgressSink>,
) -> Result<TaskHandle<T::Output>, TaskError> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let join = thread::Builder::new()
        .name(format!("greenview-{}", T::KIND))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| task.execute(&token, sink.as_ref())))
                .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));
            if let Err(e) = &result {
                sink.on_event(ProgressEvent::Failed {
                    kind: T::KIND,
                    message: e.to_string(),
                });
            }
            result
        })
        .map_err(TaskError::Spawn)?;

    Ok(TaskHandle {
        kind: T::KIND,
        cancel,
        join,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
