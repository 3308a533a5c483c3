use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;

use webrunner_core_types::TaskId;

use crate::errors::TaskError;
use crate::model::TaskStatus;

/// Per-task mutable state for one active `execute_plan` call.
pub(crate) struct TaskHandle {
    status: Mutex<TaskStatus>,
    paused: AtomicBool,
    resume: Notify,
    cancel: CancellationToken,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            status: Mutex::new(TaskStatus::Executing),
            paused: AtomicBool::new(false),
            resume: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    pub(crate) fn set_status(&self, status: TaskStatus) {
        *self.status.lock() = status;
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wake anyone waiting on the pause gate.
    pub(crate) async fn resume_notified(&self) {
        self.resume.notified().await;
    }
}

/// Registry of live executions, keyed by task id.
///
/// All pause/resume/cancel transitions go through here so the state-machine
/// invariants live in one place.
#[derive(Default)]
pub(crate) struct TaskRegistry {
    tasks: DashMap<TaskId, Arc<TaskHandle>>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a fresh execution. Fails when the task is already live.
    pub(crate) fn register(&self, task_id: &TaskId) -> Result<Arc<TaskHandle>, TaskError> {
        let entry = self.tasks.entry(task_id.clone());
        match entry {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(TaskError::TaskAlreadyExecuting(task_id.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let handle = Arc::new(TaskHandle::new());
                vacant.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    pub(crate) fn remove(&self, task_id: &TaskId) {
        self.tasks.remove(task_id);
    }

    pub(crate) fn get(&self, task_id: &TaskId) -> Option<Arc<TaskHandle>> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    pub(crate) fn state(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.get(task_id).map(|handle| handle.status())
    }

    /// Pause is only legal from Executing.
    pub(crate) fn pause(&self, task_id: &TaskId) -> Result<(), TaskError> {
        let handle = self
            .get(task_id)
            .ok_or_else(|| TaskError::UnknownTask(task_id.clone()))?;
        let mut status = handle.status.lock();
        if *status != TaskStatus::Executing {
            return Err(TaskError::InvalidTransition {
                task_id: task_id.clone(),
                operation: "pause",
                state: *status,
            });
        }
        *status = TaskStatus::Paused;
        handle.paused.store(true, Ordering::SeqCst);
        info!(target: "task_executor", task = %task_id, "task paused");
        Ok(())
    }

    /// Resume is only legal from Paused.
    pub(crate) fn resume(&self, task_id: &TaskId) -> Result<(), TaskError> {
        let handle = self
            .get(task_id)
            .ok_or_else(|| TaskError::UnknownTask(task_id.clone()))?;
        let mut status = handle.status.lock();
        if *status != TaskStatus::Paused {
            return Err(TaskError::InvalidTransition {
                task_id: task_id.clone(),
                operation: "resume",
                state: *status,
            });
        }
        *status = TaskStatus::Executing;
        handle.paused.store(false, Ordering::SeqCst);
        handle.resume.notify_waiters();
        info!(target: "task_executor", task = %task_id, "task resumed");
        Ok(())
    }

    /// Cancel is legal from Executing or Paused.
    pub(crate) fn cancel(&self, task_id: &TaskId) -> Result<(), TaskError> {
        let handle = self
            .get(task_id)
            .ok_or_else(|| TaskError::UnknownTask(task_id.clone()))?;
        let status = handle.status();
        if !matches!(status, TaskStatus::Executing | TaskStatus::Paused) {
            return Err(TaskError::InvalidTransition {
                task_id: task_id.clone(),
                operation: "cancel",
                state: status,
            });
        }
        handle.cancel.cancel();
        // Wake the pause gate so the executor observes the cancellation.
        handle.resume.notify_waiters();
        info!(target: "task_executor", task = %task_id, "task cancelled");
        Ok(())
    }
}
