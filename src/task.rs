//! Cancellable units of work
//!
//! `CancellableTask` wraps a spawned tokio task with an explicit `cancel`.
//! `TaskSlot` holds at most one task and cancels the previous one before a
//! replacement is installed, which is how superseded loads are discarded.

use std::future::Future;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Why a task produced no value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task was cancelled")]
    Cancelled,

    #[error("task panicked")]
    Panicked,
}

/// A spawned task that the owner can cancel at any time
#[derive(Debug)]
pub struct CancellableTask<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> CancellableTask<T> {
    /// Spawns `future` on the current runtime
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }
}

impl<T> CancellableTask<T> {
    /// Requests cancellation; the task stops at its next suspension point
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the task's value
    pub async fn join(self) -> Result<T, TaskError> {
        self.handle.await.map_err(|err| {
            if err.is_cancelled() {
                TaskError::Cancelled
            } else {
                TaskError::Panicked
            }
        })
    }
}

/// Holds the latest task and cancels whatever it replaces
#[derive(Debug)]
pub struct TaskSlot<T> {
    current: Option<CancellableTask<T>>,
}

impl<T> Default for TaskSlot<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T> TaskSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the current task, if any, then installs `task`
    pub fn replace(&mut self, task: CancellableTask<T>) {
        self.cancel();
        self.current = Some(task);
    }

    /// Cancels and forgets the current task
    pub fn cancel(&mut self) {
        if let Some(task) = self.current.take() {
            task.cancel();
        }
    }

    /// Takes the current task so the caller can await it
    pub fn take(&mut self) -> Option<CancellableTask<T>> {
        self.current.take()
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_returns_value() {
        let task = CancellableTask::spawn(async { 42 });
        assert_eq!(task.join().await, Ok(42));
    }

    #[tokio::test]
    async fn test_cancel_stops_task_before_completion() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let task = CancellableTask::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
        });

        task.cancel();

        assert_eq!(task.join().await, Err(TaskError::Cancelled));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_slot_replace_cancels_previous() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let mut slot = TaskSlot::new();
        slot.replace(CancellableTask::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            "first"
        }));
        assert!(slot.is_active());

        slot.replace(CancellableTask::spawn(async { "second" }));

        let current = slot.take().expect("Slot should hold the second task");
        assert_eq!(current.join().await, Ok("second"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst), "First task should never finish");
    }

    #[tokio::test]
    async fn test_cancel_on_empty_slot_is_noop() {
        let mut slot: TaskSlot<()> = TaskSlot::new();
        slot.cancel();
        assert!(!slot.is_active());
        assert!(slot.take().is_none());
    }
}
