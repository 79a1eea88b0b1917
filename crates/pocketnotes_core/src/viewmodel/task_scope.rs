//! Per-owner scope for background tasks.
//!
//! # Invariants
//! - Every task is spawned on the scope's runtime handle and tracked.
//! - Cancelling the scope (explicitly or on drop) signals every task; work
//!   already running on a blocking thread is abandoned, not interrupted.

use log::debug;
use std::future::Future;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct TaskScope {
    handle: Handle,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TaskScope {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Token observed by tasks of this scope.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns a tracked task. Ignored once the scope is cancelled.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            debug!("event=task_spawn module=viewmodel status=skipped reason=scope_cancelled");
            return;
        }
        drop(self.tracker.spawn_on(task, &self.handle));
    }

    /// Number of tasks spawned and not yet finished.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(
                "event=scope_cancel module=viewmodel status=ok pending={}",
                self.tracker.len()
            );
            self.cancel.cancel();
        }
    }

    /// Resolves once every task spawned so far, and any spawned while
    /// waiting, has finished.
    ///
    /// Not meant to be awaited from several callers at once.
    pub async fn wait_idle(&self) {
        self.idle().await;
    }

    /// Same as `wait_idle`, but detached from `self` so the caller can
    /// release whatever guards the scope before awaiting.
    pub fn idle(&self) -> impl Future<Output = ()> + Send + 'static {
        let tracker = self.tracker.clone();
        async move {
            tracker.close();
            tracker.wait().await;
            tracker.reopen();
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel();
    }
}
