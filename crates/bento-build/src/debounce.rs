//! Trailing-edge debouncing for post-build work in watch mode.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Delay between the last rebuild and the post-build steps.
pub const POST_BUILD_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct Pending {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

impl Pending {
    /// Abort the task unless it is already running.
    fn cancel(self) {
        if !self.started.load(Ordering::SeqCst) {
            self.handle.abort();
        }
    }
}

/// Runs only the most recently scheduled task, once `delay` has passed without
/// another call.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<Pending>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `task`, replacing anything still pending.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(true, Ordering::SeqCst);
            task.await;
        });
        if let Some(previous) = self.pending.lock().replace(Pending { handle, started }) {
            previous.cancel();
        }
    }

    /// Drop the pending task. A task that already started runs to completion.
    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.cancel();
        }
    }

    /// Whether a task is scheduled and has not started yet.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(|pending| {
            !pending.started.load(Ordering::SeqCst) && !pending.handle.is_finished()
        })
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(POST_BUILD_DELAY)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
