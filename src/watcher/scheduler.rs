//! One-shot deferred tasks.
//!
//! The watcher never blocks a request while it waits for artifacts. Every
//! wait is a single scheduled task; a task that needs another wait schedules
//! a new one rather than looping.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// A deferred unit of work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs a task once after a delay.
pub trait Scheduler: Send + Sync + fmt::Debug {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Schedules tasks on the tokio runtime.
///
/// Tasks are tracked so shutdown can wait for checks already in flight.
/// Tasks still sleeping when shutdown starts are dropped; their releases
/// are picked up again by recovery on the next start.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl TokioScheduler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown,
        }
    }

    /// Stops accepting tasks and waits for running ones to finish.
    pub async fn close(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let shutdown = self.shutdown.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => task.await,
                _ = shutdown.cancelled() => debug!("dropping scheduled task on shutdown"),
            }
        });
    }
}

/// Records scheduled tasks without running them.
///
/// Tests drive time explicitly: inspect the recorded delays, then run the
/// queued tasks in order.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<(Duration, Task)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Delays of the waiting tasks, oldest first.
    pub fn delays(&self) -> Vec<Duration> {
        self.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Runs the oldest waiting task. Returns its delay, or `None` if nothing
    /// was scheduled.
    pub async fn run_next(&self) -> Option<Duration> {
        let (delay, task) = self.lock().pop_front()?;
        task.await;
        Some(delay)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(Duration, Task)>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("delays", &self.delays())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.lock().push_back((delay, task));
    }
}
