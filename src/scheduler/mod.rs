//! Scheduled task manager.
//!
//! Each scheduled task is a detached tokio task that outlives the request
//! which created it. Live tasks sit in an arena keyed by [`TaskId`]; every
//! slot owns a child of the manager's cancellation token, so cancelling one
//! task or shutting the manager down is cooperative and immediate.
//!
//! Waiting is two-phase to absorb timer drift: one coarse sleep up to
//! [`COARSE_THRESHOLD`] before the fire time, then [`FINE_STEP`] sleeps until
//! the clock reaches it.

pub mod clock;
pub mod notifier;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use clock::{Clock, MonotonicClock, SystemClock};
pub use notifier::{Notification, Notifier, NotifyError, TelegramNotifier, TELEGRAM_API};

/// Remaining time above which the coarse sleep is used.
pub const COARSE_THRESHOLD: Duration = Duration::from_secs(5);

/// Sleep step of the fine phase.
pub const FINE_STEP: Duration = Duration::from_secs(1);

pub type TaskId = Uuid;

/// Lifecycle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Armed,
    /// Delivery was attempted. Whether it succeeded is only logged.
    Fired,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Fired | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Armed => write!(f, "armed"),
            TaskState::Fired => write!(f, "fired"),
            TaskState::Cancelled => write!(f, "cancelled"),
        }
    }
}

struct TaskSlot {
    cancel: CancellationToken,
}

/// Observer for one scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    fire_at: DateTime<Utc>,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn fire_at(&self) -> DateTime<Utc> {
        self.fire_at
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Wait until the task is fired or cancelled.
    pub async fn finished(&mut self) -> TaskState {
        if let Ok(state) = self.state.wait_for(TaskState::is_terminal).await {
            return *state;
        }
        *self.state.borrow()
    }
}

/// Owns every outstanding scheduled task.
pub struct ScheduledTaskManager {
    tasks: Arc<DashMap<TaskId, TaskSlot>>,
    root: CancellationToken,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl ScheduledTaskManager {
    /// Create a manager whose tasks are cancelled together with `root`.
    pub fn new(notifier: Arc<dyn Notifier>, root: CancellationToken) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            root,
            clock: Arc::new(SystemClock),
            notifier,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Schedule `payload` for delivery at `fire_at`.
    ///
    /// Must be called from within a tokio runtime. A fire time in the past
    /// delivers on the next scheduler turn.
    pub fn schedule(&self, fire_at: DateTime<Utc>, payload: Notification) -> TaskHandle {
        let id = Uuid::new_v4();
        let cancel = self.root.child_token();
        let (state_tx, state_rx) = watch::channel(TaskState::Pending);

        self.tasks.insert(
            id,
            TaskSlot {
                cancel: cancel.clone(),
            },
        );

        let tasks = Arc::clone(&self.tasks);
        let clock = Arc::clone(&self.clock);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            state_tx.send_replace(TaskState::Armed);
            log::debug!("task {} armed for {}", id, fire_at);

            let terminal = tokio::select! {
                biased;
                _ = cancel.cancelled() => TaskState::Cancelled,
                _ = wait_until(clock.as_ref(), fire_at) => {
                    match notifier.deliver(&payload).await {
                        Ok(()) => log::info!("task {} delivered to {}", id, payload.destination),
                        Err(e) => log::error!("task {} delivery failed: {}", id, e),
                    }
                    TaskState::Fired
                }
            };

            tasks.remove(&id);
            log::debug!("task {} {}", id, terminal);
            state_tx.send_replace(terminal);
        });

        TaskHandle {
            id,
            fire_at,
            state: state_rx,
        }
    }

    /// Cancel a live task. Returns `false` if no such task is outstanding.
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.tasks.get(&id) {
            Some(slot) => {
                slot.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of tasks not yet fired or cancelled.
    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel every outstanding task.
    pub fn shutdown(&self) {
        log::info!("cancelling {} scheduled task(s)", self.tasks.len());
        self.root.cancel();
    }
}

impl fmt::Debug for ScheduledTaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTaskManager")
            .field("pending", &self.tasks.len())
            .field("cancelled", &self.root.is_cancelled())
            .finish()
    }
}

async fn wait_until(clock: &dyn Clock, fire_at: DateTime<Utc>) {
    let remaining = (fire_at - clock.now()).to_std().unwrap_or(Duration::ZERO);
    if remaining > COARSE_THRESHOLD {
        tokio::time::sleep(remaining - COARSE_THRESHOLD).await;
    }
    while clock.now() < fire_at {
        tokio::time::sleep(FINE_STEP).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingNotifier {
        delivered: Mutex<Vec<(String, Instant)>>,
    }

    impl RecordingNotifier {
        fn delivered(&self) -> Vec<(String, Instant)> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.delivered
                .lock()
                .unwrap()
                .push((notification.text.clone(), Instant::now()));
            Ok(())
        }
    }

    fn manager() -> (ScheduledTaskManager, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = ScheduledTaskManager::new(notifier.clone(), CancellationToken::new())
            .with_clock(Arc::new(MonotonicClock::new()));
        (manager, notifier)
    }

    fn note(text: &str) -> Notification {
        Notification {
            destination: "1".into(),
            text: text.into(),
        }
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_not_early() {
        let (manager, notifier) = manager();
        let start = Instant::now();

        let mut handle = manager.schedule(manager.now() + secs(2), note("soon"));
        assert_eq!(handle.state(), TaskState::Pending);
        assert_eq!(manager.pending_count(), 1);

        assert_eq!(handle.finished().await, TaskState::Fired);
        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].1 - start >= Duration::from_secs(2));
        assert_eq!(manager.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(notifier.delivered().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_never_delivers() {
        let (manager, notifier) = manager();

        let mut handle = manager.schedule(manager.now() + secs(12), note("later"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.state(), TaskState::Armed);

        assert!(manager.cancel(handle.id()));
        assert_eq!(handle.finished().await, TaskState::Cancelled);
        assert!(!manager.cancel(handle.id()));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(notifier.delivered().is_empty());
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_fire_independently() {
        let (manager, notifier) = manager();
        let start = Instant::now();

        let mut late = manager.schedule(manager.now() + secs(8), note("late"));
        let mut early = manager.schedule(manager.now() + secs(3), note("early"));

        assert_eq!(early.finished().await, TaskState::Fired);
        assert_eq!(late.finished().await, TaskState::Fired);

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, "early");
        assert_eq!(delivered[1].0, "late");

        let early_at = delivered[0].1 - start;
        let late_at = delivered[1].1 - start;
        assert!(early_at >= Duration::from_secs(3) && early_at < Duration::from_secs(4));
        assert!(late_at >= Duration::from_secs(8) && late_at < Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_all() {
        let (manager, notifier) = manager();

        let mut handles: Vec<_> = (1..=3)
            .map(|n| manager.schedule(manager.now() + secs(10 * n), note("x")))
            .collect();
        tokio::time::sleep(Duration::from_secs(1)).await;
        manager.shutdown();

        for handle in &mut handles {
            assert_eq!(handle.finished().await, TaskState::Cancelled);
        }
        assert_eq!(manager.pending_count(), 0);
        assert!(notifier.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_fire_time_delivers_immediately() {
        let (manager, notifier) = manager();
        let mut handle = manager.schedule(manager.now() - secs(60), note("overdue"));
        assert_eq!(handle.finished().await, TaskState::Fired);
        assert_eq!(notifier.delivered().len(), 1);
    }
}
