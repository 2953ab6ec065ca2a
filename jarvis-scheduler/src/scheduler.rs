//! The task map and its background dispatch loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use jarvis_persistence::{Database, PersistenceError, TaskRow, TaskStatus};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::task::{ScheduledTask, TaskState};
use crate::trigger::Trigger;

const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Holds the set of scheduled tasks and, once [`Scheduler::start`] is
/// called, a single background worker that wakes at a fixed cadence,
/// finds due tasks, and dispatches them.
///
/// All automation here is explicitly configured: nothing adds a task to
/// this map except a direct call to [`Scheduler::add_task`] (or
/// [`Scheduler::restore_from`], replaying tasks a caller previously
/// persisted).
pub struct Scheduler {
    tasks: Mutex<HashMap<String, ScheduledTask>>,
    dispatcher: Arc<dyn Dispatcher>,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
    tick: Duration,
}

impl Scheduler {
    /// Build a scheduler with no tasks, waking every 500ms once started.
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self::with_tick(dispatcher, DEFAULT_TICK)
    }

    /// Build a scheduler with an explicit wake cadence. Must be `<= 1s`
    /// to meet the dispatch-latency bound due tasks are held to.
    pub fn with_tick(dispatcher: Arc<dyn Dispatcher>, tick: Duration) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            dispatcher,
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
            tick,
        }
    }

    /// Add a task. Its `next_run` was already computed by
    /// [`ScheduledTask::new`].
    pub fn add_task(&self, task: ScheduledTask) {
        let id = task.id.clone();
        let name = task.name.clone();
        self.tasks.lock().expect("scheduler tasks lock poisoned").insert(id.clone(), task);
        tracing::info!(task_id = id, name, "task added");
    }

    /// Remove a task. Returns whether one was present.
    pub fn remove_task(&self, id: &str) -> bool {
        let removed = self.tasks.lock().expect("scheduler tasks lock poisoned").remove(id).is_some();
        if removed {
            tracing::info!(task_id = id, "task removed");
        }
        removed
    }

    /// Pause a task so it stops being dispatched until resumed.
    pub fn pause_task(&self, id: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("scheduler tasks lock poisoned");
        match tasks.get_mut(id) {
            Some(task) => {
                task.pause();
                tracing::info!(task_id = id, "task paused");
                true
            }
            None => false,
        }
    }

    /// Reactivate a paused task.
    pub fn resume_task(&self, id: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("scheduler tasks lock poisoned");
        match tasks.get_mut(id) {
            Some(task) => {
                task.resume(Utc::now());
                tracing::info!(task_id = id, "task resumed");
                true
            }
            None => false,
        }
    }

    /// Fetch a task by id.
    pub fn get_task(&self, id: &str) -> Option<ScheduledTask> {
        self.tasks.lock().expect("scheduler tasks lock poisoned").get(id).cloned()
    }

    /// List every task.
    pub fn list_tasks(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().expect("scheduler tasks lock poisoned").values().cloned().collect()
    }

    /// Start the background dispatch loop. A no-op if already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move { scheduler.run_loop().await });
        *self.handle.lock().expect("scheduler handle lock poisoned") = Some(handle);
        tracing::info!("scheduler started");
    }

    /// Stop the background loop and wait for it to exit.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.handle.lock().expect("scheduler handle lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("scheduler stopped");
    }

    async fn run_loop(&self) {
        let mut interval = tokio::time::interval(self.tick);
        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;
            let now = Utc::now();
            let due: Vec<String> = {
                let tasks = self.tasks.lock().expect("scheduler tasks lock poisoned");
                tasks.values().filter(|t| t.is_due(now)).map(|t| t.id.clone()).collect()
            };
            for id in due {
                self.run_task(&id, now).await;
            }
        }
    }

    async fn run_task(&self, id: &str, now: chrono::DateTime<Utc>) {
        let action_text = {
            let tasks = self.tasks.lock().expect("scheduler tasks lock poisoned");
            match tasks.get(id) {
                Some(task) if task.state == TaskState::Active => task.action_text.clone(),
                _ => return,
            }
        };

        let turn_id = Uuid::new_v4().to_string();
        tracing::info!(task_id = id, %turn_id, "dispatching scheduled task");
        self.dispatcher.dispatch(&action_text, &turn_id).await;

        let mut tasks = self.tasks.lock().expect("scheduler tasks lock poisoned");
        if let Some(task) = tasks.get_mut(id) {
            task.record_run(now);
            if task.state == TaskState::Completed {
                tracing::info!(task_id = id, "task completed (max runs reached)");
            }
        }
    }

    /// Persist every task's storage projection to `db`. Recurring
    /// trigger definitions (interval/time-of-day) stay in-memory only;
    /// only enough survives a restart to resume a due one-shot action
    /// (see [`Scheduler::restore_from`]).
    pub fn save_to(&self, db: &Database) -> Result<(), PersistenceError> {
        let rows: Vec<TaskRow> = {
            let tasks = self.tasks.lock().expect("scheduler tasks lock poisoned");
            tasks.values().map(task_to_row).collect()
        };
        for row in rows {
            db.transaction(|conn| db.save_task(conn, &row))?;
        }
        Ok(())
    }

    /// Build a scheduler from tasks pending in `db`. Each is restored as
    /// a one-shot [`Trigger::Once`] firing at its recorded
    /// `scheduled_time`; recurring schedules must be re-registered by
    /// the caller (e.g. from configuration) after this returns.
    pub fn restore_from(dispatcher: Arc<dyn Dispatcher>, db: &Database) -> Result<Self, PersistenceError> {
        let scheduler = Self::new(dispatcher);
        for row in db.get_pending_tasks()? {
            let Some(scheduled_time) = row.scheduled_time else { continue };
            let mut task = ScheduledTask::new(row.name, row.action, Trigger::Once(scheduled_time));
            task.id = row.id;
            task.created_at = row.created_at;
            scheduler.add_task(task);
        }
        Ok(scheduler)
    }
}

fn task_to_row(task: &ScheduledTask) -> TaskRow {
    TaskRow {
        id: task.id.clone(),
        name: task.name.clone(),
        action: task.action_text.clone(),
        status: match task.state {
            TaskState::Completed => TaskStatus::Completed,
            TaskState::Failed => TaskStatus::Cancelled,
            TaskState::Active | TaskState::Paused => TaskStatus::Pending,
        },
        scheduled_time: task.next_run,
        created_at: task.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::NoopDispatcher;
    use crate::trigger::TimeSpec;
    use std::sync::atomic::AtomicUsize;

    struct CountingDispatcher {
        calls: AtomicUsize,
    }

    impl Dispatcher for CountingDispatcher {
        fn dispatch<'a>(
            &'a self,
            _action_text: &'a str,
            _turn_id: &'a str,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Option<String>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Some("ok".to_string()) })
        }
    }

    #[test]
    fn add_get_remove_round_trip() {
        let scheduler = Scheduler::new(Arc::new(NoopDispatcher));
        let task = ScheduledTask::new("ping", "ping", Trigger::Interval { seconds: 60 });
        let id = task.id.clone();
        scheduler.add_task(task);
        assert!(scheduler.get_task(&id).is_some());
        assert!(scheduler.remove_task(&id));
        assert!(scheduler.get_task(&id).is_none());
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let scheduler = Scheduler::new(Arc::new(NoopDispatcher));
        let task = ScheduledTask::new("ping", "ping", Trigger::Interval { seconds: 60 });
        let id = task.id.clone();
        scheduler.add_task(task);
        assert!(scheduler.pause_task(&id));
        assert_eq!(scheduler.get_task(&id).unwrap().state, TaskState::Paused);
        assert!(scheduler.resume_task(&id));
        assert_eq!(scheduler.get_task(&id).unwrap().state, TaskState::Active);
    }

    #[tokio::test]
    async fn due_task_is_dispatched_and_rescheduled() {
        let dispatcher = Arc::new(CountingDispatcher { calls: AtomicUsize::new(0) });
        let scheduler = Arc::new(Scheduler::with_tick(dispatcher.clone(), Duration::from_millis(10)));
        let mut task = ScheduledTask::new("ping", "ping", Trigger::Interval { seconds: 60 });
        // Backdate so it's immediately due, rather than racing real time
        // against a paused tokio clock (chrono::Utc::now() ignores tokio's
        // virtual clock).
        task.next_run = Some(Utc::now() - chrono::Duration::seconds(1));
        let id = task.id.clone();
        scheduler.add_task(task);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop().await;

        assert!(dispatcher.calls.load(Ordering::SeqCst) >= 1);
        assert!(scheduler.get_task(&id).unwrap().run_count >= 1);
    }

    #[tokio::test]
    async fn restore_from_rebuilds_pending_tasks_as_one_shots() {
        let db = Database::open_in_memory().unwrap();
        let row = TaskRow {
            id: "task-1".into(),
            name: "reminder".into(),
            action: "remind me".into(),
            status: TaskStatus::Pending,
            scheduled_time: Some(Utc::now()),
            created_at: Utc::now(),
        };
        db.transaction(|conn| db.save_task(conn, &row)).unwrap();

        let scheduler = Scheduler::restore_from(Arc::new(NoopDispatcher), &db).unwrap();
        let restored = scheduler.get_task("task-1").unwrap();
        assert!(matches!(restored.trigger, Trigger::Once(_)));
    }

    #[test]
    fn save_to_round_trips_through_persistence() {
        let db = Database::open_in_memory().unwrap();
        let scheduler = Scheduler::new(Arc::new(NoopDispatcher));
        scheduler.add_task(ScheduledTask::new("briefing", "give me the news", Trigger::Time(TimeSpec::daily(9, 0))));
        scheduler.save_to(&db).unwrap();
        assert_eq!(db.get_pending_tasks().unwrap().len(), 1);
    }
}
