//! A single scheduled task and its run bookkeeping.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::trigger::Trigger;

/// Lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to run when `next_run` arrives.
    Active,
    /// Not currently scheduled; resumable.
    Paused,
    /// Ran to completion (one-shot fired, or `max_runs` reached).
    Completed,
    /// Ended abnormally and will not be retried automatically.
    Failed,
}

/// A task the scheduler dispatches back into the orchestrator when due.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    /// Unique id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Command text dispatched as if user-typed.
    pub action_text: String,
    /// What schedules this task's next run.
    pub trigger: Trigger,
    /// Current lifecycle state.
    pub state: TaskState,
    /// When this task last ran.
    pub last_run: Option<DateTime<Utc>>,
    /// When this task is next due, if any.
    pub next_run: Option<DateTime<Utc>>,
    /// How many times this task has run.
    pub run_count: u32,
    /// Run limit; `None` means unlimited.
    pub max_runs: Option<u32>,
    /// When this task was created.
    pub created_at: DateTime<Utc>,
    /// Free-form description.
    pub description: String,
}

impl ScheduledTask {
    /// Build a new, active task with a generated id and a freshly
    /// computed `next_run`.
    pub fn new(name: impl Into<String>, action_text: impl Into<String>, trigger: Trigger) -> Self {
        let mut task = Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            action_text: action_text.into(),
            trigger,
            state: TaskState::Active,
            last_run: None,
            next_run: None,
            run_count: 0,
            max_runs: None,
            created_at: Utc::now(),
            description: String::new(),
        };
        task.recalculate_next_run(task.created_at);
        task
    }

    /// Cap the number of times this task may run.
    pub fn with_max_runs(mut self, max_runs: u32) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Recompute `next_run` from `trigger` and `last_run`. A no-op
    /// (clears `next_run`) unless `state` is [`TaskState::Active`].
    pub fn recalculate_next_run(&mut self, now: DateTime<Utc>) {
        if self.state != TaskState::Active {
            self.next_run = None;
            return;
        }

        self.next_run = match self.trigger {
            Trigger::Time(spec) => Some(spec.next_occurrence(now)),
            Trigger::Interval { seconds } => Some(match self.last_run {
                Some(last) => {
                    let candidate = last + Duration::seconds(seconds);
                    if candidate <= now { now + Duration::seconds(seconds) } else { candidate }
                }
                None => now + Duration::seconds(seconds),
            }),
            Trigger::Once(at) => {
                if self.last_run.is_some() {
                    None
                } else {
                    Some(at)
                }
            }
        };
    }

    /// Whether this task is active and its `next_run` has arrived.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == TaskState::Active && self.next_run.is_some_and(|t| t <= now)
    }

    /// Record that the task ran at `now`, then either complete it (a
    /// one-shot trigger, or `max_runs` reached) or schedule its next run.
    pub fn record_run(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.run_count += 1;

        let exhausted = matches!(self.trigger, Trigger::Once(_))
            || self.max_runs.is_some_and(|max| self.run_count >= max);

        if exhausted {
            self.state = TaskState::Completed;
            self.next_run = None;
        } else {
            self.recalculate_next_run(now);
        }
    }

    /// Pause the task; clears `next_run` until [`ScheduledTask::resume`].
    pub fn pause(&mut self) {
        self.state = TaskState::Paused;
        self.next_run = None;
    }

    /// Reactivate a paused task and recompute its `next_run`.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Active;
        self.recalculate_next_run(now);
    }
}
