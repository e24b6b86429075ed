use crate::error::{LedgerError, Result};
use crate::types::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const TASK_ID_PREFIX: &str = "TASK-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub agent: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub story_points: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// Caller-supplied fields for a task about to be created.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub agent: String,
    pub priority: Priority,
    pub story_points: u32,
    pub context: Option<String>,
    pub acceptance_criteria: Vec<String>,
    pub dependencies: Vec<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            agent: agent.into(),
            priority: Priority::P1,
            story_points: 3,
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn story_points(mut self, points: u32) -> Self {
        self.story_points = points;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LedgerError::MalformedInput("title must not be empty".into()));
        }
        if self.agent.trim().is_empty() {
            return Err(LedgerError::MalformedInput("agent must not be empty".into()));
        }
        for dep in &self.dependencies {
            if task_seq(dep).is_none() {
                return Err(LedgerError::MalformedInput(format!(
                    "dependency '{dep}' is not a task id"
                )));
            }
        }
        Ok(())
    }
}

/// Old and new status of a single `apply_status` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub old: TaskStatus,
    pub new: TaskStatus,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

impl Task {
    pub fn create(id: String, spec: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: spec.title,
            agent: spec.agent,
            status: TaskStatus::Todo,
            priority: spec.priority,
            story_points: spec.story_points,
            created_at: now,
            started_at: None,
            completed_at: None,
            context: spec.context,
            acceptance_criteria: spec.acceptance_criteria,
            dependencies: spec.dependencies,
            notes: String::new(),
        }
    }

    /// Move the task to `new`, stamping timestamps the transition implies.
    ///
    /// `started_at` is only set on TODO -> IN_PROGRESS. `completed_at` is set
    /// whenever the target is DONE, including DONE -> DONE. Neither is ever cleared. Non-empty `notes` replace the
    /// previous notes even when the status does not change.
    pub fn apply_status(
        &mut self,
        new: TaskStatus,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusChange> {
        let old = self.status;
        if !is_allowed_transition(old, new) {
            return Err(LedgerError::InvalidTransition {
                from: old.to_string(),
                to: new.to_string(),
            });
        }
        if old == TaskStatus::Todo && new == TaskStatus::InProgress {
            self.started_at = Some(now);
        }
        if new == TaskStatus::Done {
            self.completed_at = Some(now);
        }
        if !notes.is_empty() {
            self.notes = notes.to_string();
        }
        self.status = new;
        Ok(StatusChange { old, new })
    }
}

/// Transition policy. Every pair of statuses is currently permitted; tighten
/// here and nowhere else.
pub fn is_allowed_transition(_from: TaskStatus, _to: TaskStatus) -> bool {
    true
}

// ---------------------------------------------------------------------------
// Task ids
// ---------------------------------------------------------------------------

static TASK_ID_RE: OnceLock<Regex> = OnceLock::new();

fn task_id_re() -> &'static Regex {
    TASK_ID_RE.get_or_init(|| Regex::new(r"^TASK-(\d+)$").unwrap())
}

pub fn format_task_id(seq: u64) -> String {
    format!("{TASK_ID_PREFIX}{seq:03}")
}

/// Numeric suffix of a well-formed task id.
pub fn task_seq(id: &str) -> Option<u64> {
    task_id_re()
        .captures(id)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::create(
            format_task_id(1),
            NewTask::new("Add login", "FastAPI Agent").story_points(5),
            Utc::now(),
        )
    }

    #[test]
    fn new_task_starts_todo() {
        let task = sample();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::P1);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.notes.is_empty());
    }

    #[test]
    fn start_then_complete_stamps_timestamps() {
        let mut task = sample();
        task.apply_status(TaskStatus::InProgress, "", Utc::now()).unwrap();
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_none());

        task.apply_status(TaskStatus::Done, "shipped", Utc::now()).unwrap();
        assert!(task.completed_at.is_some());
        assert_eq!(task.notes, "shipped");
    }

    #[test]
    fn done_again_restamps_completion() {
        let mut task = sample();
        let first = Utc::now();
        task.apply_status(TaskStatus::Done, "", first).unwrap();
        let later = first + chrono::Duration::seconds(30);
        let change = task.apply_status(TaskStatus::Done, "", later).unwrap();
        assert!(change.is_noop());
        assert_eq!(task.completed_at, Some(later));
    }

    #[test]
    fn blocked_to_in_progress_keeps_original_start() {
        let mut task = sample();
        let first = Utc::now();
        task.apply_status(TaskStatus::InProgress, "", first).unwrap();
        task.apply_status(TaskStatus::Blocked, "waiting on infra", Utc::now())
            .unwrap();
        task.apply_status(TaskStatus::InProgress, "", Utc::now()).unwrap();
        assert_eq!(task.started_at, Some(first));
    }

    #[test]
    fn same_status_updates_notes_only() {
        let mut task = sample();
        let change = task.apply_status(TaskStatus::Todo, "ready", Utc::now()).unwrap();
        assert!(change.is_noop());
        assert_eq!(task.notes, "ready");
        assert!(task.started_at.is_none());
    }

    #[test]
    fn empty_notes_do_not_overwrite() {
        let mut task = sample();
        task.apply_status(TaskStatus::Blocked, "db down", Utc::now()).unwrap();
        task.apply_status(TaskStatus::Blocked, "", Utc::now()).unwrap();
        assert_eq!(task.notes, "db down");
    }

    #[test]
    fn task_ids_roundtrip() {
        assert_eq!(format_task_id(7), "TASK-007");
        assert_eq!(task_seq("TASK-007"), Some(7));
        assert_eq!(task_seq("TASK-12345"), Some(12345));
        assert_eq!(task_seq("T1"), None);
        assert_eq!(task_seq("TASK-"), None);
    }

    #[test]
    fn new_task_validation() {
        assert!(NewTask::new("", "agent").validate().is_err());
        assert!(NewTask::new("title", " ").validate().is_err());
        let mut spec = NewTask::new("title", "agent");
        spec.dependencies.push("login".into());
        assert!(spec.validate().is_err());
        spec.dependencies = vec!["TASK-001".into()];
        assert!(spec.validate().is_ok());
    }
}
