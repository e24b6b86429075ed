use crate::error::{LedgerError, Result};
use crate::log::LogEvent;
use crate::metrics::Metrics;
use crate::task::{format_task_id, task_seq, NewTask, StatusChange, Task};
use crate::types::TaskStatus;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Sprint document
// ---------------------------------------------------------------------------

/// The sprint currently in flight, persisted as one JSON document.
///
/// `metrics` is a cache over `tasks`; every mutation here keeps it in step
/// incrementally and [`Sprint::reconcile`] rebuilds it from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub sprint: u32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub epic: String,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Bumped on every write; see `store::Ledger::mutate`.
    #[serde(default)]
    pub revision: u64,
    /// Last sequence number handed out as a task id.
    #[serde(default)]
    pub next_task_seq: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SprintSummary {
    pub sprint: u32,
    pub period: String,
    pub goal: String,
    pub epic: String,
    pub metrics: Metrics,
    pub percent_complete: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub drifted: bool,
    pub before: Metrics,
    pub after: Metrics,
}

impl Sprint {
    pub fn new(number: u32, goal: impl Into<String>) -> Self {
        Self {
            sprint: number,
            start_date: None,
            end_date: None,
            goal: goal.into(),
            epic: String::new(),
            metrics: Metrics::default(),
            tasks: Vec::new(),
            revision: 0,
            next_task_seq: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LedgerError::NotInitialized);
        }
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data).map_err(|e| LedgerError::InvalidDocument {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn parse(data: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        Ok(data)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Highest task sequence number in use, counting ids written by hand.
    pub fn last_task_seq(&self) -> u64 {
        self.tasks
            .iter()
            .filter_map(|t| task_seq(&t.id))
            .max()
            .unwrap_or(0)
            .max(self.next_task_seq)
    }

    /// Hand out the next task id. Never reuses a number already in `tasks`.
    fn allocate_id(&mut self) -> String {
        let seq = self.last_task_seq() + 1;
        self.next_task_seq = seq;
        format_task_id(seq)
    }

    pub fn create_task(&mut self, spec: NewTask) -> Result<(String, LogEvent)> {
        spec.validate()?;
        let id = self.allocate_id();
        let task = Task::create(id.clone(), spec, Utc::now());
        self.metrics.record_created(task.story_points);
        let event = LogEvent::TaskCreated {
            task_id: id.clone(),
            title: task.title.clone(),
            agent: task.agent.clone(),
            priority: task.priority,
            story_points: task.story_points,
        };
        self.tasks.push(task);
        Ok((id, event))
    }

    /// Transition a task. A missing id fails before anything is touched.
    pub fn update_status(
        &mut self,
        id: &str,
        new: TaskStatus,
        notes: &str,
    ) -> Result<(StatusChange, LogEvent)> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| LedgerError::TaskNotFound(id.to_string()))?;
        let change = task.apply_status(new, notes, Utc::now())?;
        let points = task.story_points;
        self.metrics.record_transition(change.old, change.new, points);
        Ok((change, LogEvent::status_change(id, change, notes)))
    }

    /// Overwrite the cached metrics with a full scan. Idempotent.
    pub fn reconcile(&mut self) -> ReconcileReport {
        let before = self.metrics;
        let after = Metrics::compute(&self.tasks);
        self.metrics = after;
        ReconcileReport {
            drifted: before != after,
            before,
            after,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn task(&self, id: &str) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| LedgerError::TaskNotFound(id.to_string()))
    }

    /// Tasks in creation order, optionally restricted to one status.
    pub fn list_tasks(&self, filter: Option<TaskStatus>) -> impl Iterator<Item = &Task> + '_ {
        self.tasks
            .iter()
            .filter(move |t| filter.map_or(true, |s| t.status == s))
    }

    pub fn tasks_by_agent<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.agent == agent)
    }

    pub fn open_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .count()
    }

    /// Ids that occur more than once, in first-seen order.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dupes = Vec::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) && !dupes.contains(&task.id) {
                dupes.push(task.id.clone());
            }
        }
        dupes
    }

    pub fn period(&self) -> String {
        let fmt = |d: Option<NaiveDate>| d.map_or_else(|| "?".to_string(), |d| d.to_string());
        if self.start_date.is_none() && self.end_date.is_none() {
            return "unscheduled".to_string();
        }
        format!("{} to {}", fmt(self.start_date), fmt(self.end_date))
    }

    pub fn summary(&self) -> SprintSummary {
        SprintSummary {
            sprint: self.sprint,
            period: self.period(),
            goal: self.goal.clone(),
            epic: self.epic.clone(),
            metrics: self.metrics,
            percent_complete: self.metrics.percent_complete(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
