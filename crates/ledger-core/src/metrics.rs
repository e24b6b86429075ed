//! Aggregate progress counters cached on the sprint document.
//!
//! The stored `Metrics` are maintained incrementally on every mutation. The
//! scan in [`Metrics::compute`] is ground truth; a stored value that differs
//! from it has drifted and is repaired by reconciliation.
//!
//! Counters are signed so a document whose cache was decremented below zero
//! by an outside tool still loads and can be reconciled.

use crate::task::Task;
use crate::types::TaskStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub todo: i64,
    #[serde(default)]
    pub in_progress: i64,
    #[serde(default)]
    pub done: i64,
    #[serde(default)]
    pub blocked: i64,
}

impl TaskCounts {
    fn bucket_mut(&mut self, status: TaskStatus) -> &mut i64 {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
            TaskStatus::Blocked => &mut self.blocked,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub completed_points: i64,
    #[serde(default)]
    pub tasks: TaskCounts,
}

impl Metrics {
    pub fn compute(tasks: &[Task]) -> Self {
        let mut metrics = Metrics::default();
        for task in tasks {
            metrics.record_created(task.story_points);
            metrics.record_transition(TaskStatus::Todo, task.status, task.story_points);
        }
        metrics
    }

    /// A new task lands in TODO.
    pub fn record_created(&mut self, points: u32) {
        self.tasks.total += 1;
        self.tasks.todo += 1;
        self.total_points += i64::from(points);
    }

    /// Move one task between buckets. Equal statuses leave everything unchanged.
    ///
    /// Decrements stop at zero. A drifted document is left for reconciliation
    /// to fix rather than pushed further negative.
    pub fn record_transition(&mut self, old: TaskStatus, new: TaskStatus, points: u32) {
        if old == new {
            return;
        }
        let points = i64::from(points);
        let from = self.tasks.bucket_mut(old);
        *from = (*from - 1).max(0);
        *self.tasks.bucket_mut(new) += 1;
        if old == TaskStatus::Done {
            self.completed_points = (self.completed_points - points).max(0);
        }
        if new == TaskStatus::Done {
            self.completed_points += points;
        }
    }

    /// Percentage of story points done, `0.0` for a sprint with no points.
    pub fn percent_complete(&self) -> f64 {
        if self.total_points <= 0 {
            return 0.0;
        }
        self.completed_points as f64 * 100.0 / self.total_points as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{format_task_id, NewTask};
    use chrono::Utc;

    fn task(seq: u64, points: u32, status: TaskStatus) -> Task {
        let mut t = Task::create(
            format_task_id(seq),
            NewTask::new(format!("task {seq}"), "agent").story_points(points),
            Utc::now(),
        );
        t.status = status;
        t
    }

    #[test]
    fn compute_counts_every_bucket() {
        let tasks = vec![
            task(1, 5, TaskStatus::Todo),
            task(2, 3, TaskStatus::InProgress),
            task(3, 8, TaskStatus::Done),
            task(4, 2, TaskStatus::Blocked),
            task(5, 1, TaskStatus::Done),
        ];
        let m = Metrics::compute(&tasks);
        assert_eq!(m.total_points, 19);
        assert_eq!(m.completed_points, 9);
        assert_eq!(
            m.tasks,
            TaskCounts { total: 5, todo: 1, in_progress: 1, done: 2, blocked: 1 }
        );
    }

    #[test]
    fn incremental_matches_scan() {
        let mut m = Metrics::default();
        m.record_created(5);
        m.record_created(3);
        m.record_transition(TaskStatus::Todo, TaskStatus::Done, 5);
        m.record_transition(TaskStatus::Todo, TaskStatus::Blocked, 3);
        m.record_transition(TaskStatus::Done, TaskStatus::InProgress, 5);

        let tasks = vec![task(1, 5, TaskStatus::InProgress), task(2, 3, TaskStatus::Blocked)];
        assert_eq!(m, Metrics::compute(&tasks));
    }

    #[test]
    fn same_status_transition_is_noop() {
        let mut m = Metrics::default();
        m.record_created(4);
        let before = m;
        m.record_transition(TaskStatus::Todo, TaskStatus::Todo, 4);
        assert_eq!(m, before);
    }

    #[test]
    fn percent_complete_zero_points() {
        assert_eq!(Metrics::default().percent_complete(), 0.0);
        let mut m = Metrics::default();
        m.record_created(4);
        m.record_transition(TaskStatus::Todo, TaskStatus::Done, 4);
        assert_eq!(m.percent_complete(), 100.0);
    }

    #[test]
    fn negative_cached_counters_deserialize() {
        let m: Metrics = serde_json::from_str(
            r#"{"total_points": 5, "completed_points": -5,
                "tasks": {"total": 1, "todo": 2, "in_progress": 0, "done": -1, "blocked": 0}}"#,
        )
        .unwrap();
        assert_eq!(m.tasks.done, -1);
        assert_eq!(m.completed_points, -5);
        assert_ne!(m, Metrics::compute(&[task(1, 5, TaskStatus::Todo)]));
    }

    #[test]
    fn decrement_from_negative_stops_at_zero() {
        let mut m = Metrics::default();
        m.tasks.done = -1;
        m.record_transition(TaskStatus::Done, TaskStatus::Todo, 3);
        assert_eq!(m.tasks.done, 0);
        assert_eq!(m.completed_points, 0);
        assert_eq!(m.tasks.todo, 1);
    }
}
