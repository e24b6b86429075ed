//! Rebuild the sprint projection from the event log.
//!
//! Only entries after the most recent `sprint_started` belong to the current
//! sprint. Fields the log never records (context, acceptance criteria,
//! dependencies) are copied from the stored document when it still has the
//! task.

use crate::log::{LogEntry, LogEvent};
use crate::metrics::Metrics;
use crate::sprint::Sprint;
use crate::task::{NewTask, Task};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Replay {
    pub sprint: Sprint,
    /// Transitions naming a task that was never created in this sprint.
    pub orphaned: Vec<String>,
    /// Transitions whose recorded old status disagrees with the projection.
    pub out_of_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDiff {
    pub task_id: String,
    pub problem: String,
}

pub fn replay(entries: &[LogEntry], stored: &Sprint) -> Replay {
    let start = entries
        .iter()
        .rposition(|e| matches!(e.event, LogEvent::SprintStarted { .. }))
        .map_or(0, |i| i + 1);

    let mut tasks: Vec<Task> = Vec::new();
    let mut orphaned = Vec::new();
    let mut out_of_order = Vec::new();

    for entry in &entries[start..] {
        match &entry.event {
            LogEvent::TaskCreated {
                task_id,
                title,
                agent,
                priority,
                story_points,
            } => {
                let mut spec = NewTask::new(title.clone(), agent.clone())
                    .priority(*priority)
                    .story_points(*story_points);
                if let Ok(known) = stored.task(task_id) {
                    spec.context = known.context.clone();
                    spec.acceptance_criteria = known.acceptance_criteria.clone();
                    spec.dependencies = known.dependencies.clone();
                }
                tasks.push(Task::create(task_id.clone(), spec, entry.timestamp));
            }
            event => {
                let Some(t) = event.transition() else {
                    continue;
                };
                let Some(task) = tasks.iter_mut().find(|task| task.id == t.task_id) else {
                    warn!(task_id = %t.task_id, "log transition for unknown task");
                    orphaned.push(t.task_id.clone());
                    continue;
                };
                if task.status != t.old_status {
                    out_of_order.push(t.task_id.clone());
                }
                // The permissive policy never refuses, and a tightened one
                // should not stop a replay of history that already happened.
                if task.apply_status(t.new_status, &t.notes, entry.timestamp).is_err() {
                    task.status = t.new_status;
                }
            }
        }
    }

    let mut sprint = stored.clone();
    sprint.metrics = Metrics::compute(&tasks);
    sprint.tasks = tasks;
    sprint.next_task_seq = stored.last_task_seq().max(sprint.last_task_seq());
    Replay {
        sprint,
        orphaned,
        out_of_order,
    }
}

/// Differences between the stored document and a replayed projection.
pub fn diff(stored: &Sprint, rebuilt: &Sprint) -> Vec<TaskDiff> {
    let mut out = Vec::new();
    let mut push = |id: &str, problem: String| {
        out.push(TaskDiff {
            task_id: id.to_string(),
            problem,
        })
    };

    for task in &stored.tasks {
        let Ok(other) = rebuilt.task(&task.id) else {
            push(&task.id, "in document but never logged".to_string());
            continue;
        };
        if task.status != other.status {
            push(
                &task.id,
                format!("status {} in document, {} in log", task.status, other.status),
            );
        }
        if task.story_points != other.story_points {
            push(
                &task.id,
                format!(
                    "story_points {} in document, {} in log",
                    task.story_points, other.story_points
                ),
            );
        }
        if task.title != other.title || task.agent != other.agent || task.priority != other.priority {
            push(&task.id, "title, agent or priority differs from log".to_string());
        }
    }
    for task in &rebuilt.tasks {
        if stored.task(&task.id).is_err() {
            push(&task.id, "logged but missing from document".to_string());
        }
    }
    out
}
