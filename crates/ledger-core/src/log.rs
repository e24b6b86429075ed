//! Append-only JSONL audit log of ledger transitions.
//!
//! Every line is one [`LogEntry`]: a timestamp plus an `action`-tagged event
//! with action-specific fields flattened alongside it. Entries are never
//! rewritten; the sprint document is a projection that [`crate::replay`] can
//! rebuild from them.

use crate::error::{LedgerError, Result};
use crate::metrics::Metrics;
use crate::task::StatusChange;
use crate::types::{Priority, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub task_id: String,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LogEvent {
    TaskCreated {
        task_id: String,
        title: String,
        agent: String,
        #[serde(default)]
        priority: Priority,
        story_points: u32,
    },
    TaskStarted(StatusTransition),
    TaskUpdated(StatusTransition),
    TaskCompleted(StatusTransition),
    TaskBlocked(StatusTransition),
    SprintStarted {
        sprint: u32,
        goal: String,
        #[serde(default)]
        start_date: Option<NaiveDate>,
        #[serde(default)]
        end_date: Option<NaiveDate>,
    },
    SprintCompleted {
        sprint: u32,
        total_points: i64,
        completed_points: i64,
        tasks_done: i64,
        tasks_total: i64,
    },
    MetricsReconciled {
        before: Metrics,
        after: Metrics,
    },
}

impl LogEvent {
    /// Pick the action name from the status the task moved into.
    pub fn status_change(task_id: &str, change: StatusChange, notes: &str) -> Self {
        let transition = StatusTransition {
            task_id: task_id.to_string(),
            old_status: change.old,
            new_status: change.new,
            notes: notes.to_string(),
        };
        match change.new {
            TaskStatus::InProgress => LogEvent::TaskStarted(transition),
            TaskStatus::Done => LogEvent::TaskCompleted(transition),
            TaskStatus::Blocked => LogEvent::TaskBlocked(transition),
            TaskStatus::Todo => LogEvent::TaskUpdated(transition),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            LogEvent::TaskCreated { .. } => "task_created",
            LogEvent::TaskStarted(_) => "task_started",
            LogEvent::TaskUpdated(_) => "task_updated",
            LogEvent::TaskCompleted(_) => "task_completed",
            LogEvent::TaskBlocked(_) => "task_blocked",
            LogEvent::SprintStarted { .. } => "sprint_started",
            LogEvent::SprintCompleted { .. } => "sprint_completed",
            LogEvent::MetricsReconciled { .. } => "metrics_reconciled",
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            LogEvent::TaskCreated { task_id, .. } => Some(task_id),
            LogEvent::TaskStarted(t)
            | LogEvent::TaskUpdated(t)
            | LogEvent::TaskCompleted(t)
            | LogEvent::TaskBlocked(t) => Some(&t.task_id),
            _ => None,
        }
    }

    pub fn transition(&self) -> Option<&StatusTransition> {
        match self {
            LogEvent::TaskStarted(t)
            | LogEvent::TaskUpdated(t)
            | LogEvent::TaskCompleted(t)
            | LogEvent::TaskBlocked(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// Only the timestamp, so lines with actions this build doesn't know still
/// participate in ordering.
#[derive(Deserialize)]
struct Stamp {
    timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LogScan {
    pub entries: Vec<LogEntry>,
    /// 1-based line numbers that are not JSON at all.
    pub malformed: Vec<usize>,
    /// 1-based line numbers that are JSON but not a known entry.
    pub unrecognized: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. The stored timestamp never precedes the last entry
    /// already in the file, so a single writer sees non-decreasing times even
    /// if the wall clock steps backwards.
    pub fn append(&self, event: LogEvent) -> Result<LogEntry> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp()? {
            Some(last) if last > now => last,
            _ => now,
        };
        let entry = LogEntry { timestamp, event };
        let line = serde_json::to_string(&entry)?;
        crate::io::append_line(&self.path, &line)?;
        debug!(action = entry.event.action(), path = %self.path.display(), "appended log entry");
        Ok(entry)
    }

    pub fn append_all(&self, events: Vec<LogEvent>) -> Result<Vec<LogEntry>> {
        events.into_iter().map(|e| self.append(e)).collect()
    }

    pub fn last_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(data
            .lines()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .find_map(|l| serde_json::from_str::<Stamp>(l).ok())
            .map(|s| s.timestamp))
    }

    /// Strict read: any line that is not a known entry is an error.
    pub fn read(&self) -> Result<Vec<LogEntry>> {
        let scan = self.scan()?;
        if let Some(line) = scan.malformed.iter().chain(&scan.unrecognized).min() {
            return Err(LedgerError::InvalidDocument {
                path: self.path.display().to_string(),
                reason: format!("line {line} is not a valid log entry"),
            });
        }
        Ok(scan.entries)
    }

    /// Lenient read: collect what parses, note what doesn't.
    pub fn scan(&self) -> Result<LogScan> {
        let mut scan = LogScan::default();
        if !self.path.exists() {
            return Ok(scan);
        }
        let data = std::fs::read_to_string(&self.path)?;
        for (idx, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(line = idx + 1, error = %e, "malformed log line");
                    scan.malformed.push(idx + 1);
                    continue;
                }
            };
            match serde_json::from_value::<LogEntry>(value) {
                Ok(entry) => scan.entries.push(entry),
                Err(_) => scan.unrecognized.push(idx + 1),
            }
        }
        Ok(scan)
    }

    pub fn tail(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let mut entries = self.scan()?.entries;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn created(id: &str) -> LogEvent {
        LogEvent::TaskCreated {
            task_id: id.into(),
            title: "Add login".into(),
            agent: "FastAPI Agent".into(),
            priority: Priority::P0,
            story_points: 5,
        }
    }

    #[test]
    fn entry_serializes_flat() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            event: LogEvent::status_change(
                "TASK-001",
                StatusChange { old: TaskStatus::InProgress, new: TaskStatus::Done },
                "shipped",
            ),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], "task_completed");
        assert_eq!(value["task_id"], "TASK-001");
        assert_eq!(value["old_status"], "IN_PROGRESS");
        assert_eq!(value["new_status"], "DONE");
        assert_eq!(value["notes"], "shipped");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn action_follows_new_status() {
        let cases = [
            (TaskStatus::InProgress, "task_started"),
            (TaskStatus::Done, "task_completed"),
            (TaskStatus::Blocked, "task_blocked"),
            (TaskStatus::Todo, "task_updated"),
        ];
        for (new, action) in cases {
            let change = StatusChange { old: TaskStatus::Todo, new };
            assert_eq!(LogEvent::status_change("TASK-001", change, "").action(), action);
        }
    }

    #[test]
    fn append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("sprint-log.jsonl"));
        log.append(created("TASK-001")).unwrap();
        log.append(created("TASK-002")).unwrap();

        let entries = log.read().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event.task_id(), Some("TASK-002"));
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sprint-log.jsonl");
        let future = Utc::now() + chrono::Duration::hours(1);
        let seeded = LogEntry { timestamp: future, event: created("TASK-001") };
        std::fs::write(&path, format!("{}\n", serde_json::to_string(&seeded).unwrap())).unwrap();

        let log = EventLog::new(&path);
        let appended = log.append(created("TASK-002")).unwrap();
        assert_eq!(appended.timestamp, future);
    }

    #[test]
    fn scan_separates_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sprint-log.jsonl");
        let log = EventLog::new(&path);
        log.append(created("TASK-001")).unwrap();
        crate::io::append_line(&path, "{not json").unwrap();
        crate::io::append_line(
            &path,
            r#"{"timestamp":"2025-01-01T00:00:00Z","action":"sprint_planned"}"#,
        )
        .unwrap();

        let scan = log.scan().unwrap();
        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.malformed, vec![2]);
        assert_eq!(scan.unrecognized, vec![3]);
        assert!(matches!(log.read(), Err(LedgerError::InvalidDocument { .. })));
    }

    #[test]
    fn tail_returns_latest() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("sprint-log.jsonl"));
        for i in 1..=5 {
            log.append(created(&format!("TASK-00{i}"))).unwrap();
        }
        let tail = log.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].event.task_id(), Some("TASK-004"));
        assert!(log.tail(50).unwrap().len() == 5);
    }
}
