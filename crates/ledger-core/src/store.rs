//! File-backed ledger: the sprint document plus its event log, guarded for a
//! single writer.
//!
//! Every mutation runs read-modify-write under an exclusive advisory lock on
//! `.scrum/sprint.lock`. Tools that edit the document without taking the lock
//! (an editor, `jq`) are caught by comparing the bytes on disk just before the
//! atomic replace; the update is then refused with [`LedgerError::Conflict`]
//! instead of silently clobbering their change.

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::log::{EventLog, LogEvent};
use crate::paths;
use crate::sprint::{ReconcileReport, Sprint};
use crate::task::{NewTask, StatusChange};
use crate::types::TaskStatus;
use chrono::NaiveDate;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Held for the duration of one ledger operation.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Parameters for opening a new sprint.
#[derive(Debug, Clone, Default)]
pub struct SprintPlan {
    /// Defaults to the current sprint number plus one.
    pub number: Option<u32>,
    pub goal: String,
    pub epic: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub created_config: bool,
    pub created_sprint: bool,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    root: PathBuf,
    config: Config,
}

impl Ledger {
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        Ok(Self::with_config(root, config))
    }

    pub fn with_config(root: &Path, config: Config) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// Create `.scrum/` with a config and an empty first sprint. Existing
    /// files are left alone, so running it twice is harmless.
    pub fn init(root: &Path, project: &str) -> Result<(Self, InitReport)> {
        std::fs::create_dir_all(paths::scrum_dir(root))?;
        let config_path = paths::config_path(root);
        let created_config = !config_path.exists();
        if created_config {
            Config::new(project).save(root)?;
        }
        let ledger = Self::open(root)?;

        let sprint_path = ledger.sprint_path();
        let sprint = Sprint::new(1, "");
        let created_sprint = crate::io::write_if_missing(&sprint_path, sprint.to_json()?.as_bytes())?;
        if created_sprint {
            ledger.log().append(LogEvent::SprintStarted {
                sprint: 1,
                goal: String::new(),
                start_date: None,
                end_date: None,
            })?;
        }
        crate::io::write_if_missing(&paths::ignore_path(root), b"sprint.lock\n")?;
        info!(root = %root.display(), created_config, created_sprint, "initialized ledger");
        Ok((
            ledger,
            InitReport {
                created_config,
                created_sprint,
            },
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sprint_path(&self) -> PathBuf {
        self.config.sprint_path(&self.root)
    }

    pub fn log(&self) -> EventLog {
        EventLog::new(self.config.log_path(&self.root))
    }

    pub fn is_initialized(&self) -> bool {
        self.sprint_path().exists()
    }

    // -----------------------------------------------------------------------
    // Locking
    // -----------------------------------------------------------------------

    fn lock_file(&self) -> Result<File> {
        if !paths::scrum_dir(&self.root).is_dir() {
            return Err(LedgerError::NotInitialized);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(paths::lock_path(&self.root))?;
        Ok(file)
    }

    fn lock_exclusive(&self) -> Result<LockGuard> {
        let file = self.lock_file()?;
        FileExt::lock_exclusive(&file).map_err(|e| LedgerError::Lock(e.to_string()))?;
        Ok(LockGuard { file })
    }

    fn lock_shared(&self) -> Result<LockGuard> {
        let file = self.lock_file()?;
        FileExt::lock_shared(&file).map_err(|e| LedgerError::Lock(e.to_string()))?;
        Ok(LockGuard { file })
    }

    // -----------------------------------------------------------------------
    // Read / write
    // -----------------------------------------------------------------------

    /// Read the current sprint document.
    pub fn load(&self) -> Result<Sprint> {
        let _guard = self.lock_shared()?;
        Sprint::load(&self.sprint_path())
    }

    fn read_raw(&self) -> Result<(String, Sprint)> {
        let path = self.sprint_path();
        if !path.exists() {
            return Err(LedgerError::NotInitialized);
        }
        let raw = std::fs::read_to_string(&path)?;
        let sprint = Sprint::parse(&raw).map_err(|e| LedgerError::InvalidDocument {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok((raw, sprint))
    }

    /// Replace the document, provided nobody touched it since `base` was read.
    fn write(&self, sprint: &mut Sprint, base: &str) -> Result<()> {
        let path = self.sprint_path();
        let on_disk = std::fs::read_to_string(&path)?;
        if on_disk != base {
            warn!(path = %path.display(), "sprint document changed during update");
            return Err(LedgerError::Conflict {
                path: path.display().to_string(),
            });
        }
        sprint.revision += 1;
        crate::io::atomic_write(&path, sprint.to_json()?.as_bytes())?;
        debug!(revision = sprint.revision, "wrote sprint document");
        Ok(())
    }

    /// Run one read-modify-write cycle.
    ///
    /// If `f` fails nothing is written and nothing is logged. Otherwise the
    /// document is replaced first and the events returned by `f` are appended
    /// to the log after it.
    pub fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Sprint) -> Result<(T, Vec<LogEvent>)>,
    {
        let _guard = self.lock_exclusive()?;
        let (raw, mut sprint) = self.read_raw()?;
        let (value, events) = f(&mut sprint)?;
        self.write(&mut sprint, &raw)?;
        self.log().append_all(events)?;
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub fn create_task(&self, spec: NewTask) -> Result<String> {
        self.mutate(|sprint| {
            let (id, event) = sprint.create_task(spec)?;
            Ok((id, vec![event]))
        })
    }

    pub fn update_status(&self, id: &str, status: TaskStatus, notes: &str) -> Result<StatusChange> {
        self.mutate(|sprint| {
            let (change, event) = sprint.update_status(id, status, notes)?;
            Ok((change, vec![event]))
        })
    }

    /// Recompute metrics. The document and log are only touched when the
    /// stored metrics had drifted.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let _guard = self.lock_exclusive()?;
        let (raw, mut sprint) = self.read_raw()?;
        let report = sprint.reconcile();
        if report.drifted {
            warn!(before = ?report.before, after = ?report.after, "repairing metric drift");
            self.write(&mut sprint, &raw)?;
            self.log().append(LogEvent::MetricsReconciled {
                before: report.before,
                after: report.after,
            })?;
        }
        Ok(report)
    }

    /// Replace the current sprint with a fresh one.
    ///
    /// Refuses while the current sprint has unfinished tasks unless `force`.
    /// The task id counter carries over so ids stay unique across sprints.
    pub fn start_sprint(&self, plan: SprintPlan, force: bool) -> Result<Sprint> {
        let _guard = self.lock_exclusive()?;
        let path = self.sprint_path();
        let current = if path.exists() {
            Some(self.read_raw()?)
        } else {
            None
        };

        let (number, last_seq, revision) = match &current {
            Some((_, cur)) => {
                let open = cur.open_tasks();
                if open > 0 && !force {
                    return Err(LedgerError::SprintInProgress {
                        sprint: cur.sprint,
                        open,
                    });
                }
                (
                    plan.number.unwrap_or(cur.sprint + 1),
                    cur.last_task_seq(),
                    cur.revision,
                )
            }
            None => (plan.number.unwrap_or(1), 0, 0),
        };

        let mut sprint = Sprint::new(number, plan.goal);
        sprint.epic = plan.epic;
        sprint.start_date = plan.start_date;
        sprint.end_date = plan.end_date;
        sprint.next_task_seq = last_seq;
        sprint.revision = revision;

        match &current {
            Some((raw, _)) => self.write(&mut sprint, raw)?,
            None => {
                sprint.revision += 1;
                crate::io::atomic_write(&path, sprint.to_json()?.as_bytes())?;
            }
        }
        self.log().append(LogEvent::SprintStarted {
            sprint: sprint.sprint,
            goal: sprint.goal.clone(),
            start_date: sprint.start_date,
            end_date: sprint.end_date,
        })?;
        info!(sprint = sprint.sprint, "started sprint");
        Ok(sprint)
    }

    /// Snapshot the current sprint into the archive and log its completion.
    ///
    /// A sprint completes once; a second call fails and leaves the archive
    /// and log as they were.
    pub fn complete_sprint(&self) -> Result<(Sprint, PathBuf)> {
        let _guard = self.lock_exclusive()?;
        let (_, sprint) = self.read_raw()?;
        if self.is_completed(sprint.sprint)? {
            return Err(LedgerError::SprintAlreadyCompleted(sprint.sprint));
        }
        let archive = paths::archive_path(&self.root, sprint.sprint);
        if archive.exists() {
            warn!(path = %archive.display(), "overwriting existing sprint archive");
        }
        crate::io::atomic_write(&archive, sprint.to_json()?.as_bytes())?;

        // Report what the tasks say, not what the cache says.
        let metrics = crate::metrics::Metrics::compute(&sprint.tasks);
        self.log().append(LogEvent::SprintCompleted {
            sprint: sprint.sprint,
            total_points: metrics.total_points,
            completed_points: metrics.completed_points,
            tasks_done: metrics.tasks.done,
            tasks_total: metrics.tasks.total,
        })?;
        info!(sprint = sprint.sprint, archive = %archive.display(), "completed sprint");
        Ok((sprint, archive))
    }

    /// Whether the most recent sprint boundary in the log completes `sprint`.
    fn is_completed(&self, sprint: u32) -> Result<bool> {
        let entries = self.log().scan()?.entries;
        let boundary = entries.iter().rev().find_map(|e| match e.event {
            LogEvent::SprintStarted { .. } => Some(None),
            LogEvent::SprintCompleted { sprint, .. } => Some(Some(sprint)),
            _ => None,
        });
        Ok(boundary.flatten() == Some(sprint))
    }

    /// Replace tasks and metrics with a projection rebuilt elsewhere.
    pub fn replace_tasks(&self, rebuilt: Sprint) -> Result<Sprint> {
        self.mutate(|sprint| {
            sprint.tasks = rebuilt.tasks;
            sprint.metrics = rebuilt.metrics;
            sprint.next_task_seq = sprint.next_task_seq.max(rebuilt.next_task_seq);
            Ok((sprint.clone(), Vec::new()))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::types::Priority;
    use tempfile::TempDir;

    fn ledger(dir: &TempDir) -> Ledger {
        Ledger::init(dir.path(), "test").unwrap().0
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (_, first) = Ledger::init(dir.path(), "test").unwrap();
        assert!(first.created_config && first.created_sprint);
        let (l, second) = Ledger::init(dir.path(), "test").unwrap();
        assert!(!second.created_config && !second.created_sprint);
        assert_eq!(l.log().read().unwrap().len(), 1);
    }

    #[test]
    fn operations_persist_and_log() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir);
        let id = l
            .create_task(NewTask::new("Add login", "FastAPI Agent").priority(Priority::P0).story_points(5))
            .unwrap();
        l.update_status(&id, TaskStatus::InProgress, "").unwrap();
        l.update_status(&id, TaskStatus::Done, "shipped").unwrap();

        let sprint = l.load().unwrap();
        assert_eq!(sprint.revision, 3);
        assert_eq!(sprint.metrics, Metrics::compute(&sprint.tasks));
        assert_eq!(sprint.metrics.completed_points, 5);

        let actions: Vec<&str> = l
            .log()
            .read()
            .unwrap()
            .iter()
            .map(|e| e.event.action())
            .collect();
        assert_eq!(
            actions,
            ["sprint_started", "task_created", "task_started", "task_completed"]
        );
    }

    #[test]
    fn not_found_leaves_files_byte_identical() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir);
        l.create_task(NewTask::new("a", "b")).unwrap();
        let doc = std::fs::read(l.sprint_path()).unwrap();
        let log = std::fs::read(l.log().path()).unwrap();

        let err = l.update_status("TASK-9999", TaskStatus::Done, "").unwrap_err();
        assert!(matches!(err, LedgerError::TaskNotFound(_)));
        assert_eq!(std::fs::read(l.sprint_path()).unwrap(), doc);
        assert_eq!(std::fs::read(l.log().path()).unwrap(), log);
    }

    #[test]
    fn concurrent_external_edit_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir);
        let path = l.sprint_path();
        let err = l
            .mutate(|sprint| {
                // Another writer replaces the file mid-update.
                let mut other = sprint.clone();
                other.goal = "someone else".into();
                std::fs::write(&path, other.to_json()?).unwrap();
                sprint.goal = "mine".into();
                Ok(((), Vec::new()))
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
        assert_eq!(l.load().unwrap().goal, "someone else");
    }

    #[test]
    fn reconcile_writes_only_on_drift() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir);
        l.create_task(NewTask::new("a", "b")).unwrap();

        let clean = std::fs::read(l.sprint_path()).unwrap();
        assert!(!l.reconcile().unwrap().drifted);
        assert_eq!(std::fs::read(l.sprint_path()).unwrap(), clean);

        let mut sprint = l.load().unwrap();
        sprint.metrics.tasks.done = 9;
        std::fs::write(l.sprint_path(), sprint.to_json().unwrap()).unwrap();

        let report = l.reconcile().unwrap();
        assert!(report.drifted);
        let repaired = l.load().unwrap();
        assert_eq!(repaired.metrics, Metrics::compute(&repaired.tasks));
        assert_eq!(
            l.log().read().unwrap().last().unwrap().event.action(),
            "metrics_reconciled"
        );

        let once = std::fs::read(l.sprint_path()).unwrap();
        l.reconcile().unwrap();
        assert_eq!(std::fs::read(l.sprint_path()).unwrap(), once);
    }

    #[test]
    fn start_sprint_refuses_unfinished_work() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir);
        let id = l.create_task(NewTask::new("a", "b")).unwrap();

        let plan = SprintPlan {
            goal: "next".into(),
            ..SprintPlan::default()
        };
        assert!(matches!(
            l.start_sprint(plan.clone(), false),
            Err(LedgerError::SprintInProgress { open: 1, .. })
        ));

        l.update_status(&id, TaskStatus::Done, "").unwrap();
        let (_, archive) = l.complete_sprint().unwrap();
        assert!(archive.ends_with("sprint-1.json"));

        let next = l.start_sprint(plan, false).unwrap();
        assert_eq!(next.sprint, 2);
        assert!(next.tasks.is_empty());

        let fresh = l.create_task(NewTask::new("c", "d")).unwrap();
        assert_ne!(fresh, id);
    }

    #[test]
    fn reconcile_repairs_negative_counters() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir);
        l.create_task(NewTask::new("a", "b").story_points(2)).unwrap();

        let raw = std::fs::read_to_string(l.sprint_path()).unwrap();
        let broken = raw.replacen("\"done\": 0", "\"done\": -1", 1);
        assert_ne!(broken, raw);
        std::fs::write(l.sprint_path(), broken).unwrap();

        let report = l.reconcile().unwrap();
        assert!(report.drifted);
        assert_eq!(report.before.tasks.done, -1);
        assert_eq!(report.after.tasks.done, 0);
        let repaired = l.load().unwrap();
        assert_eq!(repaired.metrics, Metrics::compute(&repaired.tasks));

        // The repaired document accepts new work.
        l.create_task(NewTask::new("c", "d")).unwrap();
        assert_eq!(l.load().unwrap().metrics.tasks.total, 2);
    }

    #[test]
    fn complete_sprint_only_once() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir);
        let id = l.create_task(NewTask::new("a", "b")).unwrap();
        l.update_status(&id, TaskStatus::Done, "").unwrap();
        let (_, archive) = l.complete_sprint().unwrap();

        let archived = std::fs::read(&archive).unwrap();
        let log = std::fs::read(l.log().path()).unwrap();
        assert!(matches!(
            l.complete_sprint(),
            Err(LedgerError::SprintAlreadyCompleted(1))
        ));
        assert_eq!(std::fs::read(&archive).unwrap(), archived);
        assert_eq!(std::fs::read(l.log().path()).unwrap(), log);

        let plan = SprintPlan {
            goal: "next".into(),
            ..SprintPlan::default()
        };
        l.start_sprint(plan, false).unwrap();
        let (next, _) = l.complete_sprint().unwrap();
        assert_eq!(next.sprint, 2);
    }

    #[test]
    fn init_keeps_lock_out_of_git_inside_scrum_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target\n").unwrap();
        ledger(&dir);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".gitignore")).unwrap(),
            "target\n"
        );
        assert_eq!(
            std::fs::read_to_string(paths::ignore_path(dir.path())).unwrap(),
            "sprint.lock\n"
        );
    }

    #[test]
    fn uninitialized_root() {
        let dir = TempDir::new().unwrap();
        let l = Ledger::open(dir.path()).unwrap();
        assert!(!l.is_initialized());
        assert!(matches!(l.load(), Err(LedgerError::NotInitialized)));
        assert!(matches!(
            l.create_task(NewTask::new("a", "b")),
            Err(LedgerError::NotInitialized)
        ));
    }
}
