use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SCRUM_DIR: &str = ".scrum";
pub const ARCHIVE_DIR: &str = ".scrum/archive";

pub const CONFIG_FILE: &str = ".scrum/config.yaml";
pub const LOCK_FILE: &str = ".scrum/sprint.lock";
pub const IGNORE_FILE: &str = ".scrum/.gitignore";

pub const DEFAULT_SPRINT_FILE: &str = "current-sprint.json";
pub const DEFAULT_LOG_FILE: &str = "sprint-log.jsonl";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn scrum_dir(root: &Path) -> PathBuf {
    root.join(SCRUM_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

/// Ignore rules scoped to `.scrum/`; the project's own `.gitignore` is never touched.
pub fn ignore_path(root: &Path) -> PathBuf {
    root.join(IGNORE_FILE)
}

/// A file named in the config, resolved inside `.scrum/`.
pub fn ledger_file(root: &Path, name: &str) -> PathBuf {
    scrum_dir(root).join(name)
}

pub fn archive_path(root: &Path, sprint: u32) -> PathBuf {
    root.join(ARCHIVE_DIR).join(format!("sprint-{sprint}.json"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.scrum/config.yaml")
        );
        assert_eq!(
            ledger_file(root, DEFAULT_SPRINT_FILE),
            PathBuf::from("/tmp/proj/.scrum/current-sprint.json")
        );
        assert_eq!(
            archive_path(root, 4),
            PathBuf::from("/tmp/proj/.scrum/archive/sprint-4.json")
        );
    }
}
