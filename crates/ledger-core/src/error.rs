use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("not initialized: run 'scrum init'")]
    NotInitialized,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid document {path}: {reason}")]
    InvalidDocument { path: String, reason: String },

    #[error("{path} was modified by another writer during the update; nothing was written, retry the command")]
    Conflict { path: String },

    #[error("sprint {sprint} still has {open} unfinished task(s); complete it first or pass --force")]
    SprintInProgress { sprint: u32, open: usize },

    #[error("sprint {0} is already completed; start the next one with 'scrum sprint start'")]
    SprintAlreadyCompleted(u32),

    #[error("failed to acquire ledger lock: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
