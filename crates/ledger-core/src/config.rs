use crate::error::Result;
use crate::paths;
use crate::types::Priority;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DefaultsConfig
// ---------------------------------------------------------------------------

/// Values `create` falls back to when the caller omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_story_points")]
    pub story_points: u32,
}

fn default_story_points() -> u32 {
    3
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            priority: Priority::default(),
            story_points: default_story_points(),
        }
    }
}

// ---------------------------------------------------------------------------
// FilesConfig
// ---------------------------------------------------------------------------

/// File names inside `.scrum/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_sprint_file")]
    pub sprint: String,
    #[serde(default = "default_log_file")]
    pub log: String,
}

fn default_sprint_file() -> String {
    paths::DEFAULT_SPRINT_FILE.to_string()
}

fn default_log_file() -> String {
    paths::DEFAULT_LOG_FILE.to_string()
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            sprint: default_sprint_file(),
            log: default_log_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "project".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            defaults: DefaultsConfig::default(),
            files: FilesConfig::default(),
        }
    }

    /// Load `.scrum/config.yaml`, falling back to defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Config {
                version: default_version(),
                ..Config::default()
            });
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn sprint_path(&self, root: &Path) -> PathBuf {
        paths::ledger_file(root, &self.files.sprint)
    }

    pub fn log_path(&self, root: &Path) -> PathBuf {
        paths::ledger_file(root, &self.files.log)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (key, name) in [("files.sprint", &self.files.sprint), ("files.log", &self.files.log)] {
            if name.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{key} is empty"),
                });
            } else if name.contains('/') || name.contains('\\') || name.starts_with('.') {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{key} '{name}' should be a plain file name inside .scrum/"),
                });
            }
        }

        if self.files.sprint == self.files.log {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "files.sprint and files.log point at the same file".to_string(),
            });
        }

        if self.defaults.story_points == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "defaults.story_points is 0; new tasks won't count toward velocity"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
