//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name
pub const CONFIG_FILE: &str = "litnb.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Main configuration struct matching the litnb.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Language whose cells can be exported, documented and executed
    #[serde(default = "default_primary_language")]
    pub primary_language: String,

    /// Stage names, in execution order
    #[serde(default = "default_stages")]
    pub stages: Vec<String>,

    #[serde(default)]
    pub exec: ExecConfig,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_primary_language() -> String {
    String::from("python")
}

fn default_stages() -> Vec<String> {
    [
        "populate_language",
        "insert_warning",
        "frontmatter",
        "add_show_docs",
        "exec_show_docs",
        "clean_show_doc",
        "hide",
        "hide_line",
        "rm_export",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

/// Settings for the embedded execution stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interpreter binary, looked up on PATH unless absolute
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// Code run once when the session starts
    #[serde(default = "default_prelude")]
    pub prelude: String,

    /// Cells containing this text are never executed
    #[serde(default = "default_bootstrap_marker")]
    pub bootstrap_marker: String,
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("python3")
}

fn default_prelude() -> String {
    String::from("from litnb_showdoc import show_doc")
}

fn default_bootstrap_marker() -> String {
    String::from("litnb_export()")
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interpreter: default_interpreter(),
            prelude: default_prelude(),
            bootstrap_marker: default_bootstrap_marker(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_language: default_primary_language(),
            stages: default_stages(),
            exec: ExecConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Parse configuration from YAML text; an empty document means defaults
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "primary_language".into(),
                message: "must not be empty".into(),
            });
        }
        if let Some(blank) = self.stages.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "stages".into(),
                message: format!("blank stage name {:?}", blank),
            });
        }
        Ok(())
    }

    /// Stage list with the execution stage removed when exec is disabled
    pub fn active_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .map(|s| s.as_str())
            .filter(|s| self.exec.enabled || *s != "exec_show_docs")
            .collect()
    }

    /// Resolve an arbitrary path relative to the config file location
    pub fn resolve_relative(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.components().count() == 1 {
            return path.to_path_buf();
        }
        match self.config_path.as_ref().and_then(|p| p.parent()) {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Interpreter path, resolved relative to the config file when it
    /// names a path rather than a bare binary
    pub fn interpreter(&self) -> PathBuf {
        self.resolve_relative(&self.exec.interpreter)
    }
}
