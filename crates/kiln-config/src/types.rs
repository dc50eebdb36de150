//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [commands]
//! dir = ".kiln/commands"
//! ignore = ["README.md", "*.txt"]
//! quiesce_timeout_secs = 30
//!
//! [logging]
//! file = true
//! level = "kiln=info"
//!
//! [project]            # metadata store, see `MetadataStore`
//! name = "demo"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default custom commands directory, relative to the project root.
pub const DEFAULT_COMMANDS_DIR: &str = ".kiln/commands";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Custom command (script plugin) configuration.
    pub commands: Option<CommandsConfig>,

    /// Log output configuration.
    pub logging: Option<LoggingConfig>,
}

impl KilnConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: KilnConfig) {
        if other.commands.is_some() {
            self.commands = other.commands;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// The effective `[commands]` section.
    pub fn commands(&self) -> CommandsConfig {
        self.commands.clone().unwrap_or_default()
    }

    /// The effective `[logging]` section.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Custom command discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Whether script commands are loaded at all.
    pub enabled: bool,
    /// Directory scanned (non-recursively) for scripts.
    /// Relative paths are resolved against the project directory.
    pub dir: PathBuf,
    /// Ignore rules: exact file names or glob patterns.
    pub ignore: Vec<String>,
    /// Upper bound on waiting for a script's deferred work after `run`.
    /// `None` waits until the work has drained, however long that takes.
    pub quiesce_timeout_secs: Option<u64>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_COMMANDS_DIR),
            ignore: Vec::new(),
            quiesce_timeout_secs: None,
        }
    }
}

impl CommandsConfig {
    /// Resolve the commands directory against a project directory.
    pub fn resolved_dir(&self, project_dir: &Path) -> PathBuf {
        if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            project_dir.join(&self.dir)
        }
    }

    /// The quiesce bound as a `Duration`.
    pub fn quiesce_timeout(&self) -> Option<Duration> {
        self.quiesce_timeout_secs.map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write a JSON log file under the user config directory.
    pub file: bool,
    /// Console filter directive used when neither `KILN_LOG` nor `--verbose` is set.
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: true,
            level: None,
        }
    }
}
