//! Script discovery in the commands directory.

use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::{PluginError, Result};

/// A file name the loader should skip.
#[derive(Debug, Clone)]
pub enum IgnoreRule {
    /// Skip the file with exactly this name.
    Exact(String),
    /// Skip every file whose name matches.
    Glob(Pattern),
}

impl IgnoreRule {
    /// Parse a rule. Anything with glob metacharacters is a pattern; a
    /// pattern that does not compile is taken literally.
    pub fn parse(rule: &str) -> Self {
        if rule.contains(['*', '?', '[']) {
            match Pattern::new(rule) {
                Ok(pattern) => return Self::Glob(pattern),
                Err(e) => {
                    tracing::debug!(rule, error = %e, "ignore rule is not a valid glob, matching literally");
                }
            }
        }
        Self::Exact(rule.to_string())
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Self::Exact(name) => name == file_name,
            Self::Glob(pattern) => pattern.matches(file_name),
        }
    }
}

/// List the script files directly inside `root`, sorted by file name.
///
/// A missing directory yields no scripts. Subdirectories and ignored names
/// are left out.
pub fn discover(root: &Path, ignore: &[IgnoreRule]) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %root.display(), "commands directory does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(PluginError::Discovery {
                path: root.to_path_buf(),
                source,
            });
        }
    };

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PluginError::Discovery {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if ignore.iter().any(|rule| rule.matches(&name)) {
            tracing::trace!(file = %name, "ignored by rule");
            continue;
        }
        scripts.push(path);
    }
    scripts.sort();
    Ok(scripts)
}
