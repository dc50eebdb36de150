//! Dotenv-style environment files.
//!
//! Files are read from the project directory in [`ENV_FILES`] order, later
//! files overriding earlier ones. Only lines that begin with [`ENV_PREFIX`]
//! are imported; everything else (including unprefixed assignments and
//! comments) is ignored.

use std::collections::BTreeMap;
use std::path::Path;

/// Reserved key prefix for variables imported from environment files.
pub const ENV_PREFIX: &str = "KILN_";

/// Environment files in precedence order (lowest first).
pub const ENV_FILES: [&str; 2] = [".env", ".env.local"];

/// Load prefixed variables from the project's environment files.
///
/// Missing files are skipped; unreadable files are logged and skipped.
pub fn load_env_files(project_dir: &Path) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    for name in ENV_FILES {
        let path = project_dir.join(name);
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let before = vars.len();
                vars.extend(parse_env_file(&contents));
                tracing::debug!(
                    file = %path.display(),
                    new_keys = vars.len() - before,
                    "loaded environment file"
                );
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "failed to read environment file");
            }
        }
    }

    vars
}

/// Process environment overlaid with the project's prefixed environment files.
pub fn merged_env(project_dir: &Path) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = std::env::vars().collect();
    env.extend(load_env_files(project_dir));
    env
}

/// Parse the prefixed `KEY=value` assignments of one file.
pub fn parse_env_file(contents: &str) -> Vec<(String, String)> {
    contents.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    if !line.starts_with(ENV_PREFIX) {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
