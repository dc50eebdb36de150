//! CLI command handlers.

pub mod metadata;
pub mod scripts;

use std::path::PathBuf;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Project root: `kiln.toml`, environment files, commands directory.
    pub project_dir: PathBuf,
    /// Directory scripts were loaded from.
    pub commands_dir: PathBuf,
    /// Verbose output enabled.
    pub verbose: bool,
}
