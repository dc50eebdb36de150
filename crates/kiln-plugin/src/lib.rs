//! Script plugin host for kiln.
//!
//! Users extend the CLI by dropping JavaScript files into the project's
//! commands directory. Each script calls `Command({...})` from the `kiln`
//! module once at load time; the host turns that registration into a clap
//! subcommand and, when the user invokes it, calls the script's `run`
//! callback and waits for its deferred work to finish.
//!
//! # Layout
//!
//! ```text
//! .kiln/commands/
//!   greet.js         # -> `kiln custom greet`
//!   release notes.js # -> `kiln custom releasenotes`
//!   README.md        # skipped when listed in [commands] ignore
//! ```
//!
//! # Script shape
//!
//! ```js
//! const { Command } = require("kiln");
//!
//! Command({
//!   short: "Say hello",
//!   alias: ["hi"],
//!   flags: [{ name: "name", type: "string", default: "world" }],
//!   run: (ctx) => console.log("hi", ctx.Flags().get("name")),
//! });
//! ```

pub mod binding;
pub mod descriptor;
pub mod discovery;
pub mod host;
pub mod invoke;
pub mod registry;
pub mod runtime;
mod timers;

use std::path::PathBuf;

pub use binding::{BoundCommand, BoundFlag, HostOptions, LoadReport, SkippedScript, load_commands};
pub use descriptor::{CommandDescriptor, FlagDescriptor, FlagKind, FlagValue};
pub use discovery::{IgnoreRule, discover};
pub use host::{ConsoleSink, HostState};
pub use invoke::Invocation;
pub use runtime::{Interpreter, QuiesceReport};

/// Plugin error type.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// IO error reading a script file.
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    /// The commands directory exists but could not be listed.
    #[error("failed to list commands directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The interpreter could not be created or equipped with host modules.
    #[error("interpreter setup failed: {0}")]
    Interpreter(String),

    /// Evaluating the script text raised an error.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The script finished evaluating without calling `Command`.
    #[error("script did not register a command")]
    NotRegistered,

    /// A registered flag could not be turned into a CLI flag.
    #[error("invalid flag: {0}")]
    Binding(String),

    /// The derived command name or an alias is already taken.
    #[error("command name '{name}' is already used by {existing}")]
    DuplicateCommand { name: String, existing: PathBuf },

    /// No usable command name could be derived from the file name.
    #[error("cannot derive a command name from the file name")]
    InvalidName,
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

impl From<rquickjs::Error> for PluginError {
    fn from(err: rquickjs::Error) -> Self {
        PluginError::Interpreter(err.to_string())
    }
}
