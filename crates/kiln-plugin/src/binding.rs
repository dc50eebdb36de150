//! Dynamic CLI binding: scripts in, clap subcommands out.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use kiln_config::CommandsConfig;

use crate::descriptor::{CommandDescriptor, FlagDescriptor, FlagKind, FlagValue};
use crate::discovery::{IgnoreRule, discover};
use crate::host::{ConsoleSink, HostState};
use crate::invoke::{Invocation, invoke};
use crate::runtime::Interpreter;
use crate::{PluginError, Result};

/// Argument id holding a bound command's positional arguments.
pub const ARGS_ID: &str = "__args";

/// Subcommand names clap reserves for itself.
const RESERVED_NAMES: &[&str] = &["help"];

/// Where scripts come from and how they run.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Project root: metadata store and environment files live here.
    pub project_dir: PathBuf,
    /// Directory scanned for scripts.
    pub commands_dir: PathBuf,
    /// Ignore rules, exact names or glob patterns.
    pub ignore: Vec<String>,
    /// Bound on waiting for deferred work after `run`; `None` waits forever.
    pub quiesce_timeout: Option<Duration>,
    /// Destination of script console output.
    pub console: ConsoleSink,
}

impl HostOptions {
    pub fn new(project_dir: impl Into<PathBuf>, commands_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            commands_dir: commands_dir.into(),
            ignore: Vec::new(),
            quiesce_timeout: None,
            console: ConsoleSink::default(),
        }
    }

    /// Options for `project_dir` as configured by a `[commands]` section.
    pub fn from_config(project_dir: &Path, config: &CommandsConfig) -> Self {
        Self {
            ignore: config.ignore.clone(),
            quiesce_timeout: config.quiesce_timeout(),
            ..Self::new(project_dir, config.resolved_dir(project_dir))
        }
    }

    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_console(mut self, console: ConsoleSink) -> Self {
        self.console = console;
        self
    }

    pub fn with_quiesce_timeout(mut self, timeout: Duration) -> Self {
        self.quiesce_timeout = Some(timeout);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// A script that contributes no subcommand, and why.
#[derive(Debug)]
pub struct SkippedScript {
    pub path: PathBuf,
    pub error: PluginError,
}

/// Everything found in the commands directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Bound commands in file name order.
    pub commands: Vec<BoundCommand>,
    pub skipped: Vec<SkippedScript>,
}

impl LoadReport {
    /// Find a bound command by its name.
    pub fn find(&self, name: &str) -> Option<&BoundCommand> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// Discover, evaluate and bind every script under `options.commands_dir`.
///
/// Scripts are processed one at a time in file name order. A script that
/// cannot be read, fails to evaluate, registers nothing, declares an
/// unusable flag, or claims a name already taken is skipped and reported.
pub fn load_commands(options: &HostOptions) -> LoadReport {
    let mut report = LoadReport::default();

    let rules: Vec<IgnoreRule> = options.ignore.iter().map(|r| IgnoreRule::parse(r)).collect();
    let files = match discover(&options.commands_dir, &rules) {
        Ok(files) => files,
        Err(error) => {
            report.skipped.push(SkippedScript {
                path: options.commands_dir.clone(),
                error,
            });
            return report;
        }
    };

    // Names (and aliases) already claimed, with the file that claimed them
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();

    for path in files {
        match load_script(&path, options).and_then(|bound| claim(&mut claimed, bound)) {
            Ok(bound) => {
                tracing::debug!(
                    command = %bound.name,
                    script = %path.display(),
                    flags = bound.flags.len(),
                    "bound script command"
                );
                report.commands.push(bound);
            }
            Err(error) => {
                tracing::warn!(script = %path.display(), error = %error, "skipping script");
                report.skipped.push(SkippedScript { path, error });
            }
        }
    }

    tracing::info!(
        bound = report.commands.len(),
        skipped = report.skipped.len(),
        dir = %options.commands_dir.display(),
        "loaded script commands"
    );
    report
}

/// Evaluate one script and bind its registration.
pub fn load_script(path: &Path, options: &HostOptions) -> Result<BoundCommand> {
    let name = command_name(path).ok_or(PluginError::InvalidName)?;
    let source = std::fs::read_to_string(path)?;

    let state =
        HostState::new(path, &options.project_dir).with_console(options.console.clone());
    let interpreter = Interpreter::new(state)?;
    let descriptor = interpreter
        .evaluate(&source)?
        .ok_or(PluginError::NotRegistered)?;

    let flags = bind_flags(&descriptor.flags)?;
    let aliases = descriptor
        .aliases
        .iter()
        .filter(|alias| **alias != name && !alias.is_empty())
        .fold(Vec::new(), |mut unique, alias| {
            if !unique.contains(alias) {
                unique.push(alias.clone());
            }
            unique
        });

    Ok(BoundCommand {
        name,
        aliases,
        path: path.to_path_buf(),
        quiesce_timeout: options.quiesce_timeout,
        flags,
        descriptor,
        interpreter,
    })
}

fn claim(claimed: &mut HashMap<String, PathBuf>, bound: BoundCommand) -> Result<BoundCommand> {
    for name in std::iter::once(&bound.name).chain(&bound.aliases) {
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(PluginError::DuplicateCommand {
                name: name.clone(),
                existing: PathBuf::from("kiln"),
            });
        }
        if let Some(existing) = claimed.get(name) {
            return Err(PluginError::DuplicateCommand {
                name: name.clone(),
                existing: existing.clone(),
            });
        }
    }
    for name in std::iter::once(&bound.name).chain(&bound.aliases) {
        claimed.insert(name.clone(), bound.path.clone());
    }
    Ok(bound)
}

/// Subcommand name for a script: the file stem without whitespace.
pub fn command_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let name: String = stem.chars().filter(|c| !c.is_whitespace()).collect();
    (!name.is_empty() && !name.starts_with('-')).then_some(name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Flags
// ─────────────────────────────────────────────────────────────────────────────

/// A flag wired into the CLI parser.
///
/// The reader is chosen once from the declared type; reading a value back
/// out of clap's matches needs no further type dispatch.
#[derive(Debug, Clone)]
pub struct BoundFlag {
    descriptor: FlagDescriptor,
    shorthand: Option<char>,
    read: fn(&ArgMatches, &str) -> Option<FlagValue>,
}

impl BoundFlag {
    fn new(descriptor: FlagDescriptor) -> Result<Self> {
        let name = &descriptor.name;
        if name.is_empty() {
            return Err(PluginError::Binding("flag name must not be empty".to_string()));
        }
        // `get` is the lookup accessor on the object returned by `Flags()`
        if name == "help" || name == "get" || name == ARGS_ID {
            return Err(PluginError::Binding(format!("flag name '{name}' is reserved")));
        }
        if name.starts_with('-') || name.contains('=') || name.contains(char::is_whitespace) {
            return Err(PluginError::Binding(format!("invalid flag name '{name}'")));
        }

        let shorthand = match descriptor.shorthand.as_deref() {
            None => None,
            Some(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some('h'), None) => {
                        return Err(PluginError::Binding(format!(
                            "flag '{name}': shorthand 'h' is reserved for help"
                        )));
                    }
                    (Some(c), None) if c != '-' && !c.is_whitespace() => Some(c),
                    _ => {
                        return Err(PluginError::Binding(format!(
                            "flag '{name}': shorthand must be a single character, got '{s}'"
                        )));
                    }
                }
            }
        };

        let read = match descriptor.kind() {
            FlagKind::String => read_string,
            FlagKind::Bool => read_bool,
        };

        Ok(Self {
            descriptor,
            shorthand,
            read,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &FlagDescriptor {
        &self.descriptor
    }

    /// The clap argument for this flag.
    pub fn arg(&self) -> Arg {
        let d = &self.descriptor;
        let mut arg = Arg::new(d.name.clone())
            .long(d.name.clone())
            .help(d.description.clone())
            .action(ArgAction::Set);
        if let Some(c) = self.shorthand {
            arg = arg.short(c);
        }
        match &d.default {
            FlagValue::String(default) => {
                arg = arg.value_name("VALUE");
                if !default.is_empty() {
                    arg = arg.default_value(default.clone());
                }
            }
            FlagValue::Bool(default) => {
                arg = arg
                    .num_args(0..=1)
                    .require_equals(true)
                    .default_missing_value("true")
                    .default_value(if *default { "true" } else { "false" })
                    .value_parser(value_parser!(bool));
            }
        }
        arg
    }

    /// The flag's value in `matches`, falling back to the declared default.
    pub fn value(&self, matches: &ArgMatches) -> FlagValue {
        (self.read)(matches, &self.descriptor.name).unwrap_or_else(|| self.descriptor.default.clone())
    }
}

fn read_string(matches: &ArgMatches, id: &str) -> Option<FlagValue> {
    matches.get_one::<String>(id).cloned().map(FlagValue::String)
}

fn read_bool(matches: &ArgMatches, id: &str) -> Option<FlagValue> {
    matches.get_one::<bool>(id).copied().map(FlagValue::Bool)
}

fn bind_flags(descriptors: &[FlagDescriptor]) -> Result<Vec<BoundFlag>> {
    let mut names = HashSet::new();
    let mut shorthands = HashSet::new();
    let mut flags = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let flag = BoundFlag::new(descriptor.clone())?;
        if !names.insert(flag.name().to_string()) {
            return Err(PluginError::Binding(format!(
                "flag '{}' is declared more than once",
                flag.name()
            )));
        }
        if let Some(c) = flag.shorthand
            && !shorthands.insert(c)
        {
            return Err(PluginError::Binding(format!(
                "shorthand '{c}' is used by more than one flag"
            )));
        }
        flags.push(flag);
    }
    Ok(flags)
}

// ─────────────────────────────────────────────────────────────────────────────
// Bound commands
// ─────────────────────────────────────────────────────────────────────────────

/// A script bound as a subcommand.
pub struct BoundCommand {
    name: String,
    aliases: Vec<String>,
    path: PathBuf,
    quiesce_timeout: Option<Duration>,
    flags: Vec<BoundFlag>,
    // Must drop before the interpreter that owns its callback.
    descriptor: CommandDescriptor,
    interpreter: Interpreter,
}

impl std::fmt::Debug for BoundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCommand")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl BoundCommand {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Visible aliases, without duplicates or the name itself.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn short(&self) -> &str {
        &self.descriptor.short
    }

    pub fn long(&self) -> &str {
        &self.descriptor.long
    }

    pub fn flags(&self) -> &[BoundFlag] {
        &self.flags
    }

    /// The clap subcommand for this script.
    pub fn command(&self) -> Command {
        let mut command = Command::new(self.name.clone())
            .visible_aliases(self.aliases.clone())
            .arg(
                Arg::new(ARGS_ID)
                    .value_name("ARGS")
                    .num_args(0..)
                    .action(ArgAction::Append)
                    .help("Arguments passed to the script"),
            )
            .args(self.flags.iter().map(BoundFlag::arg));
        if !self.descriptor.short.is_empty() {
            command = command.about(self.descriptor.short.clone());
        }
        if !self.descriptor.long.is_empty() {
            command = command.long_about(self.descriptor.long.clone());
        }
        command
    }

    /// Run the script with arguments parsed by [`command`](Self::command).
    pub fn invoke(&self, matches: &ArgMatches) -> Invocation {
        let args: Vec<String> = matches
            .get_many::<String>(ARGS_ID)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let flags = self
            .flags
            .iter()
            .map(|flag| (flag.name().to_string(), flag.value(matches)))
            .collect();

        tracing::debug!(command = %self.name, script = %self.path.display(), ?args, "invoking script command");
        invoke(
            &self.interpreter,
            &self.descriptor.run,
            args,
            flags,
            self.quiesce_timeout,
        )
    }
}
