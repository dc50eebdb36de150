//! kiln - project CLI with JavaScript custom commands
//!
//! Main entry point for the kiln CLI. Scripts in the project's commands
//! directory are loaded before argument parsing so each one can appear as a
//! subcommand of `kiln custom`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use console::Style;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use kiln_config::LoggingConfig;
use kiln_plugin::{HostOptions, LoadReport, load_commands};

mod commands;

use commands::{metadata, scripts};

/// Name of the subcommand grouping bound scripts.
const CUSTOM_GROUP: &str = "custom";

const DEFAULT_FILTER: &str = "kiln=warn,kiln_plugin=warn,kiln_config=warn";
const VERBOSE_FILTER: &str = "kiln=debug,kiln_plugin=debug,kiln_config=debug,warn";
const FILE_FILTER: &str = "kiln=debug,kiln_plugin=debug,kiln_config=debug,info";
const LOG_ENV: &str = "KILN_LOG";

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// kiln - project CLI with JavaScript custom commands
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List script commands and scripts that failed to load
    Scripts(scripts::ScriptsArgs),

    /// Read and write project metadata
    Metadata(metadata::MetadataArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", Style::new().red().bold().apply_to("error:"));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let raw_args: Vec<OsString> = std::env::args_os().collect();
    let verbose = verbose_requested(&raw_args);

    let project_dir = std::env::current_dir()?;
    let loaded = kiln_config::load_config(Some(&project_dir))?;
    let _guard = init_tracing(verbose, &loaded.config.logging());

    let warn = Style::new().yellow().bold();
    for warning in &loaded.warnings {
        eprintln!("{} {warning}", warn.apply_to("warning:"));
    }
    tracing::debug!(sources = ?loaded.loaded_from(), "configuration loaded");

    // Scripts are bound before the final parse so they can become subcommands
    let commands_config = loaded.config.commands();
    let options = HostOptions::from_config(&project_dir, &commands_config);
    let report = if commands_config.enabled {
        load_commands(&options)
    } else {
        tracing::debug!("script commands disabled by configuration");
        LoadReport::default()
    };
    for skipped in &report.skipped {
        eprintln!(
            "{} skipped {}: {}",
            warn.apply_to("warning:"),
            skipped.path.display(),
            skipped.error
        );
    }

    let matches = Cli::command()
        .subcommand(custom_group(&report))
        .get_matches_from(raw_args);

    if let Some((CUSTOM_GROUP, group)) = matches.subcommand() {
        return Ok(run_custom(&report, group));
    }

    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    let ctx = commands::Context {
        project_dir,
        commands_dir: options.commands_dir,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Scripts(args) => scripts::run(args, &ctx, &report)?,
        Commands::Metadata(args) => metadata::run(args, &ctx)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// The `custom` group holding one subcommand per bound script.
fn custom_group(report: &LoadReport) -> clap::Command {
    clap::Command::new(CUSTOM_GROUP)
        .visible_alias("x")
        .about("Run a project script command")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommands(report.commands.iter().map(|c| c.command()))
}

fn run_custom(report: &LoadReport, group: &ArgMatches) -> ExitCode {
    let Some((name, args)) = group.subcommand() else {
        return ExitCode::FAILURE;
    };
    let Some(command) = report.find(name) else {
        return ExitCode::FAILURE;
    };

    let invocation = command.invoke(args);
    let path = command.path().display();
    let red = Style::new().red().bold();
    for message in invocation.errors() {
        eprintln!("{} {path}: {message}", red.apply_to("error:"));
    }
    if invocation.timed_out {
        eprintln!(
            "{} {path}: abandoned pending timers after the quiesce timeout",
            Style::new().yellow().bold().apply_to("warning:")
        );
    }

    if invocation.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Whether `-v`/`--verbose` appears among the global arguments, before the
/// first subcommand.
fn verbose_requested(args: &[OsString]) -> bool {
    args.iter()
        .skip(1)
        .map(|a| a.to_string_lossy())
        .take_while(|a| a.starts_with('-'))
        .any(|a| a == "-v" || a == "--verbose")
}

/// Initialize tracing: console (human-readable) + rotating JSON file.
fn init_tracing(verbose: bool, logging: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let console_filter = match std::env::var(LOG_ENV) {
        Ok(directive) if !directive.is_empty() => EnvFilter::new(directive),
        _ if verbose => EnvFilter::new(VERBOSE_FILTER),
        _ => EnvFilter::new(logging.level.as_deref().unwrap_or(DEFAULT_FILTER)),
    };

    let log_dir = kiln_config::xdg_config_dir().map(|d| d.join("logs"));
    let (file_layer, guard) = match log_dir.as_deref().filter(|_| logging.file) {
        Some(dir) => match file_appender(dir) {
            Some(appender) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(EnvFilter::new(FILE_FILTER));
                (Some(layer), Some(guard))
            }
            None => (None, None),
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}

fn file_appender(dir: &Path) -> Option<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("kiln.log")
        .build(PathBuf::from(dir))
        .map_err(|e| eprintln!("warning: log file disabled: {e}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_verbose_only_before_subcommand() {
        assert!(verbose_requested(&args(&["kiln", "-v", "scripts"])));
        assert!(verbose_requested(&args(&["kiln", "--verbose", "custom", "x"])));
        assert!(!verbose_requested(&args(&["kiln", "custom", "deploy", "-v"])));
        assert!(!verbose_requested(&args(&["kiln"])));
    }

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command()
            .subcommand(custom_group(&LoadReport::default()))
            .debug_assert();
    }
}
