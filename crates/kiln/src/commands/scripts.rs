//! Scripts command - show what the commands directory contributed.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde_json::json;

use kiln_plugin::LoadReport;

use super::Context;

/// Arguments for the scripts command.
#[derive(Args, Debug)]
pub struct ScriptsArgs {
    /// Output as JSON (for scripting)
    #[arg(long)]
    pub json: bool,
}

/// Run the scripts command.
pub fn run(args: ScriptsArgs, ctx: &Context, report: &LoadReport) -> Result<()> {
    if args.json {
        return print_json(report);
    }

    if report.commands.is_empty() && report.skipped.is_empty() {
        println!("No scripts found in {}", ctx.commands_dir.display());
        return Ok(());
    }

    let name_style = Style::new().green().bold();
    let dim = Style::new().dim();

    if !report.commands.is_empty() {
        println!("Commands ({}):", report.commands.len());
        for command in &report.commands {
            let aliases = if command.aliases().is_empty() {
                String::new()
            } else {
                format!(" [{}]", command.aliases().join(", "))
            };
            println!(
                "  {}{}  {}",
                name_style.apply_to(command.name()),
                aliases,
                command.short()
            );
            if ctx.verbose {
                println!("    {}", dim.apply_to(command.path().display()));
                for flag in command.flags() {
                    let d = flag.descriptor();
                    println!(
                        "    --{} ({}, default {})",
                        d.name,
                        d.kind().as_str(),
                        d.default
                    );
                }
            }
        }
    }

    if !report.skipped.is_empty() {
        if !report.commands.is_empty() {
            println!();
        }
        let warn = Style::new().yellow();
        println!("Skipped ({}):", report.skipped.len());
        for skipped in &report.skipped {
            println!(
                "  {}  {}",
                warn.apply_to(skipped.path.display()),
                skipped.error
            );
        }
    }

    Ok(())
}

fn print_json(report: &LoadReport) -> Result<()> {
    let commands: Vec<_> = report
        .commands
        .iter()
        .map(|c| {
            json!({
                "name": c.name(),
                "aliases": c.aliases(),
                "short": c.short(),
                "path": c.path().display().to_string(),
                "flags": c.flags().iter().map(|f| {
                    let d = f.descriptor();
                    json!({
                        "name": d.name,
                        "type": d.kind().as_str(),
                        "shorthand": d.shorthand,
                        "default": d.default.to_string(),
                        "description": d.description,
                    })
                }).collect::<Vec<_>>(),
            })
        })
        .collect();
    let skipped: Vec<_> = report
        .skipped
        .iter()
        .map(|s| {
            json!({
                "path": s.path.display().to_string(),
                "error": s.error.to_string(),
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": commands, "skipped": skipped }))?
    );
    Ok(())
}
