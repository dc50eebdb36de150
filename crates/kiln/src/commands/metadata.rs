//! Metadata command - read and write the project metadata store.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::Style;

use kiln_config::MetadataStore;

use super::Context;

/// Arguments for the metadata command.
#[derive(Args, Debug)]
pub struct MetadataArgs {
    #[command(subcommand)]
    pub command: MetadataCommand,
}

#[derive(Subcommand, Debug)]
pub enum MetadataCommand {
    /// Print one field
    Get {
        /// Field name
        key: String,
    },

    /// Set one field, creating kiln.toml if needed
    Set {
        /// Field name
        key: String,
        /// Value stored as a string
        value: String,
    },

    /// List every field
    List {
        /// Output as JSON (for scripting)
        #[arg(long)]
        json: bool,
    },
}

/// Run the metadata command.
pub fn run(args: MetadataArgs, ctx: &Context) -> Result<()> {
    let store = MetadataStore::for_project(&ctx.project_dir);
    match args.command {
        MetadataCommand::Get { key } => cmd_get(&store, &key),
        MetadataCommand::Set { key, value } => cmd_set(&store, &key, &value, ctx),
        MetadataCommand::List { json } => cmd_list(&store, json),
    }
}

fn cmd_get(store: &MetadataStore, key: &str) -> Result<()> {
    let value = store.get(key)?;
    println!("{value}");
    Ok(())
}

fn cmd_set(store: &MetadataStore, key: &str, value: &str, ctx: &Context) -> Result<()> {
    store
        .set(key, value)
        .with_context(|| format!("failed to set '{key}'"))?;
    if ctx.verbose {
        println!("Wrote {key} to {}", store.path().display());
    }
    Ok(())
}

fn cmd_list(store: &MetadataStore, json: bool) -> Result<()> {
    let entries = store.entries()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No metadata in {}", store.path().display());
        return Ok(());
    }

    let key_style = Style::new().bold();
    let width = entries.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in &entries {
        println!("  {:<width$}  {}", key_style.apply_to(key), value);
    }
    Ok(())
}
