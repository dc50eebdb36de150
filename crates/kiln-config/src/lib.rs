//! Configuration system for the kiln CLI.
//!
//! Provides:
//! - TOML-based configuration with layering (user config + project-local `kiln.toml`)
//! - The project metadata store (the `[project]` table of `kiln.toml`)
//! - Dotenv-style environment files filtered to the `KILN_` prefix

pub mod discovery;
pub mod env;
pub mod error;
pub mod metadata;
pub mod types;

pub use discovery::{
    LoadedConfig, PROJECT_CONFIG_FILE, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use env::{ENV_FILES, ENV_PREFIX, load_env_files, merged_env};
pub use error::{ConfigError, Result};
pub use metadata::MetadataStore;
pub use types::*;
