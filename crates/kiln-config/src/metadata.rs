//! Project metadata store.
//!
//! Metadata lives in the `[project]` table of the project's `kiln.toml`:
//!
//! ```toml
//! [project]
//! name = "demo"
//! version = "1.2.0"
//! ```
//!
//! Fields are read as strings: string values verbatim, other values in their
//! TOML rendering. Writes rewrite the whole document and keep every other
//! table intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{ConfigError, PROJECT_CONFIG_FILE, Result};

/// Name of the metadata table inside `kiln.toml`.
const PROJECT_TABLE: &str = "project";

/// Read/write access to a project's metadata fields.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    /// Store backed by a specific file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the project rooted at `project_dir`.
    pub fn for_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join(PROJECT_CONFIG_FILE))
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one field.
    pub fn get(&self, key: &str) -> Result<String> {
        let document = self.read_document()?;
        project_table(&document, &self.path)?
            .and_then(|table| table.get(key))
            .map(render_value)
            .ok_or_else(|| ConfigError::MetadataKeyNotFound {
                key: key.to_string(),
                path: self.path.display().to_string(),
            })
    }

    /// Read every field.
    pub fn entries(&self) -> Result<BTreeMap<String, String>> {
        let document = self.read_document()?;
        Ok(project_table(&document, &self.path)?
            .map(|table| {
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), render_value(v)))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Write one string field, creating the document or table when missing.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut document = if self.path.is_file() {
            self.read_document()?
        } else {
            toml::Table::new()
        };

        let entry = document
            .entry(PROJECT_TABLE)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(table) = entry else {
            return Err(ConfigError::MetadataNotATable {
                path: self.path.display().to_string(),
            });
        };
        table.insert(key.to_string(), toml::Value::String(value.to_string()));

        let contents = toml::to_string_pretty(&document)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, contents).map_err(|e| ConfigError::WriteFile {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    fn read_document(&self) -> Result<toml::Table> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadFile {
            path: self.path.display().to_string(),
            source: e,
        })?;
        Ok(contents.parse::<toml::Table>()?)
    }
}

fn project_table<'a>(document: &'a toml::Table, path: &Path) -> Result<Option<&'a toml::Table>> {
    match document.get(PROJECT_TABLE) {
        None => Ok(None),
        Some(toml::Value::Table(table)) => Ok(Some(table)),
        Some(_) => Err(ConfigError::MetadataNotATable {
            path: path.display().to_string(),
        }),
    }
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
