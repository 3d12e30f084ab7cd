//! TOML-based configuration for the hosting service.
//!
//! Supports a config file (flowql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [querier]
//! descriptions_dir = "${FLOWQL_DESCRIPTIONS:-db_descriptions}"
//! default_database = "flow_log"
//! ```
//!
//! The translator itself only needs the descriptions directory and, per
//! request, a database name; everything else about the host stays outside
//! this crate.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Querier configuration.
    pub querier: QuerierSettings,
}

/// Translator-facing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerierSettings {
    /// Directory holding the per-database descriptor files.
    pub descriptions_dir: PathBuf,

    /// Database used when a request does not name one.
    pub default_database: String,
}

impl Default for QuerierSettings {
    fn default() -> Self {
        Self {
            descriptions_dir: PathBuf::from("db_descriptions"),
            default_database: "flow_log".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, expanding `${VAR}` and
    /// `${VAR:-default}` references.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse settings from a TOML string.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let expanded = expand_env_vars(content)?;
        Ok(toml::from_str(&expanded)?)
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references in the config text.
fn expand_env_vars(content: &str) -> Result<String, SettingsError> {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let var = &tail[..end];
        let (name, default) = match var.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var, None),
        };
        match env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => match default {
                Some(default) => out.push_str(default),
                None => return Err(SettingsError::MissingEnvVar(name.to_string())),
            },
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
