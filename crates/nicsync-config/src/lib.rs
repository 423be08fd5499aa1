//! Shared configuration for nicsync.
//!
//! A TOML file merged with `NICSYNC_*` environment variables, and the
//! translation into [`nicsync_core::ReconcileOptions`]. The CLI layers its
//! own flag overrides on top.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use nicsync_core::ReconcileOptions;
use nicsync_core::config::DEFAULT_IGNORED_IDENTIFIERS;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Output defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Reconciliation behaviour.
    #[serde(default)]
    pub reconcile: ReconcileSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// The `[reconcile]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconcileSection {
    /// Glob patterns of fact identifiers to skip (`*` wildcard).
    #[serde(default = "default_ignored")]
    pub ignored_identifiers: Vec<String>,

    /// Never let facts modify the primary or provision interface.
    #[serde(default)]
    pub ignore_facts_for_provisioning: bool,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            ignored_identifiers: default_ignored(),
            ignore_facts_for_provisioning: false,
        }
    }
}

fn default_ignored() -> Vec<String> {
    DEFAULT_IGNORED_IDENTIFIERS
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}

impl ReconcileSection {
    pub fn to_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            ignored_identifiers: self.ignored_identifiers.clone(),
            ignore_facts_for_provisioning: self.ignore_facts_for_provisioning,
        }
    }
}

const OUTPUT_FORMATS: &[&str] = &["table", "json", "json-compact", "yaml", "plain"];
const COLOR_MODES: &[&str] = &["auto", "always", "never"];

impl Config {
    /// Reject values the CLI would otherwise silently misinterpret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !OUTPUT_FORMATS.contains(&self.defaults.output.as_str()) {
            return Err(ConfigError::Validation {
                field: "defaults.output".into(),
                reason: format!(
                    "expected one of {}, got '{}'",
                    OUTPUT_FORMATS.join(", "),
                    self.defaults.output
                ),
            });
        }
        if !COLOR_MODES.contains(&self.defaults.color.as_str()) {
            return Err(ConfigError::Validation {
                field: "defaults.color".into(),
                reason: format!(
                    "expected one of {}, got '{}'",
                    COLOR_MODES.join(", "),
                    self.defaults.color
                ),
            });
        }
        if let Some(blank) = self
            .reconcile
            .ignored_identifiers
            .iter()
            .position(|p| p.trim().is_empty())
        {
            return Err(ConfigError::Validation {
                field: format!("reconcile.ignored_identifiers[{blank}]"),
                reason: "pattern must not be empty".into(),
            });
        }
        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "nicsync", "nicsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("nicsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// `path` overrides the platform config location. A missing file is not
/// an error; defaults and environment still apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("NICSYNC_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, falling back to defaults when loading fails.
pub fn load_config_or_default(path: Option<&Path>) -> Config {
    load_config(path).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unusable config, using defaults");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path` (or the canonical
/// config path). Returns the path written.
pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    cfg.validate()?;
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(path)
}
