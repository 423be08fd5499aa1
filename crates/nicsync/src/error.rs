//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use nicsync_config::ConfigError;
use nicsync_core::{CoreError, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(nicsync::not_found), help("{hint}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        hint: String,
    },

    #[error("Malformed facts in {path}")]
    #[diagnostic(
        code(nicsync::facts),
        help(
            "{reason}\n\
             Structured fact files map interface names to records; \
             agent payloads need --flat."
        )
    )]
    InvalidFacts { path: String, reason: String },

    #[error("Could not read {path}: {reason}")]
    #[diagnostic(code(nicsync::parse), help("Check the file contents and try again."))]
    Parse { path: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nicsync::validation))]
    Validation { field: String, reason: String },

    // ── Persistence ──────────────────────────────────────────────────
    #[error("Failed to store interface '{interface}'")]
    #[diagnostic(
        code(nicsync::persistence),
        help(
            "{applied} earlier write(s) were kept. The state was modified \
             concurrently or rejected the record; re-run to reconcile again."
        )
    )]
    Persistence {
        interface: String,
        applied: usize,
        #[source]
        source: StoreError,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(nicsync::config),
        help("Inspect the file with: nicsync config show\nLocation: nicsync config path")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(nicsync::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::InvalidFacts { .. } | Self::Parse { .. } => {
                exit_code::USAGE
            }
            Self::Persistence { .. } => exit_code::CONFLICT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationFailed {
                interface,
                field,
                reason,
            } => CliError::Validation {
                field: format!("{field} of '{interface}'"),
                reason,
            },

            CoreError::Persistence {
                interface,
                applied,
                source,
            } => CliError::Persistence {
                interface,
                applied,
                source,
            },

            CoreError::Facts { message } => CliError::InvalidFacts {
                path: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "ignored identifiers".into(),
                reason: message,
            },
        }
    }
}
