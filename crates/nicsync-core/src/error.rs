// ── Core error types ──
//
// Validation failures are per-fact and end up in the reconciliation
// report. Persistence failures abort the remaining writes of a pass and
// are returned to the caller.

use thiserror::Error;

use crate::model::InterfaceId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Fact / record validation ─────────────────────────────────────
    #[error("Invalid {field} on interface '{interface}': {reason}")]
    ValidationFailed {
        interface: String,
        field: String,
        reason: String,
    },

    // ── Store errors ─────────────────────────────────────────────────
    #[error("Failed to persist interface '{interface}' after {applied} successful writes")]
    Persistence {
        interface: String,
        /// Writes that were committed before the failure.
        applied: usize,
        #[source]
        source: StoreError,
    },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Malformed facts: {message}")]
    Facts { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn validation(
        interface: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ValidationFailed {
            interface: interface.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by an [`InterfaceStore`](crate::store::InterfaceStore)
/// implementation when it rejects a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("interface {id} does not exist")]
    UnknownInterface { id: InterfaceId },

    #[error("interface {id} was modified concurrently (expected version {expected}, found {found})")]
    StaleRecord {
        id: InterfaceId,
        expected: u64,
        found: u64,
    },

    #[error("store rejected write: {message}")]
    Rejected { message: String },
}
