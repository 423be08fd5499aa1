//! Host network-interface model and fact reconciliation.
//!
//! This crate owns the domain model and the reconciliation logic that keeps
//! a host's stored interfaces in line with what discovery reports:
//!
//! - **[`Reconciler`]**: matches discovered [`FactSet`] entries to stored
//!   [`Interface`] records (identifier, MAC, and virtual-alias strategies),
//!   propagates renames to attached aliases, suppresses duplicate addresses,
//!   and maintains primary / provision / BMC designation. Writes go through
//!   the [`InterfaceStore`] seam and are skipped entirely when nothing
//!   changed.
//!
//! - **[`MemoryStore`]**: concurrent in-memory [`InterfaceStore`] indexed by
//!   id, MAC and identifier, with `watch`-based change notification and
//!   optimistic locking.
//!
//! - **Facts** ([`facts`]): the [`FactSet`] input type, per-record
//!   normalization into strongly typed [`Fact`]s, and a parser for flat
//!   agent key/value payloads ([`facts::flat`]).
//!
//! - **Domain model** ([`model`]): [`Interface`], [`InterfaceKind`],
//!   [`MacAddress`] and friends.

pub mod config;
pub mod error;
pub mod facts;
pub mod model;
pub mod reconcile;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ReconcileOptions;
pub use error::{CoreError, StoreError};
pub use facts::{Fact, FactRecord, FactSet, SuggestedPrimary};
pub use model::{Interface, InterfaceAttrs, InterfaceId, InterfaceKind, MacAddress};
pub use reconcile::{
    Change, ChangeAction, MatchStrategy, ReconciliationResult, Reconciler, RejectedFact,
};
pub use store::{InterfaceStore, MemoryStore};
