// ── Interface persistence ──
//
// The reconciler only needs "a durable collection of interface records":
// read everything once, then create or update records one at a time.

mod collection;
mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::model::{Interface, InterfaceAttrs};

/// Durable collection of one host's interfaces.
pub trait InterfaceStore {
    /// All interfaces, ordered by id.
    fn interfaces(&self) -> Vec<Interface>;

    /// Persist a new interface and return it with its assigned id.
    fn create(&self, attrs: InterfaceAttrs) -> Result<Interface, StoreError>;

    /// Persist changed attributes of an existing interface.
    ///
    /// `interface.lock_version` must match the stored record; the
    /// returned interface carries the bumped version.
    fn update(&self, interface: &Interface) -> Result<Interface, StoreError>;
}
