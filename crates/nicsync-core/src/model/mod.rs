// ── Domain model ──
//
// Canonical interface types shared by the store, the fact layer and the
// reconciler.

pub mod interface;
pub mod mac;

pub use interface::{Interface, InterfaceAttrs, InterfaceId, InterfaceKind};
pub use mac::{MacAddress, MacParseError};
