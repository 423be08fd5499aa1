// ── In-memory interface store ──

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use super::InterfaceStore;
use super::collection::InterfaceCollection;
use crate::error::StoreError;
use crate::model::{Interface, InterfaceAttrs, InterfaceId, MacAddress};

/// Thread-safe in-memory [`InterfaceStore`].
///
/// Reads never block writers; every committed write is broadcast to
/// subscribers. Updates are checked against `lock_version`, so a caller
/// holding an outdated record gets [`StoreError::StaleRecord`].
pub struct MemoryStore {
    interfaces: InterfaceCollection,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            interfaces: InterfaceCollection::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed the store with already-persisted interfaces.
    ///
    /// New ids continue after the largest seeded id.
    pub fn from_interfaces(seed: impl IntoIterator<Item = Interface>) -> Self {
        let store = Self::new();
        let mut max_id = 0;
        for interface in seed {
            max_id = max_id.max(interface.id.get());
            store.interfaces.upsert(interface);
        }
        store.next_id.store(max_id + 1, Ordering::Relaxed);
        store
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn get(&self, id: InterfaceId) -> Option<Arc<Interface>> {
        self.interfaces.get(id)
    }

    pub fn find_by_identifier(&self, identifier: &str) -> Vec<Arc<Interface>> {
        self.resolve(self.interfaces.ids_by_identifier(identifier))
    }

    pub fn find_by_mac(&self, mac: &MacAddress) -> Vec<Arc<Interface>> {
        self.resolve(self.interfaces.ids_by_mac(mac))
    }

    /// The interface flagged primary, if any.
    pub fn primary(&self) -> Option<Arc<Interface>> {
        self.snapshot().iter().find(|i| i.attrs.primary).cloned()
    }

    /// The interface flagged provision, if any.
    pub fn provision(&self) -> Option<Arc<Interface>> {
        self.snapshot().iter().find(|i| i.attrs.provision).cloned()
    }

    // ── Change observation ───────────────────────────────────────────

    /// Id-ordered snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Interface>>> {
        self.interfaces.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Interface>>>> {
        self.interfaces.subscribe()
    }

    /// Number of mutations since the store was created, seeding included.
    pub fn version(&self) -> u64 {
        self.interfaces.version()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    fn resolve(&self, ids: Vec<InterfaceId>) -> Vec<Arc<Interface>> {
        ids.into_iter().filter_map(|id| self.interfaces.get(id)).collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceStore for MemoryStore {
    fn interfaces(&self) -> Vec<Interface> {
        self.snapshot().iter().map(|i| Interface::clone(i)).collect()
    }

    fn create(&self, attrs: InterfaceAttrs) -> Result<Interface, StoreError> {
        let id = InterfaceId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let interface = Interface::new(id, attrs);
        self.interfaces.upsert(interface.clone());
        Ok(interface)
    }

    fn update(&self, interface: &Interface) -> Result<Interface, StoreError> {
        let stored = self
            .interfaces
            .get(interface.id)
            .ok_or(StoreError::UnknownInterface { id: interface.id })?;
        if stored.lock_version != interface.lock_version {
            return Err(StoreError::StaleRecord {
                id: interface.id,
                expected: interface.lock_version,
                found: stored.lock_version,
            });
        }

        let updated = Interface {
            id: interface.id,
            attrs: interface.attrs.clone(),
            lock_version: stored.lock_version + 1,
        };
        self.interfaces.upsert(updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::InterfaceKind;

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    fn attrs(identifier: &str, raw_mac: &str) -> InterfaceAttrs {
        InterfaceAttrs::new(InterfaceKind::Physical)
            .with_identifier(identifier)
            .with_mac(mac(raw_mac))
    }

    #[test]
    fn create_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.create(attrs("eth0", "00:00:00:00:00:01")).unwrap();
        let b = store.create(attrs("eth1", "00:00:00:00:00:02")).unwrap();
        assert_eq!(a.id.get(), 1);
        assert_eq!(b.id.get(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn seeded_store_continues_ids() {
        let store = MemoryStore::from_interfaces([Interface::new(
            InterfaceId::new(41),
            attrs("eth0", "00:00:00:00:00:01"),
        )]);
        let created = store.create(attrs("eth1", "00:00:00:00:00:02")).unwrap();
        assert_eq!(created.id.get(), 42);
    }

    #[test]
    fn update_bumps_lock_version() {
        let store = MemoryStore::new();
        let mut iface = store.create(attrs("eth0", "00:00:00:00:00:01")).unwrap();
        iface.attrs.identifier = "eth5".into();

        let updated = store.update(&iface).unwrap();
        assert_eq!(updated.lock_version, 1);
        assert_eq!(store.find_by_identifier("eth5").len(), 1);
        assert!(store.find_by_identifier("eth0").is_empty());
    }

    #[test]
    fn stale_update_is_rejected() {
        let store = MemoryStore::new();
        let iface = store.create(attrs("eth0", "00:00:00:00:00:01")).unwrap();
        store.update(&iface).unwrap();

        let err = store.update(&iface).unwrap_err();
        assert_eq!(
            err,
            StoreError::StaleRecord {
                id: iface.id,
                expected: 0,
                found: 1,
            }
        );
    }

    #[test]
    fn update_of_unknown_id_fails() {
        let store = MemoryStore::new();
        let ghost = Interface::new(InterfaceId::new(9), attrs("eth0", "00:00:00:00:00:01"));
        assert_eq!(
            store.update(&ghost).unwrap_err(),
            StoreError::UnknownInterface { id: ghost.id }
        );
    }

    #[test]
    fn lookups_by_mac_and_flags() {
        let store = MemoryStore::new();
        store
            .create(attrs("eth0", "00:00:00:00:00:01").with_primary(true))
            .unwrap();
        store
            .create(
                InterfaceAttrs::new(InterfaceKind::Virtual)
                    .with_identifier("eth0.1")
                    .with_mac(mac("00:00:00:00:00:01"))
                    .with_provision(true),
            )
            .unwrap();

        assert_eq!(store.find_by_mac(&mac("00:00:00:00:00:01")).len(), 2);
        assert_eq!(store.primary().unwrap().attrs.identifier, "eth0");
        assert_eq!(store.provision().unwrap().attrs.identifier, "eth0.1");
    }

    #[test]
    fn writes_are_broadcast() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        store.create(attrs("eth0", "00:00:00:00:00:01")).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
        assert_eq!(store.version(), 1);
    }
}
