// ── Reactive interface collection ──
//
// Concurrent storage keyed by interface id, with secondary indexes on
// MAC and identifier and push-based change notification via `watch`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{Interface, InterfaceId, MacAddress};

/// Concurrent, reactive collection of a host's interfaces.
///
/// Every mutation rebuilds the id-ordered snapshot that subscribers
/// receive and bumps a version counter.
pub(crate) struct InterfaceCollection {
    /// Primary storage: id -> interface.
    by_id: DashMap<InterfaceId, Arc<Interface>>,

    /// Secondary index: MAC -> ids. Aliases share their parent's MAC, so
    /// a MAC maps to several records.
    by_mac: DashMap<MacAddress, Vec<InterfaceId>>,

    /// Secondary index: non-empty identifier -> ids. Several ids appear
    /// only transiently, while a rename is being applied.
    by_identifier: DashMap<String, Vec<InterfaceId>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot ordered by id.
    snapshot: watch::Sender<Arc<Vec<Arc<Interface>>>>,
}

impl InterfaceCollection {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            by_mac: DashMap::new(),
            by_identifier: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace an interface. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, interface: Interface) -> bool {
        let id = interface.id;
        let previous = self.by_id.insert(id, Arc::new(interface.clone()));
        if let Some(old) = &previous {
            self.unindex(old);
        }
        self.index(&interface);

        self.rebuild_snapshot();
        self.bump_version();

        previous.is_none()
    }

    pub(crate) fn get(&self, id: InterfaceId) -> Option<Arc<Interface>> {
        self.by_id.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn ids_by_mac(&self, mac: &MacAddress) -> Vec<InterfaceId> {
        self.by_mac.get(mac).map(|r| r.value().clone()).unwrap_or_default()
    }

    pub(crate) fn ids_by_identifier(&self, identifier: &str) -> Vec<InterfaceId> {
        self.by_identifier
            .get(identifier)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<Interface>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Interface>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn index(&self, interface: &Interface) {
        if let Some(mac) = &interface.attrs.mac {
            let mut ids = self.by_mac.entry(mac.clone()).or_default();
            insert_sorted(&mut ids, interface.id);
        }
        if !interface.attrs.identifier.is_empty() {
            let mut ids = self
                .by_identifier
                .entry(interface.attrs.identifier.clone())
                .or_default();
            insert_sorted(&mut ids, interface.id);
        }
    }

    fn unindex(&self, interface: &Interface) {
        if let Some(mac) = &interface.attrs.mac {
            self.by_mac.remove_if_mut(mac, |_, ids| {
                ids.retain(|id| *id != interface.id);
                ids.is_empty()
            });
        }
        if !interface.attrs.identifier.is_empty() {
            self.by_identifier
                .remove_if_mut(&interface.attrs.identifier, |_, ids| {
                    ids.retain(|id| *id != interface.id);
                    ids.is_empty()
                });
        }
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Interface>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by_key(|iface| iface.id);
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

fn insert_sorted(ids: &mut Vec<InterfaceId>, id: InterfaceId) {
    if let Err(pos) = ids.binary_search(&id) {
        ids.insert(pos, id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{InterfaceAttrs, InterfaceKind};

    fn nic(id: u64, identifier: &str, mac: &str) -> Interface {
        Interface::new(
            InterfaceId::new(id),
            InterfaceAttrs::new(InterfaceKind::Physical)
                .with_identifier(identifier)
                .with_mac(MacAddress::parse(mac).unwrap()),
        )
    }

    #[test]
    fn upsert_returns_true_for_new_id() {
        let col = InterfaceCollection::new();
        assert!(col.upsert(nic(1, "eth0", "00:00:00:00:00:01")));
        assert!(!col.upsert(nic(1, "eth1", "00:00:00:00:00:01")));
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn replacing_moves_secondary_indexes() {
        let col = InterfaceCollection::new();
        col.upsert(nic(1, "eth0", "00:00:00:00:00:01"));
        col.upsert(nic(1, "eth1", "00:00:00:00:00:02"));

        assert!(col.ids_by_identifier("eth0").is_empty());
        assert_eq!(col.ids_by_identifier("eth1"), vec![InterfaceId::new(1)]);
        let old_mac = MacAddress::parse("00:00:00:00:00:01").unwrap();
        assert!(col.ids_by_mac(&old_mac).is_empty());
    }

    #[test]
    fn shared_mac_lists_every_record() {
        let col = InterfaceCollection::new();
        col.upsert(nic(2, "eth0.1", "00:00:00:00:00:01"));
        col.upsert(nic(1, "eth0", "00:00:00:00:00:01"));
        let mac = MacAddress::parse("00:00:00:00:00:01").unwrap();
        assert_eq!(col.ids_by_mac(&mac), vec![InterfaceId::new(1), InterfaceId::new(2)]);
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let col = InterfaceCollection::new();
        assert!(col.snapshot().is_empty());
        col.upsert(nic(3, "eth2", "00:00:00:00:00:03"));
        col.upsert(nic(1, "eth0", "00:00:00:00:00:01"));

        let ids: Vec<u64> = col.snapshot().iter().map(|i| i.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(col.get(InterfaceId::new(3)).unwrap().attrs.identifier, "eth2");
    }

    #[test]
    fn every_mutation_bumps_version() {
        let col = InterfaceCollection::new();
        let rx = col.subscribe();
        assert_eq!(col.version(), 0);
        col.upsert(nic(1, "eth0", "00:00:00:00:00:01"));
        col.upsert(nic(1, "eth0", "00:00:00:00:00:01"));
        assert_eq!(col.version(), 2);
        assert!(rx.has_changed().unwrap());
        assert!(!col.is_empty());
    }
}
