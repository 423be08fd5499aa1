// ── Working copy of a host's interfaces ──
//
// The reconciler plans every change on a `Workspace` before touching the
// store: identifiers are settled, fields applied, flags designated, and
// only then are the touched slots written, in first-touch order.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use indexmap::IndexMap;
use tracing::debug;

use crate::facts::Fact;
use crate::model::{Interface, InterfaceAttrs, InterfaceId};

const ALIAS_SEPARATORS: [char; 3] = ['.', ':', '_'];

/// One interface as it will look after the pass.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// The stored record; `None` for interfaces created by this pass.
    pub(crate) original: Option<Interface>,
    pub(crate) attrs: InterfaceAttrs,
    /// Name of the first fact that touched the slot.
    pub(crate) fact: Option<String>,
    touched: Option<usize>,
}

impl Slot {
    pub(crate) fn id(&self) -> Option<InterfaceId> {
        self.original.as_ref().map(|i| i.id)
    }

    pub(crate) fn is_new(&self) -> bool {
        self.original.is_none()
    }

    /// Fields that differ from the stored record.
    pub(crate) fn changed_fields(&self) -> Vec<&'static str> {
        match &self.original {
            Some(original) => original.attrs.changed_fields(&self.attrs),
            None => InterfaceAttrs::new(self.attrs.kind).changed_fields(&self.attrs),
        }
    }
}

impl AsRef<InterfaceAttrs> for Slot {
    fn as_ref(&self) -> &InterfaceAttrs {
        &self.attrs
    }
}

#[derive(Debug, Default)]
pub(crate) struct Workspace {
    pub(crate) slots: Vec<Slot>,
    touches: usize,
}

impl Workspace {
    /// Stored interfaces become the leading slots, in id order.
    pub(crate) fn new(mut stored: Vec<Interface>) -> Self {
        stored.sort_by_key(|i| i.id);
        let slots = stored
            .into_iter()
            .map(|interface| Slot {
                attrs: interface.attrs.clone(),
                original: Some(interface),
                fact: None,
                touched: None,
            })
            .collect();
        Self { slots, touches: 0 }
    }

    /// Record that `fact` (or the designation step, for `None`) touched a slot.
    pub(crate) fn touch(&mut self, index: usize, fact: Option<&str>) {
        let slot = &mut self.slots[index];
        if slot.touched.is_none() {
            slot.touched = Some(self.touches);
            self.touches += 1;
        }
        if slot.fact.is_none() {
            slot.fact = fact.map(str::to_owned);
        }
    }

    /// Append a slot for an interface that does not exist yet.
    pub(crate) fn push(&mut self, attrs: InterfaceAttrs, fact: Option<&str>) -> usize {
        self.slots.push(Slot {
            original: None,
            attrs,
            fact: None,
            touched: None,
        });
        let index = self.slots.len() - 1;
        self.touch(index, fact);
        index
    }

    /// Slots that need a write, in first-touch order. Untouched slots and
    /// slots whose attributes ended up unchanged are left out.
    pub(crate) fn pending(&self) -> Vec<usize> {
        let mut pending: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.touched.is_some())
            .filter(|(_, slot)| match &slot.original {
                Some(original) => original.attrs != slot.attrs,
                None => true,
            })
            .map(|(i, _)| i)
            .collect();
        pending.sort_by_key(|i| self.slots[*i].touched);
        pending
    }

    // ── Field application ────────────────────────────────────────────

    /// Apply an accepted device proposal. `ip` is the fact's address
    /// unless an earlier device already took it.
    pub(crate) fn apply_device(&mut self, fact: &Fact, proposal: &Proposal, ip: Option<Ipv4Addr>) -> usize {
        let Some(index) = proposal.slot else {
            let mut attrs = InterfaceAttrs::new(fact.kind).with_identifier(proposal.identifier.clone());
            attrs.mac.clone_from(&fact.mac);
            attrs.ip = ip;
            attrs.ip6 = fact.ip6;
            attrs.is_virtual = fact.is_virtual;
            attrs.attached_to.clone_from(&fact.attached_to);
            attrs.link = fact.link.unwrap_or(true);
            debug!(fact = %fact.name, kind = %fact.kind, "creating interface");
            return self.push(attrs, Some(&fact.name));
        };

        let attrs = &mut self.slots[index].attrs;
        let old = std::mem::replace(&mut attrs.identifier, proposal.identifier.clone());
        if fact.mac.is_some() {
            attrs.mac.clone_from(&fact.mac);
        }
        attrs.ip = ip;
        attrs.ip6 = fact.ip6;
        if let Some(link) = fact.link {
            attrs.link = link;
        }
        if fact.attached_to.is_some() {
            attrs.attached_to.clone_from(&fact.attached_to);
        }
        self.touch(index, Some(&fact.name));

        if old != proposal.identifier && !old.is_empty() {
            debug!(from = %old, to = %proposal.identifier, "renaming interface");
        }
        for (child, identifier) in &proposal.cascade {
            let attrs = &mut self.slots[*child].attrs;
            attrs.identifier.clone_from(identifier);
            attrs.attached_to = Some(proposal.identifier.clone());
            debug!(alias = %identifier, parent = %proposal.identifier, "following parent rename");
            self.touch(*child, Some(&fact.name));
        }
        index
    }

    /// Apply an alias fact to its matched slot, or create the alias.
    pub(crate) fn apply_alias(&mut self, fact: &Fact, slot: Option<usize>) -> usize {
        let Some(index) = slot else {
            let mut attrs = InterfaceAttrs::new(fact.kind).with_identifier(fact.identifier.clone());
            attrs.mac.clone_from(&fact.mac);
            attrs.ip = fact.ip;
            attrs.ip6 = fact.ip6;
            attrs.attached_to.clone_from(&fact.attached_to);
            attrs.link = fact.link.unwrap_or(true);
            debug!(fact = %fact.name, "creating alias");
            return self.push(attrs, Some(&fact.name));
        };

        let attrs = &mut self.slots[index].attrs;
        if fact.mac.is_some() {
            attrs.mac.clone_from(&fact.mac);
        }
        attrs.ip = fact.ip;
        attrs.ip6 = fact.ip6;
        if let Some(link) = fact.link {
            attrs.link = link;
        }
        if fact.attached_to.is_some() {
            attrs.attached_to.clone_from(&fact.attached_to);
        }
        self.touch(index, Some(&fact.name));
        index
    }
}

// ── Renames ──────────────────────────────────────────────────────────

/// Parent slot -> slots whose `attached_to` names the parent's identifier,
/// computed from the stored records.
pub(crate) fn adjacency(slots: &[Slot]) -> HashMap<usize, Vec<usize>> {
    let mut by_parent: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, slot) in slots.iter().enumerate() {
        if let Some(parent) = slot.original.as_ref().and_then(|o| o.attrs.attached_to.as_deref()) {
            if !parent.is_empty() && !slot.attrs.kind.is_bmc() {
                by_parent.entry(parent).or_default().push(i);
            }
        }
    }

    let mut children = HashMap::new();
    for (i, slot) in slots.iter().enumerate() {
        let Some(original) = &slot.original else {
            continue;
        };
        if !original.attrs.kind.is_device() || original.attrs.identifier.is_empty() {
            continue;
        }
        if let Some(kids) = by_parent.get(original.attrs.identifier.as_str()) {
            let kids: Vec<usize> = kids.iter().copied().filter(|k| *k != i).collect();
            if !kids.is_empty() {
                children.insert(i, kids);
            }
        }
    }
    children
}

/// `eth4.1` follows `eth4` -> `eth5` as `eth5.1`; other names stay.
pub(crate) fn cascade_identifier(child: &str, old: &str, new: &str) -> Option<String> {
    let suffix = child.strip_prefix(old)?;
    let mut chars = suffix.chars();
    let sep = chars.next()?;
    (ALIAS_SEPARATORS.contains(&sep) && chars.next().is_some()).then(|| format!("{new}{suffix}"))
}

/// Identifier a device fact wants for a slot, plus the children that follow.
#[derive(Debug, Clone)]
pub(crate) struct Proposal {
    /// Position of the device fact in fact order.
    pub(crate) fact: usize,
    /// Matched slot; `None` creates a new interface.
    pub(crate) slot: Option<usize>,
    pub(crate) identifier: String,
    /// `(child slot, identifier after the cascade)`.
    pub(crate) cascade: Vec<(usize, String)>,
}

impl Proposal {
    pub(crate) fn new(fact: usize, slot: Option<usize>, identifier: String) -> Self {
        Self {
            fact,
            slot,
            identifier,
            cascade: Vec::new(),
        }
    }
}

/// Decide which proposals may keep their identifiers.
///
/// Returns the facts whose proposals are rejected because they would
/// leave two interfaces sharing a non-empty identifier. An interface that
/// keeps its identifier always wins; among movers the first fact wins.
/// Rejecting a fact undoes its cascade too, which may free or block other
/// identifiers, so this runs to a fixpoint.
pub(crate) fn settle(slots: &[Slot], proposals: &[Proposal]) -> HashSet<usize> {
    let mut rejected: HashSet<usize> = HashSet::new();

    loop {
        let mut groups: IndexMap<&str, Vec<Option<usize>>> = IndexMap::new();
        for (identifier, owner) in projected(slots, proposals, &rejected) {
            if !identifier.is_empty() {
                groups.entry(identifier).or_default().push(owner);
            }
        }
        for proposal in proposals.iter().filter(|p| p.slot.is_none() && !rejected.contains(&p.fact)) {
            if !proposal.identifier.is_empty() {
                groups
                    .entry(proposal.identifier.as_str())
                    .or_default()
                    .push(Some(proposal.fact));
            }
        }

        let mut newly = Vec::new();
        for owners in groups.values().filter(|owners| owners.len() > 1) {
            let movers: Vec<usize> = owners.iter().flatten().copied().collect();
            if movers.len() < owners.len() {
                newly.extend(movers);
            } else if let Some(&first) = movers.iter().min() {
                if movers.iter().all(|m| *m == first) {
                    newly.push(first);
                } else {
                    newly.extend(movers.into_iter().filter(|m| *m != first));
                }
            }
        }

        let before = rejected.len();
        rejected.extend(newly);
        if rejected.len() == before {
            return rejected;
        }
    }
}

/// Identifier of every existing slot once the accepted proposals apply,
/// paired with the fact that moved it (`None` when it stays).
pub(crate) fn projected<'a>(
    slots: &'a [Slot],
    proposals: &'a [Proposal],
    rejected: &HashSet<usize>,
) -> Vec<(&'a str, Option<usize>)> {
    let mut moved: HashMap<usize, (&str, usize)> = HashMap::new();
    for proposal in proposals.iter().filter(|p| !rejected.contains(&p.fact)) {
        let targets = proposal
            .slot
            .map(|s| (s, proposal.identifier.as_str()))
            .into_iter()
            .chain(proposal.cascade.iter().map(|(s, id)| (*s, id.as_str())));
        for (slot, identifier) in targets {
            if identifier != slots[slot].attrs.identifier {
                moved.insert(slot, (identifier, proposal.fact));
            }
        }
    }

    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| !slot.is_new())
        .map(|(i, slot)| match moved.get(&i) {
            Some((identifier, owner)) => (*identifier, Some(*owner)),
            None => (slot.attrs.identifier.as_str(), None),
        })
        .collect()
}
