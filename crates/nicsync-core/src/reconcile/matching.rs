// ── Record linkage ──
//
// Pure functions deciding which stored interface a fact describes.
// Nothing here mutates; the planner applies the result.

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::{debug, warn};

use crate::facts::Fact;
use crate::model::{InterfaceAttrs, InterfaceKind};

/// How a fact was linked to a stored interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchStrategy {
    /// Alias with the same MAC and the same identifier.
    VirtualByMacAndIdentifier,
    /// Alias fact without identifier; the only alias carrying its MAC.
    VirtualByMacOnly,
    /// Device with the same identifier.
    DeviceByIdentifier,
    /// Physical device with the same MAC, renamed to the fact.
    DeviceByMac,
    /// Unnamed primary without MAC, adopted by the suggested primary.
    PrimaryPlaceholder,
}

/// Index into the candidate slice plus the strategy that found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub index: usize,
    pub strategy: MatchStrategy,
}

impl Match {
    fn new(index: usize, strategy: MatchStrategy) -> Self {
        Self { index, strategy }
    }
}

/// Link a single fact against `existing`, in strategy order.
///
/// Only the per-fact rules apply: no record is claimed and the rename
/// guard (which needs the whole fact set) is skipped.
pub fn match_fact<T: AsRef<InterfaceAttrs>>(existing: &[T], fact: &Fact) -> Option<Match> {
    let free = vec![false; existing.len()];
    if fact.kind.is_alias() {
        find(existing, &free, |s| same_alias(s, fact))
            .map(|i| Match::new(i, MatchStrategy::VirtualByMacAndIdentifier))
            .or_else(|| {
                alias_by_mac(existing, &free, fact)
                    .map(|i| Match::new(i, MatchStrategy::VirtualByMacOnly))
            })
    } else {
        find(existing, &free, |s| same_device_identifier(s, fact))
            .map(|i| Match::new(i, MatchStrategy::DeviceByIdentifier))
            .or_else(|| {
                find(existing, &free, |s| same_physical_mac(s, fact))
                    .map(|i| Match::new(i, MatchStrategy::DeviceByMac))
            })
    }
}

/// Link device facts (physical, bond, bridge) in phases.
///
/// Every identifier match is decided before any MAC fallback, so the
/// outcome does not depend on fact order when names are swapped. A
/// stored record is claimed at most once; `claimed` is updated in place.
pub(crate) fn match_devices<T: AsRef<InterfaceAttrs>>(
    existing: &[T],
    facts: &[Fact],
    suggested_primary: Option<&str>,
    claimed: &mut [bool],
) -> Vec<Option<Match>> {
    let mut matches: Vec<Option<Match>> = vec![None; facts.len()];

    for (i, fact) in facts.iter().enumerate() {
        let found = find(existing, claimed, |stored| {
            same_device_identifier(stored, fact) && !renamed_elsewhere(stored, i, facts)
        });
        claim(&mut matches[i], claimed, found, MatchStrategy::DeviceByIdentifier);
    }

    for (i, fact) in facts.iter().enumerate() {
        if matches[i].is_none() {
            let found = find(existing, claimed, |stored| same_physical_mac(stored, fact));
            claim(&mut matches[i], claimed, found, MatchStrategy::DeviceByMac);
        }
    }

    if let Some(name) = suggested_primary {
        for (i, fact) in facts.iter().enumerate() {
            if matches[i].is_none() && fact.name == name {
                let found = find(existing, claimed, is_placeholder);
                claim(&mut matches[i], claimed, found, MatchStrategy::PrimaryPlaceholder);
            }
        }
    }

    log_matches(existing, facts, &matches);
    matches
}

/// Link alias facts in phases, after the devices claimed their records.
///
/// `existing` must carry the identifiers aliases will have once device
/// renames have cascaded.
pub(crate) fn match_aliases<T: AsRef<InterfaceAttrs>>(
    existing: &[T],
    facts: &[Fact],
    claimed: &mut [bool],
) -> Vec<Option<Match>> {
    let mut matches: Vec<Option<Match>> = vec![None; facts.len()];

    for (i, fact) in facts.iter().enumerate() {
        let found = find(existing, claimed, |stored| same_alias(stored, fact));
        claim(&mut matches[i], claimed, found, MatchStrategy::VirtualByMacAndIdentifier);
    }

    for (i, fact) in facts.iter().enumerate() {
        if matches[i].is_none() {
            let found = alias_by_mac(existing, claimed, fact);
            claim(&mut matches[i], claimed, found, MatchStrategy::VirtualByMacOnly);
        }
    }

    log_matches(existing, facts, &matches);
    matches
}

// ── Predicates ───────────────────────────────────────────────────────

fn same_device_identifier(stored: &InterfaceAttrs, fact: &Fact) -> bool {
    if fact.identifier.is_empty() || stored.identifier != fact.identifier {
        return false;
    }
    match fact.kind {
        InterfaceKind::Physical => stored.kind.is_device(),
        // Bond and bridge MACs are not stable; the name is all we have.
        // Older records may carry them as plain aliases.
        InterfaceKind::Bond | InterfaceKind::Bridge => {
            stored.kind.is_device() || stored.kind.is_alias()
        }
        InterfaceKind::Virtual | InterfaceKind::Bmc => false,
    }
}

fn same_physical_mac(stored: &InterfaceAttrs, fact: &Fact) -> bool {
    fact.kind == InterfaceKind::Physical
        && stored.kind == InterfaceKind::Physical
        && fact.mac.is_some()
        && stored.mac == fact.mac
}

/// The stored NIC kept its name but its MAC now shows up under another
/// name: the NIC was renamed, not replaced.
fn renamed_elsewhere(stored: &InterfaceAttrs, index: usize, facts: &[Fact]) -> bool {
    let fact = &facts[index];
    fact.kind == InterfaceKind::Physical
        && stored.mac.is_some()
        && stored.mac != fact.mac
        && facts
            .iter()
            .enumerate()
            .any(|(j, other)| j != index && other.kind == InterfaceKind::Physical && other.mac == stored.mac)
}

fn is_placeholder(stored: &InterfaceAttrs) -> bool {
    stored.kind == InterfaceKind::Physical
        && stored.primary
        && stored.identifier.is_empty()
        && stored.mac.is_none()
}

fn same_alias(stored: &InterfaceAttrs, fact: &Fact) -> bool {
    stored.kind.is_alias()
        && !fact.identifier.is_empty()
        && stored.identifier == fact.identifier
        && stored.mac == fact.mac
}

fn alias_by_mac<T: AsRef<InterfaceAttrs>>(existing: &[T], claimed: &[bool], fact: &Fact) -> Option<usize> {
    if !fact.identifier.is_empty() || fact.mac.is_none() {
        return None;
    }
    let candidates: Vec<usize> = existing
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            let s = attrs(*s);
            s.kind.is_alias() && s.mac == fact.mac
        })
        .map(|(i, _)| i)
        .collect();
    match candidates.as_slice() {
        [only] if !claimed[*only] => Some(*only),
        [_] | [] => None,
        many => {
            warn!(
                fact = %fact.name,
                candidates = many.len(),
                "ambiguous alias match by MAC, treating as new interface"
            );
            None
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn attrs<T: AsRef<InterfaceAttrs>>(stored: &T) -> &InterfaceAttrs {
    stored.as_ref()
}

fn find<T, P>(existing: &[T], claimed: &[bool], predicate: P) -> Option<usize>
where
    T: AsRef<InterfaceAttrs>,
    P: Fn(&InterfaceAttrs) -> bool,
{
    existing
        .iter()
        .enumerate()
        .find(|(i, stored)| {
            let stored = attrs(*stored);
            !claimed[*i] && !stored.kind.is_bmc() && predicate(stored)
        })
        .map(|(i, _)| i)
}

fn claim(slot: &mut Option<Match>, claimed: &mut [bool], found: Option<usize>, strategy: MatchStrategy) {
    if let Some(index) = found {
        claimed[index] = true;
        *slot = Some(Match::new(index, strategy));
    }
}

fn log_matches<T: AsRef<InterfaceAttrs>>(existing: &[T], facts: &[Fact], matches: &[Option<Match>]) {
    for (fact, m) in facts.iter().zip(matches) {
        match m {
            Some(m) => debug!(
                fact = %fact.name,
                interface = %attrs(&existing[m.index]).label(),
                strategy = %m.strategy,
                "matched fact"
            ),
            None => debug!(fact = %fact.name, "no stored interface matches fact"),
        }
    }
}
