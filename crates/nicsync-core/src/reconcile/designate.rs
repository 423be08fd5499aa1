// BMC upsert and primary/provision designation.

use tracing::{debug, info};

use super::matching::match_fact;
use super::plan::Workspace;
use crate::facts::Fact;
use crate::model::InterfaceAttrs;

/// Fact name BMC changes are attributed to.
pub(crate) const BMC_FACT: &str = "ipmi";

/// Update the BMC carrying the reported MAC, else the first BMC, else
/// create one. Reported fields replace stored ones; absent ones stay.
pub(crate) fn upsert_bmc(ws: &mut Workspace, fact: &Fact) -> usize {
    let bmcs: Vec<usize> = ws
        .slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.attrs.kind.is_bmc())
        .map(|(i, _)| i)
        .collect();
    let target = bmcs
        .iter()
        .copied()
        .find(|i| fact.mac.is_some() && ws.slots[*i].attrs.mac == fact.mac)
        .or_else(|| bmcs.first().copied());

    match target {
        Some(index) => {
            let attrs = &mut ws.slots[index].attrs;
            if fact.mac.is_some() {
                attrs.mac.clone_from(&fact.mac);
            }
            if fact.ip.is_some() {
                attrs.ip = fact.ip;
            }
            if fact.ip6.is_some() {
                attrs.ip6 = fact.ip6;
            }
            if let Some(link) = fact.link {
                attrs.link = link;
            }
            ws.touch(index, Some(BMC_FACT));
            debug!(interface = %ws.slots[index].attrs.label(), "updating BMC");
            index
        }
        None => {
            let mut attrs = InterfaceAttrs::new(fact.kind).with_identifier(fact.identifier.clone());
            attrs.mac.clone_from(&fact.mac);
            attrs.ip = fact.ip;
            attrs.ip6 = fact.ip6;
            attrs.link = fact.link.unwrap_or(true);
            debug!(mac = ?fact.mac, "creating BMC");
            ws.push(attrs, Some(BMC_FACT))
        }
    }
}

/// Inputs of the designation step.
pub(crate) struct Suggestion<'a> {
    /// The suggested primary, normalized.
    pub(crate) fact: Option<&'a Fact>,
    /// Slot produced by the fact of the same name in this pass.
    pub(crate) slot: Option<usize>,
}

/// Settle the primary and provision flags after all facts applied.
///
/// With `protect` set the suggested primary is ignored; the host still
/// ends up with exactly one primary and one provision interface.
pub(crate) fn designate(ws: &mut Workspace, suggestion: &Suggestion<'_>, protect: bool) {
    let mut primary = keep_first(ws, |a| a.primary, |a| a.primary = false);
    let mut provision = keep_first(ws, |a| a.provision, |a| a.provision = false);

    let primary_has_mac = primary.is_some_and(|p| ws.slots[p].attrs.mac.is_some());
    if !primary_has_mac && !protect {
        let target = suggestion
            .slot
            .or_else(|| suggestion.fact.and_then(|f| match_fact(ws.slots.as_slice(), f).map(|m| m.index)))
            .filter(|t| !ws.slots[*t].attrs.kind.is_bmc());

        if let Some(target) = target.filter(|t| Some(*t) != primary) {
            info!(
                interface = %ws.slots[target].attrs.label(),
                "designating suggested primary interface"
            );
            if let Some(old) = primary {
                ws.slots[old].attrs.primary = false;
                ws.touch(old, None);
            }
            ws.slots[target].attrs.primary = true;
            ws.touch(target, None);

            if provision.is_none() || provision == primary {
                if let Some(old) = provision {
                    ws.slots[old].attrs.provision = false;
                    ws.touch(old, None);
                }
                ws.slots[target].attrs.provision = true;
                provision = Some(target);
            }
            primary = Some(target);
        }
    }

    let primary = match primary {
        Some(p) => p,
        None => {
            let fallback = ws
                .slots
                .iter()
                .position(|s| s.attrs.kind.is_device())
                .or_else(|| ws.slots.iter().position(|s| !s.attrs.kind.is_bmc()));
            match fallback {
                Some(index) => {
                    ws.slots[index].attrs.primary = true;
                    ws.touch(index, None);
                    debug!(interface = %ws.slots[index].attrs.label(), "defaulting primary interface");
                    index
                }
                None => {
                    debug!("host has no interfaces, creating primary placeholder");
                    ws.push(InterfaceAttrs::placeholder(), None)
                }
            }
        }
    };

    if provision.is_none() && !ws.slots[primary].attrs.provision {
        ws.slots[primary].attrs.provision = true;
        ws.touch(primary, None);
    }
}

/// Index of the first slot with a flag set; the flag is cleared on every
/// later slot.
fn keep_first(
    ws: &mut Workspace,
    is_set: impl Fn(&InterfaceAttrs) -> bool,
    clear: impl Fn(&mut InterfaceAttrs),
) -> Option<usize> {
    let flagged: Vec<usize> = ws
        .slots
        .iter()
        .enumerate()
        .filter(|(_, s)| is_set(&s.attrs))
        .map(|(i, _)| i)
        .collect();
    for &extra in flagged.iter().skip(1) {
        clear(&mut ws.slots[extra].attrs);
        ws.touch(extra, None);
    }
    flagged.first().copied()
}
