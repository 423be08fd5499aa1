// ── Interface reconciliation ──
//
// Brings a host's stored interfaces in line with discovered facts. A pass
// reads the store once, plans every change on a working copy, then writes
// the touched records in the order they were first touched. Interfaces
// are never deleted.

mod designate;
mod matching;
mod plan;

pub use matching::{Match, MatchStrategy, match_fact};

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use self::designate::{BMC_FACT, Suggestion, designate, upsert_bmc};
use self::matching::{match_aliases, match_devices};
use self::plan::{Proposal, Workspace, adjacency, cascade_identifier, projected, settle};
use crate::config::{IgnoreList, ReconcileOptions};
use crate::error::CoreError;
use crate::facts::{Fact, FactSet};
use crate::model::{Interface, InterfaceAttrs, InterfaceId};
use crate::store::InterfaceStore;

// ── Result types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
}

/// One write committed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub id: InterfaceId,
    pub identifier: String,
    pub action: ChangeAction,
    /// Names of the fields that differ from the stored record.
    pub fields: Vec<&'static str>,
    /// Fact that caused the write; `None` for designation-only changes.
    pub fact: Option<String>,
}

/// A fact whose effect was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFact {
    pub name: String,
    pub field: String,
    pub reason: String,
}

impl RejectedFact {
    fn new(name: &str, error: CoreError) -> Self {
        match error {
            CoreError::ValidationFailed { field, reason, .. } => Self {
                name: name.to_owned(),
                field,
                reason,
            },
            other => Self {
                name: name.to_owned(),
                field: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub changes: Vec<Change>,
    pub rejected: Vec<RejectedFact>,
    /// Facts left alone because of configuration.
    pub skipped: Vec<String>,
    pub primary: Option<InterfaceId>,
    pub provision: Option<InterfaceId>,
}

impl ReconciliationResult {
    /// True when the pass wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn created(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.action == ChangeAction::Created)
    }

    pub fn updated(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.action == ChangeAction::Updated)
    }

    fn reject(&mut self, name: &str, error: CoreError) {
        warn!(fact = name, error = %error, "rejecting fact");
        self.rejected.push(RejectedFact::new(name, error));
    }
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Applies fact sets to interface stores.
#[derive(Debug, Clone)]
pub struct Reconciler {
    options: ReconcileOptions,
    ignore: IgnoreList,
}

impl Reconciler {
    /// Fails when an ignored-identifier pattern is invalid.
    pub fn new(options: ReconcileOptions) -> Result<Self, CoreError> {
        let ignore = IgnoreList::compile(&options.ignored_identifiers)?;
        Ok(Self { options, ignore })
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Reconcile `store` against `facts`.
    ///
    /// Per-fact validation problems end up in
    /// [`ReconciliationResult::rejected`]. The only error returned is
    /// [`CoreError::Persistence`]: the first failed write stops the pass
    /// and earlier writes stay applied.
    pub fn reconcile<S: InterfaceStore + ?Sized>(
        &self,
        store: &S,
        facts: &FactSet,
    ) -> Result<ReconciliationResult, CoreError> {
        let mut result = ReconciliationResult::default();
        let mut ws = Workspace::new(store.interfaces());
        debug!(
            interfaces = ws.slots.len(),
            facts = facts.interfaces.len(),
            "reconciling interfaces"
        );

        let (devices, aliases) = self.normalize(facts, &mut result);
        let bmc = facts
            .bmc_record()
            .and_then(|record| match record.normalize_bmc() {
                Ok(fact) => Some(fact),
                Err(e) => {
                    result.reject(BMC_FACT, e);
                    None
                }
            });

        let protected: Vec<bool> = ws
            .slots
            .iter()
            .map(|s| self.options.ignore_facts_for_provisioning && (s.attrs.primary || s.attrs.provision))
            .collect();
        let mut claimed = vec![false; ws.slots.len()];

        // ── Devices ──
        let suggested_name = facts.suggested_primary.as_ref().map(|s| s.name.as_str());
        let device_matches = match_devices(&ws.slots, &devices, suggested_name, &mut claimed);

        let children = adjacency(&ws.slots);
        let mut proposals = Vec::new();
        for (i, (fact, found)) in devices.iter().zip(&device_matches).enumerate() {
            let slot = found.map(|m| m.index);
            if slot.is_some_and(|s| protected[s]) {
                debug!(fact = %fact.name, "fact matches a provisioning interface, skipping");
                result.skipped.push(fact.name.clone());
                continue;
            }
            let stored = slot.map(|s| ws.slots[s].attrs.identifier.as_str());
            let identifier = if fact.identifier.is_empty() {
                stored.unwrap_or_default().to_owned()
            } else {
                fact.identifier.clone()
            };
            let mut proposal = Proposal::new(i, slot, identifier);
            if let (Some(s), Some(old)) = (slot, stored) {
                if !old.is_empty() && old != proposal.identifier {
                    for &child in children.get(&s).into_iter().flatten() {
                        let current = &ws.slots[child].attrs.identifier;
                        let renamed = cascade_identifier(current, old, &proposal.identifier)
                            .unwrap_or_else(|| current.clone());
                        proposal.cascade.push((child, renamed));
                    }
                }
            }
            proposals.push(proposal);
        }

        let rejected = settle(&ws.slots, &proposals);
        for proposal in proposals.iter().filter(|p| rejected.contains(&p.fact)) {
            let fact = &devices[proposal.fact];
            result.reject(
                &fact.name,
                CoreError::validation(
                    &fact.name,
                    "identifier",
                    format!(
                        "renaming to '{}' would duplicate an interface identifier",
                        proposal.identifier
                    ),
                ),
            );
        }

        // ── Aliases ──
        let projection = projected(&ws.slots, &proposals, &rejected);
        let mut taken: HashSet<String> = projection
            .iter()
            .map(|(identifier, _)| (*identifier).to_owned())
            .chain(
                proposals
                    .iter()
                    .filter(|p| p.slot.is_none() && !rejected.contains(&p.fact))
                    .map(|p| p.identifier.clone()),
            )
            .filter(|identifier| !identifier.is_empty())
            .collect();
        let future: Vec<InterfaceAttrs> = ws
            .slots
            .iter()
            .zip(&projection)
            .map(|(slot, (identifier, _))| {
                let mut attrs = slot.attrs.clone();
                attrs.identifier = (*identifier).to_owned();
                attrs
            })
            .collect();
        let alias_matches = match_aliases(&future, &aliases, &mut claimed);

        let mut alias_plan = Vec::new();
        for (fact, found) in aliases.iter().zip(&alias_matches) {
            let slot = found.map(|m| m.index);
            if slot.is_some_and(|s| protected[s]) {
                debug!(fact = %fact.name, "fact matches a provisioning interface, skipping");
                result.skipped.push(fact.name.clone());
            } else if slot.is_none() && !fact.identifier.is_empty() && !taken.insert(fact.identifier.clone()) {
                result.reject(
                    &fact.name,
                    CoreError::validation(
                        &fact.name,
                        "identifier",
                        format!("identifier '{}' is already in use", fact.identifier),
                    ),
                );
            } else {
                alias_plan.push((fact, slot));
            }
        }

        // ── Apply ──
        let mut produced: HashMap<&str, usize> = HashMap::new();

        if let Some(fact) = &bmc {
            let creates = !ws.slots.iter().any(|s| s.attrs.kind.is_bmc());
            if creates && !fact.identifier.is_empty() && taken.contains(&fact.identifier) {
                result.reject(
                    BMC_FACT,
                    CoreError::validation(
                        BMC_FACT,
                        "identifier",
                        format!("identifier '{}' is already in use", fact.identifier),
                    ),
                );
            } else {
                upsert_bmc(&mut ws, fact);
            }
        }

        let mut addresses: HashMap<Ipv4Addr, usize> = HashMap::new();
        for proposal in proposals.iter().filter(|p| !rejected.contains(&p.fact)) {
            let fact = &devices[proposal.fact];
            let ip = fact.ip.filter(|ip| match addresses.get(ip) {
                Some(owner) if Some(*owner) != proposal.slot => {
                    warn!(fact = %fact.name, %ip, "address already assigned in this pass, leaving it unset");
                    false
                }
                _ => true,
            });
            let index = ws.apply_device(fact, proposal, ip);
            if let Some(ip) = ip {
                addresses.insert(ip, index);
            }
            produced.insert(fact.name.as_str(), index);
        }

        for (fact, slot) in alias_plan {
            let index = ws.apply_alias(fact, slot);
            produced.insert(fact.name.as_str(), index);
        }

        // ── Designate ──
        let suggested = facts.suggested_primary.as_ref().and_then(|s| {
            s.record
                .normalize(&s.name)
                .inspect_err(|e| debug!(error = %e, "suggested primary is not usable"))
                .ok()
        });
        let suggestion = Suggestion {
            fact: suggested.as_ref(),
            slot: suggested_name.and_then(|name| produced.get(name).copied()),
        };
        designate(&mut ws, &suggestion, self.options.ignore_facts_for_provisioning);

        // ── Write ──
        let mut ids: Vec<Option<InterfaceId>> = ws.slots.iter().map(plan::Slot::id).collect();
        for index in ws.pending() {
            let slot = &ws.slots[index];
            let written = match &slot.original {
                Some(original) => store.update(&Interface {
                    id: original.id,
                    attrs: slot.attrs.clone(),
                    lock_version: original.lock_version,
                }),
                None => store.create(slot.attrs.clone()),
            }
            .map_err(|source| CoreError::Persistence {
                interface: slot.attrs.label(),
                applied: result.changes.len(),
                source,
            })?;

            let action = if slot.is_new() {
                ChangeAction::Created
            } else {
                ChangeAction::Updated
            };
            debug!(interface = %slot.attrs.label(), id = %written.id, %action, "committed interface");
            result.changes.push(Change {
                id: written.id,
                identifier: written.attrs.identifier.clone(),
                action,
                fields: slot.changed_fields(),
                fact: slot.fact.clone(),
            });
            ids[index] = Some(written.id);
        }

        result.primary = flagged(&ws, &ids, |a| a.primary);
        result.provision = flagged(&ws, &ids, |a| a.provision);

        info!(
            created = result.created().count(),
            updated = result.updated().count(),
            rejected = result.rejected.len(),
            skipped = result.skipped.len(),
            "reconciliation complete"
        );
        Ok(result)
    }

    /// Validate facts and split them into devices and aliases, keeping
    /// fact order. Ignored and invalid facts are recorded in `result`.
    fn normalize(&self, facts: &FactSet, result: &mut ReconciliationResult) -> (Vec<Fact>, Vec<Fact>) {
        let mut devices = Vec::new();
        let mut aliases = Vec::new();

        for (name, record) in &facts.interfaces {
            let identifier = record
                .identifier
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .unwrap_or(name);
            if self.ignore.matches(identifier) {
                debug!(fact = %name, "ignoring fact by identifier");
                result.skipped.push(name.clone());
                continue;
            }

            match record.normalize(name) {
                Ok(fact) if fact.kind.is_alias() => aliases.push(fact),
                Ok(fact) => devices.push(fact),
                Err(e) => result.reject(name, e),
            }
        }

        (devices, aliases)
    }
}

fn flagged(
    ws: &Workspace,
    ids: &[Option<InterfaceId>],
    flag: impl Fn(&InterfaceAttrs) -> bool,
) -> Option<InterfaceId> {
    ws.slots
        .iter()
        .zip(ids)
        .find(|(slot, _)| flag(&slot.attrs))
        .and_then(|(_, id)| *id)
}
