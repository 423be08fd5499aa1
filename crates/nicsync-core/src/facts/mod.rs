// ── Discovered-fact model ──
//
// `FactRecord` is the raw shape a parser hands over (plain strings, as
// reported). `Fact` is the normalized, strongly typed form the reconciler
// works with. Normalization failures are per-record validation errors.

pub mod flat;

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{InterfaceKind, MacAddress};

static BOND_IDENTIFIER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^bond\d+$").ok());
static BRIDGE_IDENTIFIER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^br\d+$").ok());

fn is_match(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

/// Device kind implied by an identifier alone (`bond0`, `br1`, ...).
pub(crate) fn kind_from_identifier(identifier: &str) -> Option<InterfaceKind> {
    if is_match(&BOND_IDENTIFIER, identifier) {
        Some(InterfaceKind::Bond)
    } else if is_match(&BRIDGE_IDENTIFIER, identifier) {
        Some(InterfaceKind::Bridge)
    } else {
        None
    }
}

// ── Raw records ─────────────────────────────────────────────────────

/// One discovered interface, as reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    #[serde(default, alias = "macaddress", skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, alias = "ipaddress", skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, alias = "ipaddress6", skip_serializing_if = "Option::is_none")]
    pub ip6: Option<String>,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    /// Overrides the fact name as the interface identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<bool>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<InterfaceKind>,
}

impl FactRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_ip6(mut self, ip6: impl Into<String>) -> Self {
        self.ip6 = Some(ip6.into());
        self
    }

    pub fn with_virtual(mut self, is_virtual: bool) -> Self {
        self.is_virtual = is_virtual;
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_attached_to(mut self, parent: impl Into<String>) -> Self {
        self.attached_to = Some(parent.into());
        self
    }

    pub fn with_link(mut self, link: bool) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_kind(mut self, kind: InterfaceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// True when the record carries no address information at all.
    pub fn is_blank(&self) -> bool {
        blank(self.mac.as_deref()) && blank(self.ip.as_deref()) && blank(self.ip6.as_deref())
    }

    /// Normalize an entry of the interface map named `name`.
    pub fn normalize(&self, name: &str) -> Result<Fact, CoreError> {
        let identifier = self.identifier.as_deref().unwrap_or(name).trim().to_owned();
        let kind = match self.kind {
            Some(InterfaceKind::Bmc) => {
                return Err(CoreError::validation(
                    name,
                    "type",
                    "BMC records must be reported as the IPMI record",
                ));
            }
            Some(kind) => kind,
            None => kind_from_identifier(&identifier).unwrap_or(if self.is_virtual {
                InterfaceKind::Virtual
            } else {
                InterfaceKind::Physical
            }),
        };
        self.build(name, identifier, kind)
    }

    /// Normalize the IPMI record of a fact set.
    pub fn normalize_bmc(&self) -> Result<Fact, CoreError> {
        let identifier = self.identifier.as_deref().unwrap_or_default().trim().to_owned();
        self.build("ipmi", identifier, InterfaceKind::Bmc)
    }

    fn build(&self, name: &str, identifier: String, kind: InterfaceKind) -> Result<Fact, CoreError> {
        let mac = MacAddress::parse_optional(self.mac.as_deref())
            .map_err(|e| CoreError::validation(name, "mac", e.to_string()))?;
        let ip = parse_ipv4(self.ip.as_deref())
            .map_err(|reason| CoreError::validation(name, "ip", reason))?;
        let ip6 = parse_ipv6(self.ip6.as_deref())
            .map_err(|reason| CoreError::validation(name, "ip6", reason))?;
        let attached_to = self
            .attached_to
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Ok(Fact {
            name: name.to_owned(),
            identifier,
            mac,
            ip,
            ip6,
            is_virtual: self.is_virtual || kind.is_alias(),
            attached_to,
            link: self.link,
            kind,
        })
    }
}

fn blank(raw: Option<&str>) -> bool {
    raw.is_none_or(|s| s.trim().is_empty())
}

fn parse_ipv4(raw: Option<&str>) -> Result<Option<Ipv4Addr>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| format!("'{text}' is not an IPv4 address")),
    }
}

fn parse_ipv6(raw: Option<&str>) -> Result<Option<Ipv6Addr>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => {
            let candidate = text.split('/').next().unwrap_or(text).trim();
            candidate
                .parse()
                .map(Some)
                .map_err(|_| format!("'{text}' is not an IPv6 address"))
        }
    }
}

// ── Fact sets ───────────────────────────────────────────────────────

/// The suggested primary interface picked by the fact parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPrimary {
    pub name: String,
    #[serde(flatten)]
    pub record: FactRecord,
}

/// Everything a parser discovered about a host's networking.
///
/// `interfaces` keeps insertion order; it is the processing order of a
/// reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSet {
    #[serde(default)]
    pub interfaces: IndexMap<String, FactRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipmi: Option<FactRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_primary: Option<SuggestedPrimary>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, name: impl Into<String>, record: FactRecord) -> Self {
        self.interfaces.insert(name.into(), record);
        self
    }

    pub fn with_ipmi(mut self, record: FactRecord) -> Self {
        self.ipmi = Some(record);
        self
    }

    /// Suggest the already-added interface `name` as primary.
    ///
    /// Unknown names leave the suggestion unset.
    pub fn with_suggested_primary(mut self, name: &str) -> Self {
        self.suggested_primary = self.interfaces.get(name).map(|record| SuggestedPrimary {
            name: name.to_owned(),
            record: record.clone(),
        });
        self
    }

    /// Suggest a primary that is not necessarily part of `interfaces`.
    pub fn with_suggested_record(mut self, name: impl Into<String>, record: FactRecord) -> Self {
        self.suggested_primary = Some(SuggestedPrimary {
            name: name.into(),
            record,
        });
        self
    }

    /// The IPMI record, unless it is absent or carries no addresses.
    pub fn bmc_record(&self) -> Option<&FactRecord> {
        self.ipmi.as_ref().filter(|r| !r.is_blank())
    }
}

// ── Normalized facts ────────────────────────────────────────────────

/// A validated, typed fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    /// Name the discovery source used as map key.
    pub name: String,
    /// Effective identifier: the explicit override, else `name`.
    pub identifier: String,
    pub mac: Option<MacAddress>,
    pub ip: Option<Ipv4Addr>,
    pub ip6: Option<Ipv6Addr>,
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
    pub attached_to: Option<String>,
    pub link: Option<bool>,
    #[serde(rename = "type")]
    pub kind: InterfaceKind,
}
