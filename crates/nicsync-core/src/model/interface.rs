// ── Interface domain types ──

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use strum::{Display, EnumString, IntoStaticStr};

use super::mac::MacAddress;

/// Store-assigned identity of a persisted interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(u64);

impl InterfaceId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interface flavour.
///
/// Physical NICs, bonds and bridges are *devices*; `Virtual` covers VLAN
/// and IP aliases attached to a device; `Bmc` is the out-of-band
/// management controller.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InterfaceKind {
    #[default]
    Physical,
    Bond,
    Bridge,
    Virtual,
    Bmc,
}

impl InterfaceKind {
    pub fn is_device(self) -> bool {
        matches!(self, Self::Physical | Self::Bond | Self::Bridge)
    }

    pub fn is_alias(self) -> bool {
        matches!(self, Self::Virtual)
    }

    pub fn is_bmc(self) -> bool {
        matches!(self, Self::Bmc)
    }
}

/// Mutable attributes of an interface, shared by persisted records and
/// records that have not been created yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct InterfaceAttrs {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub ip6: Option<Ipv6Addr>,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: InterfaceKind,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub provision: bool,
    #[serde(default = "link_up")]
    pub link: bool,
}

fn link_up() -> bool {
    true
}

impl InterfaceAttrs {
    /// Blank attributes of the given kind, link up.
    pub fn new(kind: InterfaceKind) -> Self {
        Self {
            identifier: String::new(),
            mac: None,
            ip: None,
            ip6: None,
            is_virtual: kind.is_alias(),
            attached_to: None,
            kind,
            primary: false,
            provision: false,
            link: true,
        }
    }

    /// The record created when a host has no interface at all.
    pub fn placeholder() -> Self {
        Self::new(InterfaceKind::Physical)
            .with_primary(true)
            .with_provision(true)
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_mac(mut self, mac: MacAddress) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn with_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_ip6(mut self, ip6: Ipv6Addr) -> Self {
        self.ip6 = Some(ip6);
        self
    }

    pub fn with_attached_to(mut self, parent: impl Into<String>) -> Self {
        self.attached_to = Some(parent.into());
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_provision(mut self, provision: bool) -> Self {
        self.provision = provision;
        self
    }

    pub fn with_link(mut self, link: bool) -> Self {
        self.link = link;
        self
    }

    /// Human-readable label for logs and reports.
    pub fn label(&self) -> String {
        if !self.identifier.is_empty() {
            self.identifier.clone()
        } else if let Some(mac) = &self.mac {
            mac.to_string()
        } else {
            format!("<unnamed {}>", self.kind)
        }
    }

    /// Names of the fields that differ between `self` and `other`.
    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.identifier != other.identifier {
            fields.push("identifier");
        }
        if self.mac != other.mac {
            fields.push("mac");
        }
        if self.ip != other.ip {
            fields.push("ip");
        }
        if self.ip6 != other.ip6 {
            fields.push("ip6");
        }
        if self.is_virtual != other.is_virtual {
            fields.push("virtual");
        }
        if self.attached_to != other.attached_to {
            fields.push("attached_to");
        }
        if self.kind != other.kind {
            fields.push("type");
        }
        if self.primary != other.primary {
            fields.push("primary");
        }
        if self.provision != other.provision {
            fields.push("provision");
        }
        if self.link != other.link {
            fields.push("link");
        }
        fields
    }
}

impl AsRef<InterfaceAttrs> for InterfaceAttrs {
    fn as_ref(&self) -> &InterfaceAttrs {
        self
    }
}

/// A persisted interface belonging to a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    #[serde(flatten)]
    pub attrs: InterfaceAttrs,
    /// Optimistic lock counter, bumped by the store on every update.
    #[serde(default)]
    pub lock_version: u64,
}

impl Interface {
    pub fn new(id: InterfaceId, attrs: InterfaceAttrs) -> Self {
        Self {
            id,
            attrs,
            lock_version: 0,
        }
    }
}

impl AsRef<InterfaceAttrs> for Interface {
    fn as_ref(&self) -> &InterfaceAttrs {
        &self.attrs
    }
}
