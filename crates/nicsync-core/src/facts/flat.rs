// Parser for flat agent payloads:
//
//   { "interfaces": "eth0,eth0_1,bond0",
//     "macaddress_eth0": "...", "ipaddress_eth0": "...",
//     "ipmi_macaddress": "...", "ipaddress": "..." }
//
// Values are stringified scalars; structured values are rejected.

use serde_json::{Map, Value};

use super::{FactRecord, FactSet, SuggestedPrimary, kind_from_identifier};
use crate::error::CoreError;

const ALIAS_SEPARATORS: [char; 3] = ['.', ':', '_'];

/// Parse a flat payload held in any JSON value.
pub fn parse_value(payload: &Value) -> Result<FactSet, CoreError> {
    match payload {
        Value::Object(map) => parse(map),
        other => Err(CoreError::Facts {
            message: format!("expected an object of facts, got {}", type_name(other)),
        }),
    }
}

/// Build a [`FactSet`] from a flat key/value payload.
pub fn parse(payload: &Map<String, Value>) -> Result<FactSet, CoreError> {
    let mut set = FactSet::new();

    for name in interface_names(payload)? {
        let record = FactRecord {
            mac: scalar(payload, &format!("macaddress_{name}"))?,
            ip: scalar(payload, &format!("ipaddress_{name}"))?,
            ip6: scalar(payload, &format!("ipaddress6_{name}"))?,
            ..FactRecord::default()
        };
        let record = if kind_from_identifier(&name).is_some() {
            record.with_virtual(true)
        } else if let Some(parent) = alias_parent(&name) {
            record.with_virtual(true).with_attached_to(parent)
        } else {
            record
        };
        set.interfaces.insert(name, record);
    }

    let ipmi = FactRecord {
        mac: scalar(payload, "ipmi_macaddress")?,
        ip: scalar(payload, "ipmi_ipaddress")?,
        ..FactRecord::default()
    };
    if !ipmi.is_blank() {
        set.ipmi = Some(ipmi);
    }

    set.suggested_primary = suggest_primary(
        &set,
        scalar(payload, "ipaddress")?.as_deref(),
        scalar(payload, "macaddress")?.as_deref(),
    );

    Ok(set)
}

fn interface_names(payload: &Map<String, Value>) -> Result<Vec<String>, CoreError> {
    let Some(list) = scalar(payload, "interfaces")? else {
        return Ok(Vec::new());
    };
    let mut names: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }
    Ok(names)
}

/// `eth0_1` → `eth0`, `bond0.10` → `bond0`; plain names have no parent.
fn alias_parent(name: &str) -> Option<&str> {
    name.char_indices()
        .skip(1)
        .find(|(_, c)| ALIAS_SEPARATORS.contains(c))
        .map(|(idx, _)| &name[..idx])
}

fn scalar(payload: &Map<String, Value>, key: &str) -> Result<Option<String>, CoreError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(CoreError::Facts {
            message: format!("fact '{key}' must be a scalar, got {}", type_name(other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn same(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| a.trim().eq_ignore_ascii_case(b.trim()))
}

fn suggest_primary(set: &FactSet, ip: Option<&str>, mac: Option<&str>) -> Option<SuggestedPrimary> {
    let has = |value: Option<&String>| value.is_some_and(|v| !v.trim().is_empty());

    let by_host_address = ip.filter(|ip| !ip.trim().is_empty()).and_then(|ip| {
        set.interfaces.iter().find(|(_, record)| {
            same(record.ip.as_deref(), ip)
                && mac.is_none_or(|mac| same(record.mac.as_deref(), mac))
        })
    });

    by_host_address
        .or_else(|| {
            set.interfaces
                .iter()
                .find(|(_, r)| !r.is_virtual && has(r.mac.as_ref()) && has(r.ip.as_ref()))
        })
        .or_else(|| set.interfaces.iter().find(|(_, r)| has(r.mac.as_ref())))
        .map(|(name, record)| SuggestedPrimary {
            name: name.clone(),
            record: record.clone(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse_json(value: Value) -> FactSet {
        parse_value(&value).unwrap()
    }

    #[test]
    fn parses_interfaces_in_listed_order() {
        let set = parse_json(json!({
            "interfaces": "eth1,eth0,lo",
            "macaddress_eth0": "00:00:00:11:22:33",
            "ipaddress_eth0": "10.0.0.1",
            "macaddress_eth1": "00:00:00:11:22:34",
            "ipaddress6_eth1": "2001:db8::2",
        }));
        let names: Vec<&str> = set.interfaces.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["eth1", "eth0", "lo"]);
        assert_eq!(set.interfaces["eth0"].ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(set.interfaces["eth1"].ip6.as_deref(), Some("2001:db8::2"));
        assert!(set.interfaces["lo"].is_blank());
    }

    #[test]
    fn aliases_attach_to_their_base_device() {
        let set = parse_json(json!({
            "interfaces": "eth0,eth0_1,bond0.10",
            "macaddress_eth0_1": "00:00:00:11:22:33",
        }));
        let alias = &set.interfaces["eth0_1"];
        assert!(alias.is_virtual);
        assert_eq!(alias.attached_to.as_deref(), Some("eth0"));
        assert_eq!(set.interfaces["bond0.10"].attached_to.as_deref(), Some("bond0"));
        assert!(!set.interfaces["eth0"].is_virtual);
    }

    #[test]
    fn bonds_and_bridges_are_virtual_without_parent() {
        let set = parse_json(json!({"interfaces": "bond0,br1"}));
        for name in ["bond0", "br1"] {
            assert!(set.interfaces[name].is_virtual);
            assert_eq!(set.interfaces[name].attached_to, None);
        }
    }

    #[test]
    fn ipmi_facts_become_the_bmc_record() {
        let set = parse_json(json!({
            "ipmi_macaddress": "00:00:00:11:33:55",
            "ipmi_ipaddress": "192.168.0.1",
        }));
        let ipmi = set.ipmi.unwrap();
        assert_eq!(ipmi.mac.as_deref(), Some("00:00:00:11:33:55"));
        assert_eq!(ipmi.ip.as_deref(), Some("192.168.0.1"));
        assert!(set.interfaces.is_empty());
    }

    #[test]
    fn suggested_primary_follows_host_address() {
        let set = parse_json(json!({
            "interfaces": "eth0,eth1",
            "ipaddress": "10.0.0.2",
            "macaddress_eth0": "00:00:00:11:22:33",
            "ipaddress_eth0": "10.0.0.1",
            "macaddress_eth1": "00:00:00:11:22:34",
            "ipaddress_eth1": "10.0.0.2",
        }));
        assert_eq!(set.suggested_primary.unwrap().name, "eth1");
    }

    #[test]
    fn suggested_primary_falls_back_to_first_addressed_device() {
        let set = parse_json(json!({
            "interfaces": "eth0_0,eth0,eth1",
            "macaddress_eth0_0": "00:00:00:11:22:33",
            "ipaddress_eth0_0": "10.0.0.9",
            "macaddress_eth0": "00:00:00:11:22:33",
            "ipaddress_eth0": "10.0.0.1",
            "macaddress_eth1": "00:00:00:11:22:34",
        }));
        assert_eq!(set.suggested_primary.unwrap().name, "eth0");
    }

    #[test]
    fn no_macs_means_no_suggestion() {
        let set = parse_json(json!({"interfaces": "eth0"}));
        assert!(set.suggested_primary.is_none());
    }

    #[test]
    fn scalars_are_stringified() {
        let set = parse_json(json!({"interfaces": "eth0", "ipaddress_eth0": 42}));
        assert_eq!(set.interfaces["eth0"].ip.as_deref(), Some("42"));
    }

    #[test]
    fn structured_values_are_rejected() {
        let err = parse_value(&json!({"interfaces": ["eth0"]})).unwrap_err();
        assert!(matches!(err, CoreError::Facts { .. }));
        let err = parse_value(&json!("eth0")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed facts: expected an object of facts, got a string"
        );
    }
}
