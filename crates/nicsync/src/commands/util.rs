//! Shared helpers for command handlers: state and fact files, lookups.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use nicsync_core::facts::flat;
use nicsync_core::{CoreError, FactSet, Interface, InterfaceId, MacAddress, MemoryStore};

use crate::error::CliError;

/// On-disk host state: `{"interfaces": [...]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

/// Read a state file. With `missing_ok` a nonexistent file is an empty
/// host.
pub fn read_state(path: &Path, missing_ok: bool) -> Result<StateFile, CliError> {
    if !path.exists() {
        if missing_ok {
            debug!(path = %path.display(), "state file missing, starting from an empty host");
            return Ok(StateFile::default());
        }
        return Err(CliError::NotFound {
            resource_type: "state file".into(),
            identifier: path.display().to_string(),
            hint: "Create it with: nicsync reconcile --state <path> --facts <file> --write".into(),
        });
    }

    let contents = std::fs::read_to_string(path)?;
    let state: StateFile = serde_json::from_str(&contents).map_err(|e| CliError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    if let Some(dup) = state.interfaces.iter().find(|i| !seen.insert(i.id)) {
        return Err(CliError::Validation {
            field: "state".into(),
            reason: format!("interface id {} appears more than once", dup.id),
        });
    }
    Ok(state)
}

/// Write the store contents back as a state file.
pub fn write_state(path: &Path, store: &MemoryStore) -> Result<usize, CliError> {
    let state = StateFile {
        interfaces: store.snapshot().iter().map(|i| Interface::clone(i)).collect(),
    };
    let json = serde_json::to_string_pretty(&state).map_err(|e| CliError::Render(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{json}\n"))?;
    Ok(state.interfaces.len())
}

/// Read a fact file: JSON, or YAML for `.yaml` / `.yml`. `flat` selects
/// the agent key/value payload format.
pub fn read_facts(path: &Path, flat: bool) -> Result<FactSet, CliError> {
    if !path.exists() {
        return Err(CliError::NotFound {
            resource_type: "fact file".into(),
            identifier: path.display().to_string(),
            hint: "Pass the file discovery produced with --facts".into(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let display = path.display().to_string();
    let invalid = |reason: String| CliError::InvalidFacts {
        path: display.clone(),
        reason,
    };
    let yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    if flat {
        let payload: serde_json::Value = if yaml {
            serde_yaml::from_str(&contents).map_err(|e| invalid(e.to_string()))?
        } else {
            serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?
        };
        return flat::parse_value(&payload).map_err(|e| match e {
            CoreError::Facts { message } => invalid(message),
            other => other.into(),
        });
    }

    if yaml {
        serde_yaml::from_str(&contents).map_err(|e| invalid(e.to_string()))
    } else {
        serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))
    }
}

/// Resolve an interface by id, identifier, or MAC address.
pub fn find_interface(store: &MemoryStore, key: &str) -> Result<Arc<Interface>, CliError> {
    let not_found = || CliError::NotFound {
        resource_type: "interface".into(),
        identifier: key.into(),
        hint: "Run: nicsync interfaces list --state <file>".into(),
    };

    if let Ok(raw) = key.parse::<u64>() {
        return store.get(InterfaceId::new(raw)).ok_or_else(not_found);
    }

    let mut found = store.find_by_identifier(key);
    if found.is_empty() {
        if let Ok(mac) = MacAddress::parse(key) {
            found = store.find_by_mac(&mac);
        }
    }
    match found.len() {
        0 => Err(not_found()),
        1 => Ok(Arc::clone(&found[0])),
        n => Err(CliError::Validation {
            field: "interface".into(),
            reason: format!("'{key}' matches {n} interfaces, use the id instead"),
        }),
    }
}
