// ── Runtime reconciliation options ──
//
// These types describe *how* a reconciliation pass treats incoming facts.
// They never touch disk: the CLI (through `nicsync-config`) builds a
// `ReconcileOptions` and hands it in.

use regex::Regex;

use crate::error::CoreError;

/// Identifiers discovery commonly reports that never belong in inventory.
pub const DEFAULT_IGNORED_IDENTIFIERS: &[&str] = &[
    "lo", "usb*", "vnet*", "macvtap*", "veth*", "docker*", "tap*", "qbr*", "qvb*", "qvo*",
    "qr-*", "qg-*", "vlinuxbr*", "vovsbr*",
];

/// Options for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Glob patterns (`*` wildcard) of fact identifiers to skip.
    pub ignored_identifiers: Vec<String>,
    /// Leave the primary and provision interfaces alone: facts matching
    /// them are skipped and the suggested primary is not applied.
    pub ignore_facts_for_provisioning: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            ignored_identifiers: DEFAULT_IGNORED_IDENTIFIERS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            ignore_facts_for_provisioning: false,
        }
    }
}

/// Compiled form of [`ReconcileOptions::ignored_identifiers`].
#[derive(Debug, Clone, Default)]
pub(crate) struct IgnoreList {
    patterns: Vec<Regex>,
}

impl IgnoreList {
    pub(crate) fn compile(patterns: &[String]) -> Result<Self, CoreError> {
        let patterns = patterns
            .iter()
            .map(|p| glob_to_regex(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub(crate) fn matches(&self, identifier: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(identifier))
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex, CoreError> {
    const MAX_PATTERN_LEN: usize = 256;

    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(CoreError::Config {
            message: "ignored identifier patterns must not be empty".into(),
        });
    }
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(CoreError::Config {
            message: format!("ignored identifier pattern longer than {MAX_PATTERN_LEN} bytes"),
        });
    }

    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    Regex::new(&format!("^{body}$")).map_err(|e| CoreError::Config {
        message: format!("invalid ignored identifier pattern '{pattern}': {e}"),
    })
}
