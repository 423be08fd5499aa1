// ── Hardware address type ──
//
// Every MAC that enters the model goes through `MacAddress::parse`, so
// facts and stored records compare with plain equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected MAC address text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address '{0}'")]
pub struct MacParseError(pub String);

/// MAC address, normalized to lowercase colon-separated octets.
///
/// Both the 48-bit (6 octet) and the 64-bit (8 octet) forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse and normalize a MAC from any common format.
    ///
    /// Accepts colon-separated, dash-separated (octets may drop a leading
    /// zero, e.g. `0:1a:2b:...`), or bare hex.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, MacParseError> {
        let raw = raw.as_ref().trim();
        let invalid = || MacParseError(raw.to_owned());

        let octets: Vec<String> = if raw.contains([':', '-']) {
            raw.split([':', '-'])
                .map(|group| {
                    let valid = (1..=2).contains(&group.len())
                        && group.chars().all(|c| c.is_ascii_hexdigit());
                    valid.then(|| format!("{group:0>2}"))
                })
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?
        } else {
            if raw.len() % 2 != 0 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            raw.as_bytes()
                .chunks(2)
                .map(|pair| String::from_utf8_lossy(pair).into_owned())
                .collect()
        };

        if octets.len() != 6 && octets.len() != 8 {
            return Err(invalid());
        }

        Ok(Self(octets.join(":").to_lowercase()))
    }

    /// Parse optional fact text: blank means "no MAC".
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, MacParseError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => Self::parse(text).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = MacParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}
