//! Chain facts pulled out of config / global-properties payloads.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identify::ServerKind;

const VERSION_KEYS: [&str; 3] = [
    "HIVE_BLOCKCHAIN_VERSION",
    "STEEM_BLOCKCHAIN_VERSION",
    "STEEMIT_BLOCKCHAIN_VERSION",
];
const VERSION_SUFFIX: &str = "_blockchain_version";

/// Placeholder for facts a node did not report.
pub const UNKNOWN: &str = "Unknown";

/// Which chain a node serves, derived from its native currency ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Hive,
    Steem,
    Golos,
    Whaleshares,
    Unknown,
}

impl Network {
    /// Ticker → network table.
    pub fn from_ticker(ticker: &str) -> Self {
        match ticker.trim().to_uppercase().as_str() {
            "HIVE" => Self::Hive,
            "STEEM" => Self::Steem,
            "GOLOS" => Self::Golos,
            "WLS" => Self::Whaleshares,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hive => write!(f, "Hive"),
            Self::Steem => write!(f, "Steem"),
            Self::Golos => write!(f, "Golos"),
            Self::Whaleshares => write!(f, "Whaleshares"),
            Self::Unknown => write!(f, "{UNKNOWN}"),
        }
    }
}

/// Blockchain version from a `get_config` result.
///
/// Modern and proxied nodes expose it under a well-known key; legacy configs
/// are scanned for any key ending in `_BLOCKCHAIN_VERSION`.
pub fn extract_version(kind: ServerKind, config: &Value) -> String {
    let Some(obj) = config.as_object() else {
        return UNKNOWN.to_string();
    };
    let found = match kind {
        ServerKind::Legacy => obj
            .iter()
            .find(|(k, _)| k.to_lowercase().ends_with(VERSION_SUFFIX))
            .map(|(_, v)| v),
        _ => VERSION_KEYS.iter().find_map(|k| obj.get(*k)),
    };
    match found {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Native currency ticker from a supply string such as `"376318066.671 HIVE"`.
pub fn supply_ticker(supply: &str) -> Option<&str> {
    supply.split_whitespace().nth(1)
}

/// Network from a global-properties payload.
pub fn network_from_props(props: &Value) -> Network {
    ["virtual_supply", "current_supply"]
        .iter()
        .find_map(|k| props.get(*k).and_then(Value::as_str).and_then(supply_ticker))
        .map(Network::from_ticker)
        .unwrap_or(Network::Unknown)
}

/// Head block number from a global-properties payload.
pub fn head_block(props: &Value) -> Option<u64> {
    let v = props.get("head_block_number")?;
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// Parse a node timestamp (`2020-05-28T13:23:42`, UTC, no zone suffix).
pub fn parse_block_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Block timestamp from a global-properties payload.
pub fn block_time(props: &Value) -> Option<DateTime<Utc>> {
    props.get("time").and_then(Value::as_str).and_then(parse_block_time)
}

/// ISO-8601 without fractional seconds.
pub fn iso_timestr(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}
