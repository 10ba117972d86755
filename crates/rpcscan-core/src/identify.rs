//! Server dialect identification.
//!
//! A bare GET against the host root tells the dialects apart by the shape of
//! the (usually error) body they send back:
//!
//! - a `jussi_num` field → request-routing proxy in front of the node
//! - `End Of File:stringstream` error message → modern (appbase) node
//! - `could not call api` → legacy node

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ScanError;
use crate::request::RpcOutcome;
use crate::rpc::{NodeClient, UPGRADE_REQUIRED};

const MODERN_EOF_MARKER: &str = "End Of File:stringstream";
const LEGACY_MARKER: &str = "could not call api";

/// Which API dialect a node speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServerKind {
    Proxied,
    Modern,
    Legacy,
    #[default]
    Unknown,
}

impl ServerKind {
    /// Method used to fetch dynamic global properties, if the dialect is usable.
    pub fn props_method(self) -> Option<&'static str> {
        match self {
            Self::Proxied | Self::Modern => Some("condenser_api.get_dynamic_global_properties"),
            Self::Legacy => Some("get_dynamic_global_properties"),
            Self::Unknown => None,
        }
    }

    /// Method used to fetch the chain config, if the dialect is usable.
    pub fn config_method(self) -> Option<&'static str> {
        match self {
            Self::Proxied | Self::Modern => Some("condenser_api.get_config"),
            Self::Legacy => Some("get_config"),
            Self::Unknown => None,
        }
    }

    /// One-letter tag used in tables.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Proxied => "(P)",
            Self::Modern => "(M)",
            Self::Legacy => "(L)",
            Self::Unknown => "(?)",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxied => write!(f, "proxied"),
            Self::Modern => write!(f, "modern"),
            Self::Legacy => write!(f, "legacy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a probe response body.
pub fn classify_response(body: &str) -> ServerKind {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if let Some(json) = &parsed {
        if json.pointer("/error/message").and_then(Value::as_str) == Some(MODERN_EOF_MARKER) {
            return ServerKind::Modern;
        }
        if json.get("jussi_num").is_some() {
            return ServerKind::Proxied;
        }
    }
    let lower = body.to_lowercase();
    if lower.contains(&MODERN_EOF_MARKER.to_lowercase()) {
        ServerKind::Modern
    } else if lower.contains(LEGACY_MARKER) {
        ServerKind::Legacy
    } else {
        ServerKind::Unknown
    }
}

impl NodeClient {
    async fn identify_once(&self, host: &str) -> Result<RpcOutcome<ServerKind>, ScanError> {
        let start = Instant::now();
        let reply = self.bounded(host, self.transport.probe(host)).await?;
        if reply.status == UPGRADE_REQUIRED {
            return Err(ScanError::UnsupportedTransport {
                host: host.to_string(),
            });
        }
        let kind = classify_response(&reply.body);
        // Error statuses are fine as long as the body tells us the dialect.
        if kind == ServerKind::Unknown {
            if !reply.is_success() {
                return Err(ScanError::Transient {
                    host: host.to_string(),
                    reason: format!("HTTP {} with unrecognised body", reply.status),
                    http_status: Some(reply.status),
                });
            }
            // A garbled 2xx body is worth another attempt; valid JSON without a marker is not.
            if serde_json::from_str::<Value>(&reply.body).is_err() {
                return Err(ScanError::Transient {
                    host: host.to_string(),
                    reason: "probe response is not JSON and carries no dialect marker".into(),
                    http_status: Some(reply.status),
                });
            }
        }
        Ok(RpcOutcome::new(kind, start.elapsed()))
    }

    /// Probe `host` and work out which dialect it speaks.
    ///
    /// Uses the same bounded retry loop as JSON-RPC calls.
    pub async fn identify(&self, host: &str) -> Result<RpcOutcome<ServerKind>, ScanError> {
        tracing::info!(host, "identifying node");
        self.retry
            .run(host, "identify", |_| self.identify_once(host))
            .await
    }
}
