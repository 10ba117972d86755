//! Scan-level error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which flavour of JSON-RPC error a node returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcErrorKind {
    /// The node answered with an error we could not classify further.
    Generic,
    /// The node does not expose the requested method.
    MethodNotSupported,
    /// Too many / too few arguments.
    InvalidArguments,
    /// Arguments had the wrong shape (array vs object, int vs string ...).
    InvalidArgumentType,
    /// The body carried neither `error` nor `result`.
    NoResult,
}

impl fmt::Display for RpcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "rpc error"),
            Self::MethodNotSupported => write!(f, "method not supported"),
            Self::InvalidArguments => write!(f, "invalid arguments"),
            Self::InvalidArgumentType => write!(f, "invalid argument type"),
            Self::NoResult => write!(f, "no result"),
        }
    }
}

/// Why a node was declared unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadReason {
    /// The node only speaks WebSocket (HTTP 426 Upgrade Required).
    WsOnly,
    /// Every attempt failed.
    RetriesExhausted,
}

impl fmt::Display for DeadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WsOnly => write!(f, "WS Only"),
            Self::RetriesExhausted => write!(f, "Unreachable"),
        }
    }
}

/// Errors produced while talking to a node.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// Network failure, timeout or non-2xx status. Retryable.
    #[error("transient error from {host}: {reason}")]
    Transient {
        host: String,
        reason: String,
        http_status: Option<u16>,
    },

    /// The node wants a transport we do not speak. Never retried.
    #[error("{host} requires a different transport (HTTP 426)")]
    UnsupportedTransport { host: String },

    /// JSON-RPC level error object returned by the node.
    #[error("{kind} while querying '{method}' (host: {host}){}", fmt_server_error(.code, .message))]
    Rpc {
        kind: RpcErrorKind,
        method: String,
        host: String,
        code: Option<i64>,
        message: String,
    },

    /// The call succeeded but the payload is semantically wrong.
    #[error("validation of '{method}' failed for {host}: {reason}")]
    Validation {
        method: String,
        host: String,
        reason: String,
    },

    /// Terminal: the retry wrapper gave up on this node.
    #[error("{host} did not respond properly after {attempts} tries ({reason})")]
    Unreachable {
        host: String,
        attempts: u32,
        reason: DeadReason,
        last_error: Option<Box<ScanError>>,
    },

    /// Anything else (bad payload shape at a pipeline stage, task panics ...).
    #[error("{0}")]
    Unexpected(String),
}

fn fmt_server_error(code: &Option<i64>, message: &str) -> String {
    let mut out = String::new();
    if let Some(code) = code {
        out.push_str(&format!(" Server error code: {code}"));
    }
    if !message.is_empty() {
        out.push_str(&format!(" Server error message: {message}"));
    }
    out
}

impl ScanError {
    /// Returns `true` if the retry wrapper should try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Rpc { .. })
    }

    /// Returns `true` if this error drops the node from the rest of the scan.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Returns `true` if the node was found to be WebSocket-only.
    pub fn is_ws_only(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedTransport { .. }
                | Self::Unreachable {
                    reason: DeadReason::WsOnly,
                    ..
                }
        )
    }

    /// The RPC error kind, looking through an `Unreachable` wrapper.
    pub fn rpc_kind(&self) -> Option<RpcErrorKind> {
        match self {
            Self::Rpc { kind, .. } => Some(*kind),
            Self::Unreachable {
                last_error: Some(inner),
                ..
            } => inner.rpc_kind(),
            _ => None,
        }
    }

    /// Build the terminal error for a WebSocket-only node.
    pub fn ws_only(host: impl Into<String>) -> Self {
        Self::Unreachable {
            host: host.into(),
            attempts: 1,
            reason: DeadReason::WsOnly,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        let transient = ScanError::Transient {
            host: "https://a".into(),
            reason: "timeout".into(),
            http_status: None,
        };
        let rpc = ScanError::Rpc {
            kind: RpcErrorKind::MethodNotSupported,
            method: "x".into(),
            host: "https://a".into(),
            code: Some(-32601),
            message: "method not found".into(),
        };
        assert!(transient.is_retryable());
        assert!(rpc.is_retryable());
        assert!(!ScanError::UnsupportedTransport { host: "h".into() }.is_retryable());
        assert!(!ScanError::Unexpected("boom".into()).is_retryable());
    }

    #[test]
    fn ws_only_is_terminal() {
        let err = ScanError::ws_only("https://ws.example");
        assert!(err.is_terminal());
        assert!(err.is_ws_only());
        assert!(err.to_string().contains("WS Only"));
    }

    #[test]
    fn rpc_display_includes_server_details() {
        let err = ScanError::Rpc {
            kind: RpcErrorKind::Generic,
            method: "condenser_api.get_config".into(),
            host: "https://a".into(),
            code: Some(-32000),
            message: "Assert Exception".into(),
        };
        let s = err.to_string();
        assert!(s.contains("condenser_api.get_config"));
        assert!(s.contains("-32000"));
        assert!(s.contains("Assert Exception"));
    }

    #[test]
    fn rpc_kind_looks_through_unreachable() {
        let err = ScanError::Unreachable {
            host: "h".into(),
            attempts: 3,
            reason: DeadReason::RetriesExhausted,
            last_error: Some(Box::new(ScanError::Rpc {
                kind: RpcErrorKind::InvalidArguments,
                method: "m".into(),
                host: "h".into(),
                code: None,
                message: String::new(),
            })),
        };
        assert_eq!(err.rpc_kind(), Some(RpcErrorKind::InvalidArguments));
    }
}
