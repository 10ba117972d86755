//! JSON-RPC 2.0 wire types and the timed call outcome.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every request goes out with this id.
pub const REQUEST_ID: u64 = 1;

/// A JSON-RPC 2.0 request.
///
/// Field order is part of the wire format: `method, params, jsonrpc, id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub method: String,
    /// Positional (array) or named (object) parameters.
    pub params: Value,
    pub jsonrpc: String,
    pub id: u64,
}

impl JsonRpcRequest {
    /// Create a new request. `Value::Null` params are sent as `[]`.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Null => Value::Array(vec![]),
            other => other,
        };
        Self {
            method: method.into(),
            params,
            jsonrpc: "2.0".into(),
            id: REQUEST_ID,
        }
    }

    /// Encode the request body.
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Raw HTTP reply as seen by the call layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of one successful call: payload plus how long and how many tries it took.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcOutcome<T = Value> {
    pub payload: T,
    /// Duration of the attempt that succeeded.
    pub elapsed: Duration,
    /// Always >= 1.
    pub attempts: u32,
}

impl<T> RpcOutcome<T> {
    pub fn new(payload: T, elapsed: Duration) -> Self {
        Self {
            payload,
            elapsed,
            attempts: 1,
        }
    }

    /// Swap the payload, keeping timing and attempt count.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RpcOutcome<U> {
        RpcOutcome {
            payload: f(self.payload),
            elapsed: self.elapsed,
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_key_order() {
        let req = JsonRpcRequest::new("condenser_api.get_config", json!([]));
        assert_eq!(
            req.to_body().unwrap(),
            r#"{"method":"condenser_api.get_config","params":[],"jsonrpc":"2.0","id":1}"#
        );
    }

    #[test]
    fn null_params_become_empty_array() {
        let req = JsonRpcRequest::new("get_config", Value::Null);
        assert_eq!(req.params, json!([]));
    }

    #[test]
    fn named_params_kept() {
        let req = JsonRpcRequest::new(
            "account_history_api.get_account_history",
            json!({"account": "someguy123", "start": -1, "limit": 100}),
        );
        assert!(req.to_body().unwrap().contains(r#""params":{"account":"someguy123""#));
    }

    #[test]
    fn outcome_map_keeps_metadata() {
        let out = RpcOutcome {
            payload: 1u32,
            elapsed: Duration::from_millis(20),
            attempts: 2,
        };
        let mapped = out.map(|n| n + 1);
        assert_eq!(mapped.payload, 2);
        assert_eq!(mapped.attempts, 2);
    }
}
