//! Single JSON-RPC calls, their error classification and the retrying client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::ScannerConfig;
use crate::error::{RpcErrorKind, ScanError};
use crate::policy::{RetryConfig, RetryPolicy};
use crate::request::{HttpReply, JsonRpcError, JsonRpcRequest, RpcOutcome};
use crate::transport::RpcTransport;

/// HTTP 426 Upgrade Required: the node only accepts WebSocket clients.
pub const UPGRADE_REQUIRED: u16 = 426;

const INVALID_ARGUMENT_MARKERS: [&str; 3] = [
    "invalid parameters",
    "expected #s argument",
    "assert exception:args.size()",
];
const INVALID_TYPE_MARKERS: [&str; 2] = ["invalid cast from", "bad cast:"];

/// Map a node's error object onto the [`RpcErrorKind`] taxonomy.
pub fn classify_rpc_error(message: &str) -> RpcErrorKind {
    let msg = message.to_lowercase();
    if msg.contains("method not found") {
        RpcErrorKind::MethodNotSupported
    } else if INVALID_ARGUMENT_MARKERS.iter().any(|m| msg.contains(m)) {
        RpcErrorKind::InvalidArguments
    } else if INVALID_TYPE_MARKERS.iter().any(|m| msg.contains(m)) {
        RpcErrorKind::InvalidArgumentType
    } else {
        RpcErrorKind::Generic
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Turn a raw HTTP reply into the `result` payload or a typed error.
///
/// An `"error": null` member is treated as absent, so a reply carrying both
/// `"error": null` and a `result` succeeds.
pub fn interpret_reply(host: &str, method: &str, reply: HttpReply) -> Result<Value, ScanError> {
    if reply.status == UPGRADE_REQUIRED {
        return Err(ScanError::UnsupportedTransport {
            host: host.to_string(),
        });
    }
    if !reply.is_success() {
        return Err(ScanError::Transient {
            host: host.to_string(),
            reason: format!("HTTP {}: {}", reply.status, snippet(&reply.body)),
            http_status: Some(reply.status),
        });
    }

    let body: Value = serde_json::from_str(&reply.body).map_err(|e| ScanError::Transient {
        host: host.to_string(),
        reason: format!("response is not JSON ({e}): {}", snippet(&reply.body)),
        http_status: Some(reply.status),
    })?;

    let Value::Object(mut obj) = body else {
        return Err(no_result(host, method));
    };

    match obj.remove("error") {
        None | Some(Value::Null) => {}
        Some(err) => {
            let err = match err {
                Value::String(message) => JsonRpcError {
                    message,
                    ..Default::default()
                },
                other => serde_json::from_value::<JsonRpcError>(other.clone()).unwrap_or(
                    JsonRpcError {
                        message: other.to_string(),
                        ..Default::default()
                    },
                ),
            };
            return Err(ScanError::Rpc {
                kind: classify_rpc_error(&err.message),
                method: method.to_string(),
                host: host.to_string(),
                code: err.code,
                message: err.message,
            });
        }
    }

    obj.remove("result").ok_or_else(|| no_result(host, method))
}

fn no_result(host: &str, method: &str) -> ScanError {
    ScanError::Rpc {
        kind: RpcErrorKind::NoResult,
        method: method.to_string(),
        host: host.to_string(),
        code: None,
        message: "no result and no error could be extracted from the response".into(),
    }
}

/// JSON-RPC client shared by every stage of a scan.
///
/// Cheap to clone; the transport is reference counted.
#[derive(Clone)]
pub struct NodeClient {
    pub(crate) transport: Arc<dyn RpcTransport>,
    pub(crate) retry: RetryPolicy,
    pub(crate) timeout: Duration,
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NodeClient {
    pub fn new(transport: Arc<dyn RpcTransport>, config: &ScannerConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(RetryConfig::from(config)),
            timeout: config.rpc_timeout,
        }
    }

    /// The retry policy applied by [`call_with_retry`](Self::call_with_retry).
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) async fn bounded<T>(
        &self,
        host: &str,
        fut: impl std::future::Future<Output = Result<T, ScanError>>,
    ) -> Result<T, ScanError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ScanError::Transient {
                host: host.to_string(),
                reason: format!("request timed out after {}ms", self.timeout.as_millis()),
                http_status: None,
            })?
    }

    /// One attempt, no retry.
    pub async fn call(&self, host: &str, method: &str, params: Value) -> Result<RpcOutcome, ScanError> {
        let req = JsonRpcRequest::new(method, params);
        let start = Instant::now();
        let reply = self.bounded(host, self.transport.send(host, &req)).await?;
        let payload = interpret_reply(host, method, reply)?;
        Ok(RpcOutcome::new(payload, start.elapsed()))
    }

    /// [`call`](Self::call) wrapped in the bounded retry policy.
    ///
    /// Fails with [`ScanError::Unreachable`] once every attempt has failed, or
    /// immediately when the node turns out to be WebSocket-only.
    pub async fn call_with_retry(
        &self,
        host: &str,
        method: &str,
        params: Value,
    ) -> Result<RpcOutcome, ScanError> {
        self.retry
            .run(host, method, |_| self.call(host, method, params.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_error_messages() {
        assert_eq!(
            classify_rpc_error("Method not found"),
            RpcErrorKind::MethodNotSupported
        );
        assert_eq!(
            classify_rpc_error("Assert Exception:args.size() == 2: Expected 2 argument(s)"),
            RpcErrorKind::InvalidArguments
        );
        assert_eq!(
            classify_rpc_error("Invalid cast from string_type to Array"),
            RpcErrorKind::InvalidArgumentType
        );
        assert_eq!(
            classify_rpc_error("Bad Cast: invalid cast"),
            RpcErrorKind::InvalidArgumentType
        );
        assert_eq!(classify_rpc_error("Unable to acquire lock"), RpcErrorKind::Generic);
    }

    #[test]
    fn result_is_extracted() {
        let reply = HttpReply::new(200, r#"{"jsonrpc":"2.0","id":1,"result":{"head_block_number":5}}"#);
        let v = interpret_reply("h", "m", reply).unwrap();
        assert_eq!(v["head_block_number"], 5);
    }

    #[test]
    fn upgrade_required_is_unsupported_transport() {
        let err = interpret_reply("h", "m", HttpReply::new(426, "Upgrade Required")).unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedTransport { .. }));
    }

    #[test]
    fn server_error_status_is_transient() {
        let err = interpret_reply("h", "m", HttpReply::new(502, "Bad Gateway")).unwrap_err();
        assert!(matches!(
            err,
            ScanError::Transient {
                http_status: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn non_json_body_is_transient() {
        let err = interpret_reply("h", "m", HttpReply::new(200, "<html>")).unwrap_err();
        assert!(matches!(err, ScanError::Transient { .. }));
    }

    #[test]
    fn error_object_is_classified() {
        let reply = HttpReply::new(
            200,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        );
        match interpret_reply("h", "bridge.get_trending_topics", reply).unwrap_err() {
            ScanError::Rpc {
                kind, code, method, ..
            } => {
                assert_eq!(kind, RpcErrorKind::MethodNotSupported);
                assert_eq!(code, Some(-32601));
                assert_eq!(method, "bridge.get_trending_topics");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_result_is_no_result() {
        let err = interpret_reply("h", "m", HttpReply::new(200, r#"{"jsonrpc":"2.0","id":1}"#))
            .unwrap_err();
        assert_eq!(err.rpc_kind(), Some(RpcErrorKind::NoResult));
    }

    #[test]
    fn null_error_member_is_ignored() {
        let reply = HttpReply::new(200, r#"{"id":1,"error":null,"result":{"head_block_number":7}}"#);
        let v = interpret_reply("h", "m", reply).unwrap();
        assert_eq!(v["head_block_number"], 7);
    }

    #[test]
    fn null_result_is_still_a_result() {
        let v = interpret_reply("h", "m", HttpReply::new(200, r#"{"id":1,"result":null}"#)).unwrap();
        assert!(v.is_null());
    }
}
