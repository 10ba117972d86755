//! HTTP transport backed by `reqwest`.
//!
//! Only moves bytes: retries, timeouts per attempt and error classification
//! live in `rpcscan-core`. Every HTTP status comes back as an [`HttpReply`],
//! only network-level failures become errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};

use rpcscan_core::error::ScanError;
use rpcscan_core::request::{HttpReply, JsonRpcRequest};
use rpcscan_core::transport::RpcTransport;

/// Nodes behind some proxies reject `application/json`, so bodies go out form-encoded.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Whole-request timeout enforced by reqwest.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            user_agent: concat!("rpcscan/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Shared HTTP transport. One instance serves every node of a scan.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, ScanError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ScanError::Unexpected(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ScanError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Transport with the given request timeout and default headers.
    pub fn with_timeout(request_timeout: Duration) -> Result<Self, ScanError> {
        Self::new(HttpTransportConfig {
            request_timeout,
            ..Default::default()
        })
    }

    async fn read_reply(host: &str, resp: reqwest::Response) -> Result<HttpReply, ScanError> {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| network_error(host, e))?;
        tracing::trace!(host, status, bytes = body.len(), "received reply");
        Ok(HttpReply::new(status, body))
    }
}

fn network_error(host: &str, err: reqwest::Error) -> ScanError {
    let reason = if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    ScanError::Transient {
        host: host.to_string(),
        reason,
        http_status: err.status().map(|s| s.as_u16()),
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, host: &str, req: &JsonRpcRequest) -> Result<HttpReply, ScanError> {
        let body = req
            .to_body()
            .map_err(|e| ScanError::Unexpected(format!("failed to encode request: {e}")))?;
        tracing::debug!(host, method = %req.method, "sending request");
        let resp = self
            .http
            .post(host)
            .body(body)
            .send()
            .await
            .map_err(|e| network_error(host, e))?;
        Self::read_reply(host, resp).await
    }

    async fn probe(&self, host: &str) -> Result<HttpReply, ScanError> {
        tracing::debug!(host, "probing node");
        let resp = self
            .http
            .get(host)
            .send()
            .await
            .map_err(|e| network_error(host, e))?;
        Self::read_reply(host, resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        assert!(HttpTransport::new(HttpTransportConfig::default()).is_ok());
    }

    #[test]
    fn rejects_bad_user_agent() {
        let cfg = HttpTransportConfig {
            user_agent: "bad\nagent".into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpTransport::new(cfg),
            Err(ScanError::Unexpected(_))
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let transport = HttpTransport::with_timeout(Duration::from_secs(2)).unwrap();
        let err = transport.probe("http://127.0.0.1:1").await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
}
