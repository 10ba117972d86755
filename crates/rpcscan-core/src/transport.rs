//! The `RpcTransport` trait, the seam between the scanner and the network.

use async_trait::async_trait;

use crate::error::ScanError;
use crate::request::{HttpReply, JsonRpcRequest};

/// Moves bytes to and from nodes.
///
/// Implementations only report network-level failures (connection refused,
/// timeout ...) as [`ScanError::Transient`]. Any HTTP status, including
/// errors, comes back as an [`HttpReply`] so the call layer can classify it.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// POST a JSON-RPC request to `host`.
    async fn send(&self, host: &str, req: &JsonRpcRequest) -> Result<HttpReply, ScanError>;

    /// Plain GET of the host root, used for server identification.
    async fn probe(&self, host: &str) -> Result<HttpReply, ScanError>;
}
