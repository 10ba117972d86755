//! rpcscan-core: types and logic shared by every RPCScan crate.
//!
//! # Overview
//!
//! The core crate knows how to talk to a single Hive/Steem-family RPC node and
//! how to judge it, but not how to drive a whole scan:
//!
//! - [`RpcTransport`]: the async seam every HTTP backend implements
//! - [`NodeClient`]: single calls and the bounded retry loop on top of a transport
//! - [`ServerKind`]: dialect identification from a probe response
//! - [`NodeRecord`]: everything measured about one node
//! - [`ScorePolicy`] / [`NodeReport`] / [`SortKey`]: scoring and ranking

pub mod chain;
pub mod config;
pub mod error;
pub mod identify;
pub mod node;
pub mod policy;
pub mod report;
pub mod request;
pub mod rpc;
pub mod score;
pub mod sort;
pub mod transport;

pub use chain::Network;
pub use config::ScannerConfig;
pub use error::{DeadReason, RpcErrorKind, ScanError};
pub use identify::ServerKind;
pub use node::{NodeRecord, NodeStatus, Stage};
pub use report::NodeReport;
pub use request::{HttpReply, JsonRpcRequest, RpcOutcome};
pub use rpc::NodeClient;
pub use score::{ScoreLabel, ScorePolicy, ScoreResult};
pub use sort::{sort_reports, SortKey};
pub use transport::RpcTransport;
