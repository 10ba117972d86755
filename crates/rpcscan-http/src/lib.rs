//! rpcscan-http: `reqwest`-backed [`RpcTransport`](rpcscan_core::RpcTransport).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rpcscan_core::{NodeClient, ScannerConfig};
//! use rpcscan_http::HttpTransport;
//!
//! # async fn run() -> Result<(), rpcscan_core::ScanError> {
//! let config = ScannerConfig::default();
//! let transport = HttpTransport::with_timeout(config.rpc_timeout)?;
//! let client = NodeClient::new(Arc::new(transport), &config);
//! let kind = client.identify("https://api.hive.blog").await?;
//! println!("{}", kind.payload);
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};
