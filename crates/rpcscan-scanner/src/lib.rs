//! rpcscan-scanner: drives scans across many nodes.
//!
//! [`Scanner`] runs the staged pipeline (identify, filter, version, block info
//! and optionally method tests) over a node list and hands back one
//! [`NodeRecord`](rpcscan_core::NodeRecord) per node. [`MethodTestSuite`] can
//! also be used on its own to check individual API methods.
//!
//! # Quick start
//! ```rust,no_run
//! use std::sync::Arc;
//! use rpcscan_core::{NodeReport, ScannerConfig, ScorePolicy};
//! use rpcscan_http::HttpTransport;
//! use rpcscan_scanner::Scanner;
//!
//! # async fn run() -> Result<(), rpcscan_core::ScanError> {
//! let config = ScannerConfig::default();
//! let transport = Arc::new(HttpTransport::with_timeout(config.rpc_timeout)?);
//! let scanner = Scanner::new(transport, config);
//! let records = scanner.scan(&["https://api.hive.blog".to_string()]).await;
//! let policy = ScorePolicy::default();
//! for rec in &records {
//!     let report = NodeReport::scored(rec, &policy, 40);
//!     println!("{} {}", report.host, report.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod methods;
pub mod scanner;

pub use methods::{MethodTest, MethodTestResult, MethodTestSuite, TestContext};
pub use scanner::Scanner;
