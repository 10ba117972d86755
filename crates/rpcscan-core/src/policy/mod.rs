//! Call policies.
//!
//! ```text
//! Request → [RetryPolicy] → [Call layer] → [Transport]
//! ```

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
