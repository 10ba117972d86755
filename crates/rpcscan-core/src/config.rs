//! Scanner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest score a node can reach.
pub const DEFAULT_MAX_SCORE: u32 = 50;

/// Immutable scanner settings, built once at startup and shared by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Hard per-request timeout.
    pub rpc_timeout: Duration,
    /// Attempts per call before a node is declared unreachable.
    pub max_tries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Account used by the method tests.
    pub test_account: String,
    /// Permlink (by `test_account`) used by the content test.
    pub test_post: String,
    /// Expected public key prefix in witness signing keys.
    pub pub_prefix: String,
    /// Run the method test suite after the basic stages.
    pub plugins: bool,
    /// Methods to test. Empty means the whole built-in catalogue.
    pub test_plugins: Vec<String>,
    /// Appended to the tested methods; usually non-catalogue methods to probe.
    pub extra_plugins: Vec<String>,
    /// Never test these.
    pub skip_plugins: Vec<String>,
    /// Params sent when probing a method that has no built-in test.
    pub probe_params: Value,
    pub max_score: u32,
    pub good_return_code: i32,
    pub bad_return_code: i32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(3),
            max_tries: 3,
            retry_delay: Duration::from_secs(2),
            test_account: "someguy123".into(),
            test_post: "announcement-soft-fork-0-22-2-released-steem-in-a-box-update".into(),
            pub_prefix: "STM".into(),
            plugins: false,
            test_plugins: Vec::new(),
            extra_plugins: Vec::new(),
            skip_plugins: Vec::new(),
            probe_params: Value::Array(vec![]),
            max_score: DEFAULT_MAX_SCORE,
            good_return_code: 0,
            bad_return_code: 8,
        }
    }
}

impl ScannerConfig {
    /// Normalised test account name (lower-case, trimmed).
    pub fn account(&self) -> String {
        self.test_account.trim().to_lowercase()
    }

    /// The methods a scan should test, given the built-in catalogue.
    ///
    /// `test_plugins` (or the catalogue when empty) followed by `extra_plugins`,
    /// minus `skip_plugins`, without duplicates.
    pub fn plugin_list<'a>(&self, catalogue: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let base: Vec<String> = if self.test_plugins.is_empty() {
            catalogue.into_iter().map(str::to_string).collect()
        } else {
            self.test_plugins.clone()
        };
        let mut out: Vec<String> = Vec::new();
        for method in base.into_iter().chain(self.extra_plugins.iter().cloned()) {
            if self.skip_plugins.contains(&method) || out.contains(&method) {
                continue;
            }
            out.push(method);
        }
        out
    }

    /// Default minimum score for a node to be considered good.
    pub fn default_min_score(&self) -> u32 {
        self.max_score.saturating_sub(10)
    }
}
