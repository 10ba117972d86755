//! Per-node scan record.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::Network;
use crate::error::DeadReason;
use crate::identify::ServerKind;
use crate::request::RpcOutcome;

/// Number of data-gathering stages that count towards a node's status.
pub const TOTAL_STAGES_TRACKED: usize = 3;

/// A node whose head block is older than this is out of sync.
pub const OUT_OF_SYNC_AFTER_SECS: i64 = 60;

/// Pipeline stages that produce data and therefore count as "passed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Identify,
    Version,
    BlockInfo,
}

impl Stage {
    /// Key under which this stage's timing and attempts are recorded.
    pub fn key(self) -> &'static str {
        match self {
            Self::Identify => "ident",
            Self::Version => "config",
            Self::BlockInfo => "props",
        }
    }
}

/// Coarse status derived from how far a node got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Dead,
    Unstable,
    OutOfSync,
    Online,
}

impl NodeStatus {
    /// Higher is healthier; used when sorting by status.
    pub fn rank(self) -> u8 {
        match self {
            Self::Dead => 0,
            Self::Unstable => 1,
            Self::OutOfSync => 2,
            Self::Online => 3,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dead => write!(f, "DEAD"),
            Self::Unstable => write!(f, "UNSTABLE"),
            Self::OutOfSync => write!(f, "Out-of-sync"),
            Self::Online => write!(f, "Online"),
        }
    }
}

/// Everything measured about one node during a scan.
///
/// Owned and written only by the scanner while a scan runs; read-only after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub host: String,
    pub kind: ServerKind,
    pub stages: BTreeSet<Stage>,
    /// Response time per stage / tested method.
    pub timings: BTreeMap<String, Duration>,
    /// Attempts per stage / tested method; every entry is >= 1.
    pub attempts: BTreeMap<String, u32>,
    pub head_block: Option<u64>,
    pub block_time: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub network: Option<Network>,
    pub passed_methods: BTreeSet<String>,
    /// Failed method → error description.
    pub failed_methods: BTreeMap<String, String>,
    /// Whether the method test suite ran for this scan.
    pub method_tests_enabled: bool,
    pub dead_reason: Option<DeadReason>,
    /// When the block-info stage started (or the scan, if it never got there).
    pub scanned_at: DateTime<Utc>,
}

impl NodeRecord {
    pub fn new(host: impl Into<String>, scanned_at: DateTime<Utc>) -> Self {
        Self {
            host: host.into(),
            kind: ServerKind::Unknown,
            stages: BTreeSet::new(),
            timings: BTreeMap::new(),
            attempts: BTreeMap::new(),
            head_block: None,
            block_time: None,
            version: None,
            network: None,
            passed_methods: BTreeSet::new(),
            failed_methods: BTreeMap::new(),
            method_tests_enabled: false,
            dead_reason: None,
            scanned_at,
        }
    }

    /// Store timing and attempt count of a successful call under `key`.
    pub fn record_call<T>(&mut self, key: &str, outcome: &RpcOutcome<T>) {
        self.timings.insert(key.to_string(), outcome.elapsed);
        self.attempts.insert(key.to_string(), outcome.attempts.max(1));
    }

    /// Mark `stage` as passed, recording its call metrics.
    pub fn pass_stage<T>(&mut self, stage: Stage, outcome: &RpcOutcome<T>) {
        self.record_call(stage.key(), outcome);
        self.stages.insert(stage);
    }

    pub fn stages_passed(&self) -> usize {
        self.stages.len()
    }

    /// Time between the block timestamp and the scan.
    pub fn time_behind(&self) -> Option<chrono::Duration> {
        self.block_time.map(|bt| self.scanned_at - bt)
    }

    pub fn status(&self) -> NodeStatus {
        match self.stages_passed() {
            0 => NodeStatus::Dead,
            n if n < TOTAL_STAGES_TRACKED => NodeStatus::Unstable,
            _ => match self.time_behind() {
                Some(behind) if behind.num_seconds() > OUT_OF_SYNC_AFTER_SECS => {
                    NodeStatus::OutOfSync
                }
                _ => NodeStatus::Online,
            },
        }
    }

    /// Attempts beyond the first, summed over every recorded call.
    pub fn total_retries(&self) -> u32 {
        self.attempts.values().map(|a| a.saturating_sub(1)).sum()
    }

    /// Mean response time in seconds.
    pub fn avg_response_time(&self) -> Option<f64> {
        if self.timings.is_empty() {
            return None;
        }
        let total: f64 = self.timings.values().map(Duration::as_secs_f64).sum();
        Some(total / self.timings.len() as f64)
    }

    /// Mean attempts per recorded call (1.0 means no retries).
    pub fn avg_tries(&self) -> Option<f64> {
        if self.attempts.is_empty() {
            return None;
        }
        let total: u32 = self.attempts.values().sum();
        Some(f64::from(total) / self.attempts.len() as f64)
    }

    /// (passed, tested) method counts.
    pub fn method_counts(&self) -> (usize, usize) {
        let passed = self.passed_methods.len();
        (passed, passed + self.failed_methods.len())
    }

    pub fn is_ssl(&self) -> bool {
        self.host.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn outcome(attempts: u32, ms: u64) -> RpcOutcome<()> {
        RpcOutcome {
            payload: (),
            elapsed: Duration::from_millis(ms),
            attempts,
        }
    }

    #[test]
    fn fresh_record_is_dead() {
        let rec = NodeRecord::new("https://a", now());
        assert_eq!(rec.status(), NodeStatus::Dead);
        assert!(rec.avg_response_time().is_none());
        assert!(rec.avg_tries().is_none());
    }

    #[test]
    fn partial_stages_are_unstable() {
        let mut rec = NodeRecord::new("https://a", now());
        rec.pass_stage(Stage::Identify, &outcome(1, 100));
        assert_eq!(rec.status(), NodeStatus::Unstable);
        rec.pass_stage(Stage::Version, &outcome(1, 100));
        assert_eq!(rec.status(), NodeStatus::Unstable);
    }

    #[test]
    fn full_stages_online_or_out_of_sync() {
        let mut rec = NodeRecord::new("https://a", now());
        for stage in [Stage::Identify, Stage::Version, Stage::BlockInfo] {
            rec.pass_stage(stage, &outcome(1, 100));
        }
        rec.block_time = Some(now() - chrono::Duration::seconds(3));
        assert_eq!(rec.status(), NodeStatus::Online);
        rec.block_time = Some(now() - chrono::Duration::minutes(5));
        assert_eq!(rec.status(), NodeStatus::OutOfSync);
    }

    #[test]
    fn retries_count_extra_attempts_only() {
        let mut rec = NodeRecord::new("https://a", now());
        rec.pass_stage(Stage::Identify, &outcome(1, 100));
        rec.pass_stage(Stage::Version, &outcome(3, 200));
        rec.record_call("condenser_api.get_accounts", &outcome(2, 300));
        assert_eq!(rec.total_retries(), 3);
        assert_eq!(rec.avg_tries(), Some(2.0));
        let avg = rec.avg_response_time().unwrap();
        assert!((avg - 0.2).abs() < 1e-9);
    }

    #[test]
    fn stage_passing_is_idempotent() {
        let mut rec = NodeRecord::new("https://a", now());
        rec.pass_stage(Stage::Identify, &outcome(1, 100));
        rec.pass_stage(Stage::Identify, &outcome(2, 100));
        assert_eq!(rec.stages_passed(), 1);
        assert_eq!(rec.attempts["ident"], 2);
    }

    #[test]
    fn method_counts() {
        let mut rec = NodeRecord::new("http://a", now());
        rec.passed_methods.insert("a".into());
        rec.failed_methods.insert("b".into(), "boom".into());
        assert_eq!(rec.method_counts(), (1, 2));
        assert!(!rec.is_ssl());
    }
}
