//! Flattened, render-ready view of a scanned node.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::chain::{iso_timestr, Network, UNKNOWN};
use crate::error::DeadReason;
use crate::identify::ServerKind;
use crate::node::{NodeRecord, NodeStatus, TOTAL_STAGES_TRACKED};
use crate::score::{ScoreLabel, ScorePolicy, ScoreResult};

fn ser_iso<S: Serializer>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
    match dt {
        Some(dt) => s.serialize_str(&iso_timestr(dt)),
        None => s.serialize_none(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One row of the health table, or the body of a single-node report.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub host: String,
    pub ssl: bool,
    pub kind: ServerKind,
    pub status: NodeStatus,
    pub stages_passed: usize,
    pub score: u32,
    pub label: ScoreLabel,
    pub exit_code: i32,
    pub head_block: Option<u64>,
    #[serde(serialize_with = "ser_iso")]
    pub block_time: Option<DateTime<Utc>>,
    /// Seconds between the block timestamp and the scan.
    pub time_behind: Option<i64>,
    pub version: Option<String>,
    pub network: Option<Network>,
    /// Seconds, two decimal places.
    pub avg_response_time: Option<f64>,
    pub avg_tries: Option<f64>,
    pub total_retries: u32,
    pub method_tests_enabled: bool,
    pub methods_passed: usize,
    pub methods_tested: usize,
    pub passed_methods: Vec<String>,
    pub broken_methods: BTreeMap<String, String>,
    pub dead_reason: Option<DeadReason>,
}

impl NodeReport {
    pub fn new(record: &NodeRecord, result: ScoreResult) -> Self {
        let (methods_passed, methods_tested) = record.method_counts();
        Self {
            host: record.host.clone(),
            ssl: record.is_ssl(),
            kind: record.kind,
            status: record.status(),
            stages_passed: record.stages_passed(),
            score: result.score,
            label: result.label,
            exit_code: result.exit_code,
            head_block: record.head_block,
            block_time: record.block_time,
            time_behind: record.time_behind().map(|d| d.num_seconds()),
            version: record.version.clone(),
            network: record.network,
            avg_response_time: record.avg_response_time().map(round2),
            avg_tries: record.avg_tries().map(round2),
            total_retries: record.total_retries(),
            method_tests_enabled: record.method_tests_enabled,
            methods_passed,
            methods_tested,
            passed_methods: record.passed_methods.iter().cloned().collect(),
            broken_methods: record.failed_methods.clone(),
            dead_reason: record.dead_reason,
        }
    }

    /// Score `record` with `policy` and flatten it.
    pub fn scored(record: &NodeRecord, policy: &ScorePolicy, min_score: u32) -> Self {
        Self::new(record, policy.score(record, min_score))
    }

    pub fn block_time_str(&self) -> String {
        self.block_time
            .as_ref()
            .map(iso_timestr)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// `H:MM:SS`, prefixed with whole days when over a day.
    pub fn time_behind_str(&self) -> String {
        let Some(secs) = self.time_behind else {
            return "N/A".to_string();
        };
        let sign = if secs < 0 { "-" } else { "" };
        let secs = secs.unsigned_abs();
        let (days, rem) = (secs / 86_400, secs % 86_400);
        let hms = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
        match days {
            0 => format!("{sign}{hms}"),
            1 => format!("{sign}1 day, {hms}"),
            d => format!("{sign}{d} days, {hms}"),
        }
    }

    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn network_str(&self) -> String {
        self.network
            .map(|n| n.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Passed stages out of the tracked total, e.g. `2/3`.
    pub fn stages_str(&self) -> String {
        format!("{}/{}", self.stages_passed, TOTAL_STAGES_TRACKED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Stage;
    use crate::request::RpcOutcome;
    use chrono::TimeZone;
    use std::time::Duration;

    fn record() -> NodeRecord {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut rec = NodeRecord::new("https://api.example.com", now);
        rec.kind = ServerKind::Modern;
        for stage in [Stage::Identify, Stage::Version, Stage::BlockInfo] {
            rec.pass_stage(stage, &RpcOutcome::new((), Duration::from_millis(123)));
        }
        rec.head_block = Some(100);
        rec.block_time = Some(now - chrono::Duration::seconds(93_784));
        rec.version = Some("1.27.4".into());
        rec.network = Some(Network::Hive);
        rec
    }

    #[test]
    fn flattens_record_and_score() {
        let rep = NodeReport::scored(&record(), &ScorePolicy::default(), 40);
        assert!(rep.ssl);
        assert_eq!(rep.status, NodeStatus::OutOfSync);
        assert_eq!(rep.avg_response_time, Some(0.12));
        assert_eq!(rep.avg_tries, Some(1.0));
        assert_eq!(rep.stages_str(), "3/3");
        assert_eq!(rep.time_behind_str(), "1 day, 2:03:04");
        assert_eq!(rep.block_time_str(), "2023-12-30T21:56:56");
    }

    #[test]
    fn json_uses_iso_block_time() {
        let rep = NodeReport::scored(&record(), &ScorePolicy::default(), 40);
        let v = serde_json::to_value(&rep).unwrap();
        assert_eq!(v["block_time"], "2023-12-30T21:56:56");
        assert_eq!(v["network"], "Hive");
        assert_eq!(v["label"], "Bad");
    }

    #[test]
    fn missing_values_render_as_unknown() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rep = NodeReport::scored(&NodeRecord::new("http://x", now), &ScorePolicy::default(), 40);
        assert_eq!(rep.version_str(), "Unknown");
        assert_eq!(rep.network_str(), "Unknown");
        assert_eq!(rep.time_behind_str(), "N/A");
        assert_eq!(rep.label, ScoreLabel::Dead);
    }
}
