//! Node health scoring.
//!
//! A node starts from a base score set by how many stages it passed, loses
//! two points per retry and four per broken API method, then loses a share of
//! the maximum score the further its head block lags behind the scan time.
//! Healthy-but-stale nodes are lifted back to a small floor so they do not
//! read as dead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ScannerConfig;
use crate::error::DeadReason;
use crate::node::{NodeRecord, TOTAL_STAGES_TRACKED};

/// Staleness thresholds (seconds behind) and the percentage of the max score lost.
const STALENESS_PENALTIES: [(i64, i64); 6] = [
    (86_400, 80),
    (3_600, 50),
    (600, 30),
    (300, 15),
    (60, 10),
    (30, 5),
];

/// Floor rescue: (pre-penalty score above this %, rescued to this %).
const STALENESS_RESCUE: [(i64, i64); 3] = [(80, 20), (50, 10), (20, 5)];

/// Rescue only applies when the penalised score fell below this %.
const RESCUE_BELOW_PCT: i64 = 10;

const RETRY_PENALTY: i64 = 2;
const METHOD_PENALTY: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreLabel {
    Dead,
    Bad,
    Good,
    Perfect,
}

impl fmt::Display for ScoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dead => write!(f, "DEAD"),
            Self::Bad => write!(f, "BAD"),
            Self::Good => write!(f, "GOOD"),
            Self::Perfect => write!(f, "PERFECT"),
        }
    }
}

/// Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    pub score: u32,
    pub label: ScoreLabel,
    pub exit_code: i32,
}

/// Scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorePolicy {
    pub max_score: u32,
    pub good_return_code: i32,
    pub bad_return_code: i32,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

impl From<&ScannerConfig> for ScorePolicy {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            max_score: cfg.max_score,
            good_return_code: cfg.good_return_code,
            bad_return_code: cfg.bad_return_code,
        }
    }
}

impl ScorePolicy {
    fn pct(&self, pct: i64) -> i64 {
        i64::from(self.max_score) * pct / 100
    }

    /// Base score for the number of passed stages.
    fn base(&self, stages: usize) -> i64 {
        let max = i64::from(self.max_score);
        match stages {
            0 => 0,
            1 => max - 10,
            n if n < TOTAL_STAGES_TRACKED => max - 5,
            _ => max,
        }
    }

    /// Points lost for lagging `secs_behind` seconds behind the scan time.
    pub fn staleness_penalty(&self, secs_behind: i64) -> i64 {
        STALENESS_PENALTIES
            .iter()
            .find(|(threshold, _)| secs_behind > *threshold)
            .map(|(_, pct)| self.pct(*pct))
            .unwrap_or(0)
    }

    /// Score `node`. Pure and deterministic.
    pub fn score(&self, node: &NodeRecord, min_score: u32) -> ScoreResult {
        if node.stages_passed() == 0 || node.dead_reason == Some(DeadReason::WsOnly) {
            return ScoreResult {
                score: 0,
                label: ScoreLabel::Dead,
                exit_code: self.bad_return_code,
            };
        }

        let mut score = self.base(node.stages_passed());
        score -= RETRY_PENALTY * i64::from(node.total_retries());

        if node.method_tests_enabled {
            let (passed, tested) = node.method_counts();
            if passed < tested {
                score -= METHOD_PENALTY * (tested - passed) as i64;
            }
        }

        if let Some(behind) = node.time_behind() {
            let pre_penalty = score;
            score -= self.staleness_penalty(behind.num_seconds());
            if score < self.pct(RESCUE_BELOW_PCT) {
                if let Some((_, floor)) = STALENESS_RESCUE
                    .iter()
                    .find(|(above, _)| pre_penalty > self.pct(*above))
                {
                    score = score.max(self.pct(*floor));
                }
            }
        }

        let score = score.clamp(0, i64::from(self.max_score)) as u32;
        let (label, exit_code) = if score < min_score {
            (ScoreLabel::Bad, self.bad_return_code)
        } else if score >= self.max_score {
            (ScoreLabel::Perfect, self.good_return_code)
        } else {
            (ScoreLabel::Good, self.good_return_code)
        };
        ScoreResult {
            score,
            label,
            exit_code,
        }
    }
}
