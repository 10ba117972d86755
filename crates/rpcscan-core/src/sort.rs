//! Sortable columns of the health table.
//!
//! Every column compares ascending with missing values (dead nodes, nodes that
//! never reported the field) last. Columns where a higher value means a
//! healthier node are flipped by default, and for those missing values sort
//! first before the flip so they still end up at the bottom.

use std::cmp::Ordering;
use std::fmt;

use crate::chain::Network;
use crate::node::NodeStatus;
use crate::report::NodeReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Server,
    Status,
    OnlineStatus,
    DeadStatus,
    OutOfSyncStatus,
    HeadBlock,
    BlockTime,
    Version,
    Network,
    HiveNetwork,
    SteemNetwork,
    GolosNetwork,
    WhalesharesNetwork,
    ResTime,
    AvgRetries,
    ApiTests,
    Score,
}

impl SortKey {
    pub const ALL: [SortKey; 17] = [
        Self::Server,
        Self::Status,
        Self::OnlineStatus,
        Self::DeadStatus,
        Self::OutOfSyncStatus,
        Self::HeadBlock,
        Self::BlockTime,
        Self::Version,
        Self::Network,
        Self::HiveNetwork,
        Self::SteemNetwork,
        Self::GolosNetwork,
        Self::WhalesharesNetwork,
        Self::ResTime,
        Self::AvgRetries,
        Self::ApiTests,
        Self::Score,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Status => "status",
            Self::OnlineStatus => "online_status",
            Self::DeadStatus => "dead_status",
            Self::OutOfSyncStatus => "outofsync_status",
            Self::HeadBlock => "head_block",
            Self::BlockTime => "block_time",
            Self::Version => "version",
            Self::Network => "network",
            Self::HiveNetwork => "hive_network",
            Self::SteemNetwork => "steem_network",
            Self::GolosNetwork => "golos_network",
            Self::WhalesharesNetwork => "whaleshares_network",
            Self::ResTime => "res_time",
            Self::AvgRetries => "avg_retries",
            Self::ApiTests => "api_tests",
            Self::Score => "score",
        }
    }

    /// Canonical name or alias → key. Case-insensitive; `-` and `_` are interchangeable.
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase().replace('-', "_");
        if let Some(key) = Self::ALL.iter().find(|k| k.name() == name) {
            return Some(*key);
        }
        let key = match name.as_str() {
            "default" => Self::Status,
            "host" | "url" | "node" => Self::Server,
            "online" => Self::OnlineStatus,
            "dead" => Self::DeadStatus,
            "outofsync" | "out_of_sync" | "stale" => Self::OutOfSyncStatus,
            "block" | "head" | "height" | "current_block" => Self::HeadBlock,
            "time" | "date" => Self::BlockTime,
            "ver" => Self::Version,
            "net" | "chain" => Self::Network,
            "hive" => Self::HiveNetwork,
            "steem" => Self::SteemNetwork,
            "golos" => Self::GolosNetwork,
            "whaleshares" | "wls" => Self::WhalesharesNetwork,
            "res" | "latency" | "speed" | "response_time" => Self::ResTime,
            "retries" | "tries" => Self::AvgRetries,
            "plugins" | "tests" | "apis" | "methods" => Self::ApiTests,
            _ => return None,
        };
        Some(key)
    }

    /// Like [`lookup`](Self::lookup), falling back to `status` for unknown names.
    pub fn resolve(name: &str) -> Self {
        Self::lookup(name).unwrap_or_else(|| {
            tracing::warn!(key = name, "unknown sort key, sorting by status");
            Self::Status
        })
    }

    /// Whether the column sorts descending unless the user asks otherwise.
    pub fn default_reversed(self) -> bool {
        !matches!(self, Self::Server | Self::Network | Self::ResTime | Self::AvgRetries)
    }

    fn preferred_network(self) -> Option<Network> {
        match self {
            Self::HiveNetwork => Some(Network::Hive),
            Self::SteemNetwork => Some(Network::Steem),
            Self::GolosNetwork => Some(Network::Golos),
            Self::WhalesharesNetwork => Some(Network::Whaleshares),
            _ => None,
        }
    }

    /// Ascending comparison of two rows on this column.
    pub fn compare(self, a: &NodeReport, b: &NodeReport) -> Ordering {
        let missing_first = self.default_reversed();
        match self {
            Self::Server => a.host.cmp(&b.host),
            Self::Status => a.status.rank().cmp(&b.status.rank()),
            Self::OnlineStatus => status_is(a, NodeStatus::Online).cmp(&status_is(b, NodeStatus::Online)),
            Self::DeadStatus => status_is(a, NodeStatus::Dead).cmp(&status_is(b, NodeStatus::Dead)),
            Self::OutOfSyncStatus => {
                status_is(a, NodeStatus::OutOfSync).cmp(&status_is(b, NodeStatus::OutOfSync))
            }
            Self::HeadBlock => cmp_missing(a.head_block, b.head_block, missing_first),
            Self::BlockTime => cmp_missing(a.block_time, b.block_time, missing_first),
            Self::Version => cmp_missing(
                a.version.as_deref().and_then(version_parts),
                b.version.as_deref().and_then(version_parts),
                missing_first,
            ),
            Self::Network => cmp_missing(network_name(a), network_name(b), missing_first),
            Self::HiveNetwork | Self::SteemNetwork | Self::GolosNetwork | Self::WhalesharesNetwork => {
                let want = self.preferred_network();
                (a.network == want).cmp(&(b.network == want))
            }
            Self::ResTime => cmp_missing(a.avg_response_time, b.avg_response_time, missing_first),
            Self::AvgRetries => cmp_missing(a.avg_tries, b.avg_tries, missing_first),
            Self::ApiTests => cmp_missing(api_tests(a), api_tests(b), missing_first),
            Self::Score => a.score.cmp(&b.score),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn status_is(r: &NodeReport, status: NodeStatus) -> bool {
    r.status == status
}

fn network_name(r: &NodeReport) -> Option<String> {
    r.network
        .filter(|n| *n != Network::Unknown)
        .map(|n| n.to_string())
}

fn api_tests(r: &NodeReport) -> Option<usize> {
    (r.method_tests_enabled && r.stages_passed > 0).then_some(r.methods_passed)
}

/// `"1.27.4"` → `[1, 27, 4]`; anything non-numeric is treated as missing.
fn version_parts(v: &str) -> Option<Vec<u64>> {
    v.trim()
        .trim_start_matches('v')
        .split('.')
        .map(|p| p.parse().ok())
        .collect()
}

fn cmp_missing<T: PartialOrd>(a: Option<T>, b: Option<T>, missing_first: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (None, None) => Ordering::Equal,
        (None, Some(_)) if missing_first => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) if missing_first => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

/// Stable sort of `reports` on `key`; `reverse` flips the column's default direction.
pub fn sort_reports(reports: &mut [NodeReport], key: SortKey, reverse: bool) {
    let descending = key.default_reversed() != reverse;
    reports.sort_by(|a, b| {
        let ord = key.compare(a, b);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}
