//! Plain-text rendering of scan results.

use std::fmt::Write;

use rpcscan_core::NodeReport;

fn opt_2dp(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "error".into())
}

fn head_block(r: &NodeReport) -> String {
    r.head_block
        .map(|b| b.to_string())
        .unwrap_or_else(|| "Unknown".into())
}

fn status(r: &NodeReport) -> String {
    match r.dead_reason {
        Some(reason) => format!("{} ({reason})", r.status),
        None => r.status.to_string(),
    }
}

fn api_tests(r: &NodeReport) -> String {
    format!("{} / {}", r.methods_passed, r.methods_tested)
}

/// The health table printed by `rpcscan scan`.
pub fn scan_table(reports: &[NodeReport], with_tests: bool) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{:<40} {:<4} {:<18} {:<10} {:<21} {:<10} {:<12} {:<9} {:<11}",
        "Server", "Type", "Status", "Head Block", "Block Time", "Version", "Network", "Res Time",
        "Avg Retries"
    );
    if with_tests {
        let _ = write!(out, " {:<10}", "API Tests");
    }
    out.push('\n');

    for r in reports {
        let _ = write!(
            out,
            "{:<40} {:<4} {:<18} {:<10} {:<21} {:<10} {:<12} {:<9} {:<11}",
            r.host,
            r.kind.symbol(),
            status(r),
            head_block(r),
            r.block_time_str(),
            r.version_str(),
            r.network_str(),
            opt_2dp(r.avg_response_time),
            opt_2dp(r.avg_tries),
        );
        if with_tests {
            let _ = write!(out, " {:<10}", api_tests(r));
        }
        out.push('\n');
    }
    out
}

/// Detailed single-node report printed by `rpcscan health scan`.
pub fn node_report(r: &NodeReport, max_score: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Node: {}", r.host);
    let _ = writeln!(out, "Status: {}", r.label);
    let _ = writeln!(out, "Type: {} {}", r.kind, r.kind.symbol());
    let _ = writeln!(out, "Network: {}", r.network_str());
    let _ = writeln!(out, "Version: {}", r.version_str());
    let _ = writeln!(out, "Block: {}", head_block(r));
    let _ = writeln!(out, "Time: {} ({} ago)", r.block_time_str(), r.time_behind_str());
    if r.method_tests_enabled {
        let _ = writeln!(out, "Plugins: {}", api_tests(r));
        let _ = writeln!(out, "PluginList: {:?}", r.passed_methods);
        let broken: Vec<&String> = r.broken_methods.keys().collect();
        let _ = writeln!(out, "BrokenAPIs: {broken:?}");
    }
    let _ = writeln!(out, "PassedStages: {}", r.stages_str());
    let _ = writeln!(out, "Retries: {}", r.total_retries);
    let _ = writeln!(out, "Score: {} (out of {max_score})", r.score);
    out
}

/// Header for `health list -d`.
pub const LIST_HEADER: &str =
    "Node                           Status     Score      Version    Block           Time                  Plugins";

/// One row of `health list -d`.
pub fn list_row(r: &NodeReport) -> String {
    format!(
        "{:<30} {:<10} {:<10} {:<10} {:<15} {:<21} {}",
        r.host,
        r.label.to_string(),
        r.score,
        r.version_str(),
        head_block(r),
        r.block_time_str(),
        api_tests(r)
    )
}

pub fn method_line(method: &str, working: bool) -> String {
    format!("{method:<50} {}", if working { "WORKING" } else { "BROKEN" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rpcscan_core::{DeadReason, NodeRecord, RpcOutcome, ScorePolicy, Stage};
    use std::time::Duration;

    fn dead_ws() -> NodeReport {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut rec = NodeRecord::new("https://ws.example", now);
        rec.dead_reason = Some(DeadReason::WsOnly);
        NodeReport::scored(&rec, &ScorePolicy::default(), 40)
    }

    #[test]
    fn dead_node_row_shows_reason_and_errors() {
        let table = scan_table(&[dead_ws()], true);
        let row = table.lines().nth(1).unwrap();
        assert!(row.starts_with("https://ws.example"));
        assert!(row.contains("DEAD (WS Only)"));
        assert!(row.contains("error"));
        assert!(row.trim_end().ends_with("0 / 0"));
    }

    #[test]
    fn dead_reason_shown_for_partially_scanned_node() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut rec = NodeRecord::new("https://late-ws.example", now);
        rec.pass_stage(Stage::Identify, &RpcOutcome::new((), Duration::from_millis(40)));
        rec.dead_reason = Some(DeadReason::WsOnly);
        let report = NodeReport::scored(&rec, &ScorePolicy::default(), 40);
        let table = scan_table(&[report], false);
        assert!(table.lines().nth(1).unwrap().contains("UNSTABLE (WS Only)"));
    }

    #[test]
    fn header_has_test_column_only_when_asked() {
        assert!(scan_table(&[], true).contains("API Tests"));
        assert!(!scan_table(&[], false).contains("API Tests"));
    }

    #[test]
    fn report_lists_score() {
        let text = node_report(&dead_ws(), 50);
        assert!(text.contains("Score: 0 (out of 50)"));
        assert!(text.contains("PassedStages: 0/3"));
        assert!(!text.contains("Plugins:"));
    }

    #[test]
    fn method_lines() {
        assert!(method_line("condenser_api.get_blog", true).ends_with("WORKING"));
        assert!(method_line("condenser_api.get_blog", false).ends_with("BROKEN"));
    }
}
