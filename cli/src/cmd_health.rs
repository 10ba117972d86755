//! `rpcscan health`: single-node checks that report through the exit code.
//!
//! Every action returns the configured good or bad return code, so the
//! commands can drive a monitoring check or a load balancer health probe.

use std::path::Path;

use anyhow::{bail, Result};

use rpcscan_core::{sort_reports, NodeReport, ScannerConfig, ScorePolicy, SortKey};
use rpcscan_scanner::Scanner;

use crate::{nodes, render};

/// Validate `--min-score`, defaulting to ten below the maximum.
fn min_score(config: &ScannerConfig, requested: Option<u32>) -> Result<u32> {
    let min = requested.unwrap_or_else(|| config.default_min_score());
    if min < 1 || min > config.max_score {
        bail!(
            "minimum score must be between 1 and {} (got {min})",
            config.max_score
        );
    }
    Ok(min)
}

/// Working methods needed for a pass: explicit, or 75% of those tested (at least one).
fn required_methods(total: usize, requested: Option<usize>) -> usize {
    requested.unwrap_or_else(|| (total * 3 / 4).max(1))
}

fn summary_label(working: usize, required: usize, total: usize) -> &'static str {
    if working < required {
        "BAD"
    } else if working == total {
        "PERFECT"
    } else {
        "GOOD"
    }
}

pub async fn scan(scanner: &Scanner, node: &str, requested_min: Option<u32>) -> Result<i32> {
    let config = scanner.config();
    let min = min_score(config, requested_min)?;
    let policy = ScorePolicy::from(config);

    let record = scanner.scan_node(node).await;
    let report = NodeReport::scored(&record, &policy, min);
    if report.score == 0 {
        println!("Node: {}\nStatus: DEAD", report.host);
        return Ok(policy.bad_return_code);
    }
    print!("{}", render::node_report(&report, policy.max_score));
    Ok(report.exit_code)
}

pub async fn list(
    scanner: &Scanner,
    node_file: &Path,
    detailed: bool,
    requested_min: Option<u32>,
) -> Result<i32> {
    let config = scanner.config();
    let min = min_score(config, requested_min)?;
    let policy = ScorePolicy::from(config);

    let hosts = nodes::load_nodes(node_file)?;
    if hosts.is_empty() {
        bail!("no usable nodes in {}", node_file.display());
    }
    let records = scanner.scan(&hosts).await;
    let mut reports: Vec<NodeReport> = records
        .iter()
        .map(|r| NodeReport::scored(r, &policy, min))
        .filter(|r| r.score >= min)
        .collect();
    sort_reports(&mut reports, SortKey::Score, false);

    if detailed {
        eprintln!("{}", render::LIST_HEADER);
    }
    for r in &reports {
        if detailed {
            println!("{}", render::list_row(r));
        } else {
            println!("{}", r.host);
        }
    }
    tracing::info!(good = reports.len(), total = hosts.len(), min_score = min, "listed nodes");
    Ok(policy.good_return_code)
}

pub async fn test_method(scanner: &Scanner, node: &str, method: &str) -> Result<i32> {
    let config = scanner.config();
    let result = scanner.suite().run(node, method).await;
    println!("{}", render::method_line(method, result.passed()));
    if let Some(e) = &result.error {
        tracing::debug!(node, method, error = %e, "method test failed");
        return Ok(config.bad_return_code);
    }
    Ok(config.good_return_code)
}

pub async fn test_methods(
    scanner: &Scanner,
    node: &str,
    methods: &[String],
    requested_min: Option<usize>,
) -> Result<i32> {
    let config = scanner.config();
    let results = if methods.is_empty() {
        scanner.suite().test_all(node, None, &config.skip_plugins).await
    } else {
        scanner.suite().test_methods(node, methods).await
    };

    let total = results.len();
    let working = results.iter().filter(|r| r.passed()).count();
    let required = required_methods(total, requested_min);

    for r in &results {
        println!("{}", render::method_line(&r.method, r.passed()));
    }
    println!();
    println!("WORKING: {working} | BROKEN: {} | TOTAL: {total}", total - working);
    println!("Status: {}", summary_label(working, required, total));

    if working >= required {
        Ok(config.good_return_code)
    } else {
        Ok(config.bad_return_code)
    }
}
