//! `rpcscan scan`: scan the node file and print a sorted health table.

use std::path::Path;

use anyhow::{bail, Result};

use rpcscan_core::{sort_reports, NodeReport, ScorePolicy, SortKey};
use rpcscan_scanner::Scanner;

use crate::{nodes, render};

pub async fn run(
    scanner: &Scanner,
    node_file: &Path,
    sort: &str,
    reverse: bool,
    json: bool,
) -> Result<i32> {
    let hosts = nodes::load_nodes(node_file)?;
    if hosts.is_empty() {
        bail!("no usable nodes in {}", node_file.display());
    }
    let key = SortKey::resolve(sort);

    let config = scanner.config();
    let policy = ScorePolicy::from(config);
    let records = scanner.scan(&hosts).await;

    let mut reports: Vec<NodeReport> = records
        .iter()
        .map(|r| NodeReport::scored(r, &policy, config.default_min_score()))
        .collect();
    sort_reports(&mut reports, key, reverse);

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print!("{}", render::scan_table(&reports, config.plugins));
    }
    Ok(0)
}
