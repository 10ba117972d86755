//! The staged scan pipeline.
//!
//! ```text
//! identify ──► filter ──► version ──► block info ──► [method tests]
//!   (GET)     (props)    (config)     (props)
//! ```
//!
//! Each stage fans out over every node still in the running and is a full
//! barrier: stage N+1 starts only once every stage-N call has resolved. The
//! filter stage queues the version and block-info calls as background tasks,
//! so those two run concurrently and are only awaited by their own stages.
//!
//! Tasks never touch a [`NodeRecord`]. They return values and the scanner
//! applies them between barriers, so every record has a single writer.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use rpcscan_core::chain;
use rpcscan_core::config::ScannerConfig;
use rpcscan_core::error::{DeadReason, ScanError};
use rpcscan_core::identify::ServerKind;
use rpcscan_core::node::{NodeRecord, Stage};
use rpcscan_core::request::RpcOutcome;
use rpcscan_core::rpc::NodeClient;
use rpcscan_core::transport::RpcTransport;

use crate::methods::{self, MethodTestResult, MethodTestSuite};

type CallHandle = JoinHandle<Result<RpcOutcome, ScanError>>;

/// Calls queued by the filter stage for one node.
struct Queued {
    idx: usize,
    config: CallHandle,
    props: CallHandle,
}

/// Scans a set of nodes and measures them.
#[derive(Debug, Clone)]
pub struct Scanner {
    client: NodeClient,
    suite: MethodTestSuite,
    config: Arc<ScannerConfig>,
}

impl Scanner {
    pub fn new(transport: Arc<dyn RpcTransport>, config: ScannerConfig) -> Self {
        let client = NodeClient::new(transport, &config);
        let suite = MethodTestSuite::new(client.clone(), &config);
        Self {
            client,
            suite,
            config: Arc::new(config),
        }
    }

    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    pub fn suite(&self) -> &MethodTestSuite {
        &self.suite
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Methods the optional test stage runs against every live node.
    pub fn method_list(&self) -> Vec<String> {
        self.config.plugin_list(methods::catalogue())
    }

    /// Scan `nodes`, returning one record per input entry in input order.
    ///
    /// Never fails: every problem ends up encoded in the records.
    pub async fn scan(&self, nodes: &[String]) -> Vec<NodeRecord> {
        let started = Utc::now();
        let mut records: Vec<NodeRecord> =
            nodes.iter().map(|h| NodeRecord::new(h.as_str(), started)).collect();
        tracing::info!(nodes = records.len(), "starting scan");

        let alive = self.identify_stage(&mut records).await;
        let queued = self.filter_stage(&mut records, alive).await;
        let queued = self.version_stage(&mut records, queued).await;
        self.block_info_stage(&mut records, queued).await;

        if self.config.plugins {
            self.method_stage(&mut records).await;
        }

        tracing::info!(
            nodes = records.len(),
            online = records.iter().filter(|r| r.stages_passed() > 0).count(),
            "scan finished"
        );
        records
    }

    /// Scan a single node.
    pub async fn scan_node(&self, host: &str) -> NodeRecord {
        self.scan(&[host.to_string()])
            .await
            .pop()
            .unwrap_or_else(|| NodeRecord::new(host, Utc::now()))
    }

    async fn identify_stage(&self, records: &mut [NodeRecord]) -> Vec<usize> {
        let hosts: Vec<String> = records.iter().map(|r| r.host.clone()).collect();
        let results = join_all(hosts.iter().map(|h| self.client.identify(h))).await;

        let mut alive = Vec::new();
        for (idx, res) in results.into_iter().enumerate() {
            let rec = &mut records[idx];
            match res {
                Ok(outcome) if outcome.payload == ServerKind::Unknown => {
                    tracing::warn!(host = %rec.host, "could not identify server type, skipping");
                }
                Ok(outcome) => {
                    rec.kind = outcome.payload;
                    rec.pass_stage(Stage::Identify, &outcome);
                    tracing::info!(host = %rec.host, kind = %rec.kind, "identified node");
                    alive.push(idx);
                }
                Err(e) => {
                    // Identify failures always drop the node.
                    note_failure(rec, "identify", &e);
                }
            }
        }
        alive
    }

    async fn filter_stage(&self, records: &mut [NodeRecord], alive: Vec<usize>) -> Vec<Queued> {
        let checks = join_all(alive.iter().map(|&idx| {
            let host = records[idx].host.clone();
            let kind = records[idx].kind;
            async move {
                let res = match kind.props_method() {
                    Some(method) => self.client.call_with_retry(&host, method, json!([])).await,
                    None => Err(ScanError::Unexpected(format!("no API dialect for {host}"))),
                };
                (idx, res)
            }
        }))
        .await;

        let mut queued = Vec::new();
        for (idx, res) in checks {
            let rec = &mut records[idx];
            match res {
                Ok(_) => {
                    let (Some(config_method), Some(props_method)) =
                        (rec.kind.config_method(), rec.kind.props_method())
                    else {
                        continue;
                    };
                    queued.push(Queued {
                        idx,
                        config: self.spawn_call(&rec.host, config_method),
                        props: self.spawn_call(&rec.host, props_method),
                    });
                }
                Err(e) => {
                    note_failure(rec, "filter", &e);
                }
            }
        }
        queued
    }

    async fn version_stage(&self, records: &mut [NodeRecord], mut queued: Vec<Queued>) -> Vec<Queued> {
        let configs = join_all(queued.iter_mut().map(|q| joined(&mut q.config))).await;

        let mut survivors = Vec::new();
        for (q, res) in queued.into_iter().zip(configs) {
            let rec = &mut records[q.idx];
            match res {
                Ok(outcome) => {
                    let version = chain::extract_version(rec.kind, &outcome.payload);
                    tracing::debug!(host = %rec.host, %version, "got version");
                    rec.version = Some(version);
                    rec.pass_stage(Stage::Version, &outcome);
                    survivors.push(q);
                }
                Err(e) => {
                    if note_failure(rec, "version", &e) {
                        // Unreachable always drops the node, so its queued
                        // properties are never read even if they arrive.
                        q.props.abort();
                    } else {
                        survivors.push(q);
                    }
                }
            }
        }
        survivors
    }

    async fn block_info_stage(&self, records: &mut [NodeRecord], queued: Vec<Queued>) {
        let stage_start = Utc::now();
        let props = join_all(queued.into_iter().map(|mut q| async move {
            let res = joined(&mut q.props).await;
            (q.idx, res)
        }))
        .await;

        for (idx, res) in props {
            let rec = &mut records[idx];
            rec.scanned_at = stage_start;
            let outcome = match res.and_then(|o| read_block_info(&rec.host, o)) {
                Ok(outcome) => outcome,
                Err(e) => {
                    note_failure(rec, "block info", &e);
                    continue;
                }
            };
            let info = &outcome.payload;
            rec.head_block = Some(info.head_block);
            rec.block_time = info.block_time;
            rec.network = Some(info.network);
            rec.pass_stage(Stage::BlockInfo, &outcome);
            tracing::debug!(
                host = %rec.host,
                head_block = info.head_block,
                network = %info.network,
                "got block info"
            );
        }
    }

    async fn method_stage(&self, records: &mut [NodeRecord]) {
        let methods = self.method_list();
        tracing::info!(methods = methods.len(), "running method tests");

        let targets: Vec<(usize, String)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.stages_passed() > 0)
            .map(|(idx, r)| (idx, r.host.clone()))
            .collect();
        let results = join_all(targets.iter().map(|(idx, host)| {
            let methods = &methods;
            async move { (*idx, self.suite.test_methods(host, methods).await) }
        }))
        .await;

        for rec in records.iter_mut() {
            rec.method_tests_enabled = true;
        }
        for (idx, tests) in results {
            apply_method_results(&mut records[idx], tests);
        }
    }

    fn spawn_call(&self, host: &str, method: &'static str) -> CallHandle {
        let client = self.client.clone();
        let host = host.to_string();
        tokio::spawn(async move { client.call_with_retry(&host, method, json!([])).await })
    }
}

async fn joined(handle: &mut CallHandle) -> Result<RpcOutcome, ScanError> {
    match handle.await {
        Ok(res) => res,
        Err(e) => Err(ScanError::Unexpected(format!("queued call failed: {e}"))),
    }
}

/// Facts extracted from a global-properties payload.
struct BlockInfo {
    head_block: u64,
    block_time: Option<chrono::DateTime<Utc>>,
    network: chain::Network,
}

fn read_block_info(host: &str, outcome: RpcOutcome) -> Result<RpcOutcome<BlockInfo>, ScanError> {
    let props: &Value = &outcome.payload;
    let head_block = chain::head_block(props).ok_or_else(|| {
        ScanError::Unexpected(format!("{host} returned properties without a head block"))
    })?;
    let block_time = chain::block_time(props);
    let network = chain::network_from_props(props);
    Ok(outcome.map(|_| BlockInfo {
        head_block,
        block_time,
        network,
    }))
}

/// Log a stage failure. Returns `true` if the node is out of the scan.
fn note_failure(rec: &mut NodeRecord, stage: &str, err: &ScanError) -> bool {
    match err {
        ScanError::Unreachable { reason, .. } => {
            if *reason == DeadReason::WsOnly {
                rec.dead_reason = Some(DeadReason::WsOnly);
            }
            tracing::warn!(host = %rec.host, stage, error = %err, "node dropped");
            true
        }
        other => {
            tracing::error!(host = %rec.host, stage, error = %other, "unexpected error during stage");
            false
        }
    }
}

/// Fold method test results into `rec`.
pub fn apply_method_results(rec: &mut NodeRecord, results: Vec<MethodTestResult>) {
    for res in results {
        if let Some(call) = &res.call {
            rec.record_call(&res.method, call);
        }
        match res.error {
            None => {
                rec.passed_methods.insert(res.method);
            }
            Some(e) => {
                rec.failed_methods.insert(res.method, e.to_string());
            }
        }
    }
}
