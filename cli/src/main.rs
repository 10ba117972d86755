//! RPCScan CLI: scan, rank and health-check Hive/Steem-family RPC nodes.
//!
//! # Commands
//! ```text
//! rpcscan scan          [-s <key>] [-r] [--plugins] [--json]
//! rpcscan health scan   <node> [--min-score N] [--no-plugins]
//! rpcscan health list   [-d] [--min-score N] [--no-plugins]
//! rpcscan health test-method  <node> <method> [--params JSON]
//! rpcscan health test-methods <node> [methods...] [-l N] [--params JSON]
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use rpcscan_core::config::{ScannerConfig, DEFAULT_MAX_SCORE};
use rpcscan_http::HttpTransport;
use rpcscan_scanner::Scanner;

mod cmd_health;
mod cmd_scan;
mod logging;
mod nodes;
mod render;

#[derive(Parser)]
#[command(
    name = "rpcscan",
    about = "Scan and rank Hive / Steem RPC nodes by health",
    long_about = "
Scans a list of Hive / Steem (and compatible) RPC nodes, works out which API
dialect each one speaks, fetches its version and head block, optionally tests
individual API methods, and scores every node out of MAX_SCORE.

ENVIRONMENT VARIABLES:
  NODE_FILE          Node list file (one URL per line)
  RPC_TIMEOUT        Per-request timeout in seconds
  MAX_TRIES          Attempts per call before a node is unreachable
  RETRY_DELAY        Seconds to wait between attempts
  TEST_ACCOUNT       Account used by the API method tests
  PLUGINS            Run API method tests during `scan`
  TEST_PLUGIN_LIST   Comma separated methods to test (default: all built-in)
  EXTRA_PLUGINS_LIST Comma separated methods appended to the test list
  SKIP_APIS          Comma separated methods never to test
  RUST_LOG           Log filter, overrides -v / -q
",
    version
)]
struct Cli {
    /// Verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    opts: ScanOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every command.
#[derive(Args, Debug, Clone)]
struct ScanOpts {
    /// File with one node URL per line
    #[arg(short = 'f', long, env = "NODE_FILE", default_value = "nodes.conf", global = true)]
    node_file: PathBuf,

    /// Per-request timeout (seconds)
    #[arg(long, env = "RPC_TIMEOUT", default_value = "3", value_parser = parse_secs, global = true)]
    rpc_timeout: Duration,

    /// Attempts per call before giving up on a node
    #[arg(long, env = "MAX_TRIES", default_value_t = 3, global = true)]
    max_tries: u32,

    /// Pause between attempts (seconds)
    #[arg(long, env = "RETRY_DELAY", default_value = "2.0", value_parser = parse_secs, global = true)]
    retry_delay: Duration,

    /// Account used by the API method tests
    #[arg(long = "account", env = "TEST_ACCOUNT", default_value = "someguy123", global = true)]
    test_account: String,

    /// Post permlink (by the test account) used by the content test
    #[arg(
        long,
        env = "TEST_POST",
        default_value = "announcement-soft-fork-0-22-2-released-steem-in-a-box-update",
        global = true
    )]
    test_post: String,

    /// Expected public key prefix in witness signing keys
    #[arg(long, env = "PUB_PREFIX", default_value = "STM", global = true)]
    pub_prefix: String,

    /// Methods to test (default: every built-in test)
    #[arg(long = "test-plugins", env = "TEST_PLUGIN_LIST", value_delimiter = ',', global = true)]
    test_plugins: Vec<String>,

    /// Methods appended to the test list
    #[arg(long, env = "EXTRA_PLUGINS_LIST", value_delimiter = ',', global = true)]
    extra_plugins: Vec<String>,

    /// Methods never to test
    #[arg(long = "skip-apis", env = "SKIP_APIS", value_delimiter = ',', global = true)]
    skip_apis: Vec<String>,

    /// Highest possible score
    #[arg(long, env = "MAX_SCORE", default_value_t = DEFAULT_MAX_SCORE, global = true)]
    max_score: u32,

    /// Exit code for good nodes
    #[arg(long, env = "GOOD_RETURN_CODE", default_value_t = 0, global = true)]
    good_return_code: i32,

    /// Exit code for bad or dead nodes
    #[arg(long, env = "BAD_RETURN_CODE", default_value_t = 8, global = true)]
    bad_return_code: i32,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every node in the node file and print a sorted table
    Scan {
        /// Sort by this column (server, status, block, time, version, network, res, retries, tests, score, ...)
        #[arg(short, long = "sort", alias = "order", default_value = "default")]
        sort: String,
        /// Reverse the sort order
        #[arg(short, long, alias = "invert")]
        reverse: bool,
        /// Also run the API method tests
        #[arg(long, env = "PLUGINS")]
        plugins: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Health checks with exit codes for scripts and monitoring
    Health {
        #[command(subcommand)]
        action: HealthAction,
    },
}

#[derive(Subcommand)]
enum HealthAction {
    /// Scan a single node and print a detailed report
    Scan {
        node: String,
        /// Score below which the node counts as bad (default: MAX_SCORE - 10)
        #[arg(short = 's', long)]
        min_score: Option<u32>,
        /// Skip the API method tests
        #[arg(long)]
        no_plugins: bool,
    },

    /// Print the nodes from the node file that score at least the minimum
    List {
        /// Print score, version and block details
        #[arg(short, long)]
        detailed: bool,
        /// Minimum score (default: MAX_SCORE - 10)
        #[arg(short = 's', long)]
        min_score: Option<u32>,
        /// Skip the API method tests
        #[arg(long)]
        no_plugins: bool,
    },

    /// Test one API method against a node, without any other scanning
    #[command(name = "test-method", alias = "test_method")]
    TestMethod {
        node: String,
        method: String,
        /// JSON params for methods without a built-in test
        #[arg(long, default_value = "[]")]
        params: String,
    },

    /// Test several API methods (default: every built-in test) against a node
    #[command(name = "test-methods", alias = "test_methods")]
    TestMethods {
        node: String,
        methods: Vec<String>,
        /// Working methods needed for a good exit code (default: 75% of tested)
        #[arg(short = 'l', long)]
        min_methods: Option<usize>,
        /// JSON params for methods without a built-in test
        #[arg(long, default_value = "[]")]
        params: String,
    },
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.trim().parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {s:?}: {e}"))
}

impl ScanOpts {
    fn scanner_config(&self, plugins: bool) -> ScannerConfig {
        ScannerConfig {
            rpc_timeout: self.rpc_timeout,
            max_tries: self.max_tries,
            retry_delay: self.retry_delay,
            test_account: self.test_account.clone(),
            test_post: self.test_post.clone(),
            pub_prefix: self.pub_prefix.clone(),
            plugins,
            test_plugins: non_empty(&self.test_plugins),
            extra_plugins: non_empty(&self.extra_plugins),
            skip_plugins: non_empty(&self.skip_apis),
            max_score: self.max_score,
            good_return_code: self.good_return_code,
            bad_return_code: self.bad_return_code,
            ..Default::default()
        }
    }
}

/// Drop blanks left by empty env vars or trailing commas.
fn non_empty(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn build_scanner(config: ScannerConfig) -> Result<Scanner> {
    let transport =
        HttpTransport::with_timeout(config.rpc_timeout).context("failed to set up HTTP transport")?;
    Ok(Scanner::new(Arc::new(transport), config))
}

fn parse_params(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).with_context(|| format!("--params is not valid JSON: {raw}"))
}

async fn run(cli: Cli) -> Result<i32> {
    let opts = cli.opts;
    match cli.command {
        Commands::Scan {
            sort,
            reverse,
            plugins,
            json,
        } => {
            let scanner = build_scanner(opts.scanner_config(plugins))?;
            cmd_scan::run(&scanner, &opts.node_file, &sort, reverse, json).await
        }
        Commands::Health { action } => match action {
            HealthAction::Scan {
                node,
                min_score,
                no_plugins,
            } => {
                let scanner = build_scanner(opts.scanner_config(!no_plugins))?;
                cmd_health::scan(&scanner, &node, min_score).await
            }
            HealthAction::List {
                detailed,
                min_score,
                no_plugins,
            } => {
                let scanner = build_scanner(opts.scanner_config(!no_plugins))?;
                cmd_health::list(&scanner, &opts.node_file, detailed, min_score).await
            }
            HealthAction::TestMethod {
                node,
                method,
                params,
            } => {
                let mut config = opts.scanner_config(false);
                config.probe_params = parse_params(&params)?;
                let scanner = build_scanner(config)?;
                cmd_health::test_method(&scanner, &node, &method).await
            }
            HealthAction::TestMethods {
                node,
                methods,
                min_methods,
                params,
            } => {
                let mut config = opts.scanner_config(false);
                config.probe_params = parse_params(&params)?;
                let scanner = build_scanner(config)?;
                cmd_health::test_methods(&scanner, &node, &methods, min_methods).await
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log = logging::LogConfig::from_flags(cli.verbose, cli.quiet, cli.log_json);
    if let Err(e) = logging::init_tracing(&log) {
        eprintln!("Warning: {e}");
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    process::exit(code);
}
