//! API method tests.
//!
//! Each built-in test makes one real call with known-good parameters and
//! checks the shape of the answer, which says far more about a node's plugins
//! than a bare liveness check. Methods without a built-in test can still be
//! probed: they pass as long as the node returns a non-empty result.

use futures::future::join_all;
use serde_json::{json, Value};

use rpcscan_core::config::ScannerConfig;
use rpcscan_core::error::ScanError;
use rpcscan_core::request::RpcOutcome;
use rpcscan_core::rpc::NodeClient;

/// Everything the built-in tests need to know about the test fixtures.
#[derive(Debug, Clone)]
pub struct TestContext {
    /// Lowercased, trimmed test account.
    pub account: String,
    pub post: String,
    pub pub_prefix: String,
}

impl From<&ScannerConfig> for TestContext {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            account: cfg.account(),
            post: cfg.test_post.trim().to_string(),
            pub_prefix: cfg.pub_prefix.clone(),
        }
    }
}

type ParamsFn = fn(&TestContext) -> Value;
type CheckFn = fn(&TestContext, &Value) -> Result<(), String>;

/// A built-in method test: how to call the method and how to judge the result.
#[derive(Clone, Copy)]
pub struct MethodTest {
    pub method: &'static str,
    params: ParamsFn,
    check: CheckFn,
}

impl std::fmt::Debug for MethodTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTest").field("method", &self.method).finish()
    }
}

impl MethodTest {
    pub fn params(&self, ctx: &TestContext) -> Value {
        (self.params)(ctx)
    }

    pub fn check(&self, ctx: &TestContext, result: &Value) -> Result<(), String> {
        (self.check)(ctx, result)
    }
}

const MIN_HISTORY: usize = 5;
const BLOG_COUNT: usize = 10;
const FOLLOWER_COUNT: usize = 10;
const TRENDING_LIMIT: usize = 10;
const COMMUNITY_MARKER: &str = "hive-";

/// The built-in catalogue.
pub static METHOD_TESTS: [MethodTest; 8] = [
    MethodTest {
        method: "account_history_api.get_account_history",
        params: |ctx| json!({"account": ctx.account, "start": -1, "limit": 100}),
        check: |_, res| {
            let history = res
                .get("history")
                .ok_or("JSON key 'history' not found in result")?;
            check_history(history)
        },
    },
    MethodTest {
        method: "condenser_api.get_account_history",
        params: |ctx| json!([ctx.account, -100, 100]),
        check: |_, res| check_history(res),
    },
    MethodTest {
        method: "condenser_api.get_accounts",
        params: |ctx| json!([[ctx.account]]),
        check: |ctx, res| {
            let name = res
                .get(0)
                .and_then(|acc| acc.get("name"))
                .and_then(Value::as_str)
                .ok_or("no account name in result")?;
            if name.trim().to_lowercase() != ctx.account {
                return Err(format!(
                    "account {name} was returned, but expected {}",
                    ctx.account
                ));
            }
            Ok(())
        },
    },
    MethodTest {
        method: "condenser_api.get_blog",
        params: |ctx| json!([ctx.account, -1, BLOG_COUNT]),
        check: |_, res| {
            let items = list_of_at_least(res, BLOG_COUNT, "blog results")?;
            for item in items {
                require_keys(item, &["blog", "entry_id", "comment"])?;
                require_keys(&item["comment"], &["body"])
                    .map_err(|e| format!("{e} (in 'comment')"))?;
            }
            Ok(())
        },
    },
    MethodTest {
        method: "condenser_api.get_content",
        params: |ctx| json!([ctx.account, ctx.post]),
        check: |_, res| require_keys(res, &["body", "author", "category", "title"]),
    },
    MethodTest {
        method: "condenser_api.get_followers",
        params: |ctx| json!([ctx.account, null, "blog", FOLLOWER_COUNT]),
        check: |_, res| {
            for item in list_of_at_least(res, FOLLOWER_COUNT, "follower results")? {
                require_keys(item, &["follower", "following", "what"])?;
            }
            Ok(())
        },
    },
    MethodTest {
        method: "condenser_api.get_witness_by_account",
        params: |ctx| json!([ctx.account]),
        check: |ctx, res| {
            let owner = res
                .get("owner")
                .and_then(Value::as_str)
                .ok_or("JSON key 'owner' not found in result")?;
            if owner.trim().to_lowercase() != ctx.account {
                return Err(format!(
                    "witness {owner} was returned, but expected {}",
                    ctx.account
                ));
            }
            let key = res
                .get("signing_key")
                .and_then(Value::as_str)
                .ok_or("JSON key 'signing_key' not found in result")?;
            if !key.starts_with(&ctx.pub_prefix) {
                return Err(format!(
                    "signing key {key} does not start with {}",
                    ctx.pub_prefix
                ));
            }
            Ok(())
        },
    },
    MethodTest {
        method: "bridge.get_trending_topics",
        params: |_| json!({"limit": TRENDING_LIMIT}),
        check: |_, res| {
            let topics = res.as_array().ok_or("result is not a list")?;
            for topic in topics {
                let pair = topic
                    .as_array()
                    .ok_or_else(|| format!("community entry {topic} is not a list"))?;
                if pair.len() != 2 {
                    return Err(format!(
                        "community entry contained {} items (expected 2)",
                        pair.len()
                    ));
                }
                let name = pair[0].as_str().unwrap_or_default();
                if !name.contains(COMMUNITY_MARKER) {
                    return Err(format!("invalid community '{}'", pair[0]));
                }
            }
            Ok(())
        },
    },
];

/// Names of every built-in test, in catalogue order.
pub fn catalogue() -> impl Iterator<Item = &'static str> {
    METHOD_TESTS.iter().map(|t| t.method)
}

/// Look up a built-in test by method name.
pub fn find_test(method: &str) -> Option<&'static MethodTest> {
    METHOD_TESTS.iter().find(|t| t.method == method)
}

fn require_keys(item: &Value, keys: &[&str]) -> Result<(), String> {
    let obj = item
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", type_name(item)))?;
    match keys.iter().find(|k| !obj.contains_key(**k)) {
        Some(missing) => Err(format!("JSON key '{missing}' not found")),
        None => Ok(()),
    }
}

fn list_of_at_least<'a>(res: &'a Value, min: usize, what: &str) -> Result<&'a Vec<Value>, String> {
    let items = res.as_array().ok_or("result is not a list")?;
    if items.len() < min {
        return Err(format!("too few {what}: only {} (< {min})", items.len()));
    }
    Ok(items)
}

/// History is a list of `[sequence, operation]` pairs.
fn check_history(res: &Value) -> Result<(), String> {
    let items = res.as_array().ok_or("history is not a list")?;
    for entry in items {
        let ok = entry
            .as_array()
            .is_some_and(|e| e.len() == 2 && (e[0].is_i64() || e[0].is_u64()) && e[1].is_object());
        if !ok {
            return Err("history data is malformed".into());
        }
    }
    if items.len() < MIN_HISTORY {
        return Err(format!(
            "too little history: only {} results (< {MIN_HISTORY})",
            items.len()
        ));
    }
    Ok(())
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// `null`, `""`, `[]` and `{}` count as empty.
pub fn is_empty_result(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Outcome of testing one method against one node.
#[derive(Debug, Clone)]
pub struct MethodTestResult {
    pub method: String,
    /// The underlying call, present whenever the node returned a result,
    /// even if that result then failed validation.
    pub call: Option<RpcOutcome>,
    pub error: Option<ScanError>,
}

impl MethodTestResult {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs method tests against nodes.
#[derive(Debug, Clone)]
pub struct MethodTestSuite {
    client: NodeClient,
    ctx: TestContext,
    probe_params: Value,
}

impl MethodTestSuite {
    pub fn new(client: NodeClient, config: &ScannerConfig) -> Self {
        Self {
            client,
            ctx: TestContext::from(config),
            probe_params: config.probe_params.clone(),
        }
    }

    pub fn context(&self) -> &TestContext {
        &self.ctx
    }

    /// Run the built-in test for `method`, or probe it generically if there is none.
    pub async fn run(&self, host: &str, method: &str) -> MethodTestResult {
        match find_test(method) {
            Some(test) => self.run_builtin(host, test).await,
            None => self.probe(host, method, self.probe_params.clone()).await,
        }
    }

    async fn run_builtin(&self, host: &str, test: &MethodTest) -> MethodTestResult {
        tracing::debug!(host, method = test.method, "testing method");
        let outcome = match self
            .client
            .call_with_retry(host, test.method, test.params(&self.ctx))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return failed(test.method, None, e),
        };
        match test.check(&self.ctx, &outcome.payload) {
            Ok(()) => {
                tracing::info!(host, method = test.method, "method is functioning");
                MethodTestResult {
                    method: test.method.to_string(),
                    call: Some(outcome),
                    error: None,
                }
            }
            Err(reason) => failed(
                test.method,
                Some(outcome),
                ScanError::Validation {
                    method: test.method.to_string(),
                    host: host.to_string(),
                    reason,
                },
            ),
        }
    }

    /// Call an arbitrary method with `params`; passes if the result is non-empty.
    pub async fn probe(&self, host: &str, method: &str, params: Value) -> MethodTestResult {
        tracing::debug!(host, method, "probing method without a built-in test");
        let outcome = match self.client.call_with_retry(host, method, params).await {
            Ok(outcome) => outcome,
            Err(e) => return failed(method, None, e),
        };
        if is_empty_result(&outcome.payload) {
            let err = ScanError::Validation {
                method: method.to_string(),
                host: host.to_string(),
                reason: "result was empty".into(),
            };
            return failed(method, Some(outcome), err);
        }
        MethodTestResult {
            method: method.to_string(),
            call: Some(outcome),
            error: None,
        }
    }

    /// Run every named method concurrently. Results come back in input order.
    pub async fn test_methods(&self, host: &str, methods: &[String]) -> Vec<MethodTestResult> {
        join_all(methods.iter().map(|m| self.run(host, m))).await
    }

    /// Run the built-in catalogue, optionally restricted to `whitelist` and
    /// minus `blacklist`.
    pub async fn test_all(
        &self,
        host: &str,
        whitelist: Option<&[String]>,
        blacklist: &[String],
    ) -> Vec<MethodTestResult> {
        let methods: Vec<String> = catalogue()
            .filter(|m| {
                let listed = whitelist.map_or(true, |w| w.iter().any(|x| x.as_str() == *m));
                if !listed {
                    tracing::debug!(host, method = *m, "skipping method not in whitelist");
                }
                listed
            })
            .filter(|m| {
                let skipped = blacklist.iter().any(|x| x.as_str() == *m);
                if skipped {
                    tracing::debug!(host, method = *m, "skipping blacklisted method");
                }
                !skipped
            })
            .map(str::to_string)
            .collect();
        self.test_methods(host, &methods).await
    }
}

fn failed(method: &str, call: Option<RpcOutcome>, error: ScanError) -> MethodTestResult {
    tracing::warn!(method, error = %error, "method test failed");
    MethodTestResult {
        method: method.to_string(),
        call,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rpcscan_core::request::{HttpReply, JsonRpcRequest};
    use rpcscan_core::transport::RpcTransport;
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx() -> TestContext {
        TestContext::from(&ScannerConfig::default())
    }

    fn history(n: usize) -> Value {
        Value::Array((0..n).map(|i| json!([i, {"op": ["vote", {}]}])).collect())
    }

    fn blog_item() -> Value {
        json!({"blog": "someguy123", "entry_id": 1, "comment": {"body": "hi"}})
    }

    #[test]
    fn catalogue_has_eight_unique_entries() {
        let names: std::collections::BTreeSet<_> = catalogue().collect();
        assert_eq!(names.len(), 8);
        assert!(find_test("bridge.get_trending_topics").is_some());
        assert!(find_test("block_api.get_block").is_none());
    }

    #[test]
    fn params_use_test_account() {
        let t = find_test("account_history_api.get_account_history").unwrap();
        assert_eq!(
            t.params(&ctx()),
            json!({"account": "someguy123", "start": -1, "limit": 100})
        );
        let t = find_test("condenser_api.get_followers").unwrap();
        assert_eq!(t.params(&ctx()), json!(["someguy123", null, "blog", 10]));
    }

    #[test]
    fn history_checks() {
        let ah = find_test("account_history_api.get_account_history").unwrap();
        assert!(ah.check(&ctx(), &json!({"history": history(5)})).is_ok());
        assert!(ah.check(&ctx(), &json!({"history": history(4)})).is_err());
        assert!(ah.check(&ctx(), &history(5)).is_err());

        let ch = find_test("condenser_api.get_account_history").unwrap();
        assert!(ch.check(&ctx(), &history(100)).is_ok());
        assert!(ch.check(&ctx(), &json!([["x", {}], [1, {}], [2, {}], [3, {}], [4, {}]])).is_err());
    }

    #[test]
    fn account_and_witness_checks() {
        let acc = find_test("condenser_api.get_accounts").unwrap();
        assert!(acc.check(&ctx(), &json!([{"name": " SomeGuy123 "}])).is_ok());
        assert!(acc.check(&ctx(), &json!([{"name": "other"}])).is_err());
        assert!(acc.check(&ctx(), &json!([])).is_err());

        let wit = find_test("condenser_api.get_witness_by_account").unwrap();
        assert!(wit
            .check(&ctx(), &json!({"owner": "someguy123", "signing_key": "STM7abc"}))
            .is_ok());
        let err = wit
            .check(&ctx(), &json!({"owner": "someguy123", "signing_key": "TST7abc"}))
            .unwrap_err();
        assert!(err.contains("STM"));
    }

    #[test]
    fn blog_content_and_followers_checks() {
        let blog = find_test("condenser_api.get_blog").unwrap();
        let ten = Value::Array(vec![blog_item(); 10]);
        assert!(blog.check(&ctx(), &ten).is_ok());
        assert!(blog.check(&ctx(), &Value::Array(vec![blog_item(); 9])).is_err());
        let mut broken = vec![blog_item(); 10];
        broken[3] = json!({"blog": "x", "entry_id": 1, "comment": {}});
        assert!(blog.check(&ctx(), &Value::Array(broken)).is_err());

        let content = find_test("condenser_api.get_content").unwrap();
        assert!(content
            .check(&ctx(), &json!({"body": "", "author": "a", "category": "c", "title": "t"}))
            .is_ok());
        assert_eq!(
            content.check(&ctx(), &json!({"body": "", "author": "a", "category": "c"})),
            Err("JSON key 'title' not found".to_string())
        );

        let followers = find_test("condenser_api.get_followers").unwrap();
        let f = json!({"follower": "a", "following": "someguy123", "what": ["blog"]});
        assert!(followers.check(&ctx(), &Value::Array(vec![f; 10])).is_ok());
    }

    #[test]
    fn trending_topics_check() {
        let t = find_test("bridge.get_trending_topics").unwrap();
        assert!(t
            .check(&ctx(), &json!([["hive-167922", "LeoFinance"], ["hive-174578", "OCD"]]))
            .is_ok());
        assert!(t.check(&ctx(), &json!([["hive-1", "a", "b"]])).is_err());
        assert!(t.check(&ctx(), &json!([["steem-1", "a"]])).is_err());
    }

    #[test]
    fn emptiness() {
        assert!(is_empty_result(&json!(null)));
        assert!(is_empty_result(&json!("")));
        assert!(is_empty_result(&json!([])));
        assert!(is_empty_result(&json!({})));
        assert!(!is_empty_result(&json!(0)));
        assert!(!is_empty_result(&json!([null])));
    }

    /// Answers every method with a fixed body.
    struct Canned(fn(&str) -> String);

    #[async_trait]
    impl RpcTransport for Canned {
        async fn send(&self, _host: &str, req: &JsonRpcRequest) -> Result<HttpReply, ScanError> {
            Ok(HttpReply::new(200, (self.0)(&req.method)))
        }

        async fn probe(&self, _host: &str) -> Result<HttpReply, ScanError> {
            Ok(HttpReply::new(200, "{}"))
        }
    }

    fn suite(answer: fn(&str) -> String) -> MethodTestSuite {
        let cfg = ScannerConfig {
            max_tries: 2,
            retry_delay: Duration::from_millis(1),
            probe_params: json!([1]),
            ..Default::default()
        };
        let client = NodeClient::new(Arc::new(Canned(answer)), &cfg);
        MethodTestSuite::new(client, &cfg)
    }

    #[tokio::test]
    async fn validation_failure_keeps_call_metrics() {
        let suite = suite(|_| r#"{"id":1,"result":[{"name":"nobody"}]}"#.to_string());
        let res = suite.run("https://node", "condenser_api.get_accounts").await;
        assert!(!res.passed());
        assert!(matches!(res.error, Some(ScanError::Validation { .. })));
        assert_eq!(res.call.map(|c| c.attempts), Some(1));
    }

    #[tokio::test]
    async fn rpc_errors_fail_without_metrics() {
        let suite = suite(|_| {
            r#"{"id":1,"error":{"code":-32601,"message":"Method not found"}}"#.to_string()
        });
        let res = suite.run("https://node", "bridge.get_trending_topics").await;
        assert!(!res.passed());
        assert!(res.call.is_none());
        assert!(matches!(res.error, Some(ScanError::Unreachable { attempts: 2, .. })));
    }

    #[tokio::test]
    async fn generic_probe_passes_on_non_empty_result() {
        let suite = suite(|m| match m {
            "block_api.get_block" => r#"{"id":1,"result":{"block":{}}}"#.to_string(),
            _ => r#"{"id":1,"result":[]}"#.to_string(),
        });
        assert!(suite.run("https://node", "block_api.get_block").await.passed());
        assert!(!suite.run("https://node", "database_api.nothing").await.passed());
    }

    #[tokio::test]
    async fn test_all_honours_lists() {
        let suite = suite(|_| r#"{"id":1,"result":[]}"#.to_string());
        let all = suite.test_all("https://node", None, &[]).await;
        assert_eq!(all.len(), 8);

        let white = vec![
            "condenser_api.get_accounts".to_string(),
            "bridge.get_trending_topics".to_string(),
        ];
        let black = vec!["condenser_api.get_accounts".to_string()];
        let some = suite.test_all("https://node", Some(&white), &black).await;
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].method, "bridge.get_trending_topics");
        // An empty topic list is valid.
        assert!(some[0].passed());
    }
}
