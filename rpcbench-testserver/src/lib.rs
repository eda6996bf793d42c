use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_RPC: &str = "/";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_FAIL: &str = "/fail";

/// Highest block number the mock node knows about.
pub const HEAD_BLOCK: u64 = 1_000_000;

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const PARSE_ERROR: i64 = -32700;

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    block_number: Arc<AtomicU64>,
    get_block_by_number: Arc<AtomicU64>,
    get_block_by_hash: Arc<AtomicU64>,
    rpc_errors: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn block_number(&self) -> u64 {
        self.block_number.load(Ordering::Relaxed)
    }

    pub fn get_block_by_number(&self) -> u64 {
        self.get_block_by_number.load(Ordering::Relaxed)
    }

    pub fn get_block_by_hash(&self) -> u64 {
        self.get_block_by_hash.load(Ordering::Relaxed)
    }

    pub fn rpc_errors(&self) -> u64 {
        self.rpc_errors.load(Ordering::Relaxed)
    }
}

/// Synthetic hash for a block number. Reversible so `eth_getBlockByHash` can find the block.
pub fn block_hash(number: u64) -> String {
    format!("0x{number:064x}")
}

fn block_number_from_hash(hash: &str) -> Option<u64> {
    let hex = hash.strip_prefix("0x")?;
    if hex.len() != 64 {
        return None;
    }
    u64::from_str_radix(hex.trim_start_matches('0'), 16)
        .ok()
        .or_else(|| hex.bytes().all(|b| b == b'0').then_some(0))
}

fn parse_quantity(v: &Value) -> Option<u64> {
    match v.as_str()? {
        "latest" | "safe" | "finalized" | "pending" => Some(HEAD_BLOCK),
        "earliest" => Some(0),
        s => u64::from_str_radix(s.strip_prefix("0x")?, 16).ok(),
    }
}

fn block(number: u64, full_transactions: bool) -> Value {
    if number > HEAD_BLOCK {
        return Value::Null;
    }

    let transactions: Vec<Value> = (0..(number % 3))
        .map(|i| {
            let tx_hash = format!("0x{:064x}", number.wrapping_mul(31).wrapping_add(i));
            if full_transactions {
                json!({ "hash": tx_hash, "blockNumber": format!("0x{number:x}"), "transactionIndex": format!("0x{i:x}") })
            } else {
                Value::String(tx_hash)
            }
        })
        .collect();

    json!({
        "number": format!("0x{number:x}"),
        "hash": block_hash(number),
        "parentHash": block_hash(number.saturating_sub(1)),
        "timestamp": format!("0x{:x}", 1_600_000_000u64 + number * 12),
        "transactions": transactions,
    })
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

/// Answers a single JSON-RPC request object.
pub fn dispatch(stats: &TestServerStats, req: &Value) -> Value {
    let id = req.get("id").cloned().unwrap_or(Value::Null);
    let params = req
        .get("params")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let full = params.get(1).and_then(Value::as_bool).unwrap_or(false);

    let result = match req.get("method").and_then(Value::as_str) {
        Some("eth_blockNumber") => {
            TestServerStats::inc(&stats.block_number);
            json!(format!("0x{HEAD_BLOCK:x}"))
        }
        Some("eth_getBlockByNumber") => {
            TestServerStats::inc(&stats.get_block_by_number);
            match params.first().and_then(parse_quantity) {
                Some(n) => block(n, full),
                None => {
                    TestServerStats::inc(&stats.rpc_errors);
                    return rpc_error(id, INVALID_PARAMS, "invalid block number");
                }
            }
        }
        Some("eth_getBlockByHash") => {
            TestServerStats::inc(&stats.get_block_by_hash);
            match params
                .first()
                .and_then(Value::as_str)
                .and_then(block_number_from_hash)
            {
                Some(n) => block(n, full),
                None => Value::Null,
            }
        }
        _ => {
            TestServerStats::inc(&stats.rpc_errors);
            return rpc_error(id, METHOD_NOT_FOUND, "method not found");
        }
    };

    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn respond(stats: &TestServerStats, body: &[u8]) -> (StatusCode, Bytes) {
    TestServerStats::inc(&stats.requests_total);

    let res = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(batch)) => {
            Value::Array(batch.iter().map(|req| dispatch(stats, req)).collect())
        }
        Ok(req) => dispatch(stats, &req),
        Err(_) => {
            TestServerStats::inc(&stats.rpc_errors);
            rpc_error(Value::Null, PARSE_ERROR, "parse error")
        }
    };

    match serde_json::to_vec(&res) {
        Ok(bytes) => (StatusCode::OK, Bytes::from(bytes)),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::from_static(b"encode error"),
        ),
    }
}

async fn handle_rpc(State(stats): State<TestServerStats>, body: Bytes) -> (StatusCode, Bytes) {
    respond(&stats, &body)
}

async fn handle_slow(State(stats): State<TestServerStats>, body: Bytes) -> (StatusCode, Bytes) {
    sleep(Duration::from_millis(50)).await;
    respond(&stats, &body)
}

async fn handle_fail(State(stats): State<TestServerStats>) -> (StatusCode, Bytes) {
    TestServerStats::inc(&stats.requests_total);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Bytes::from_static(b"unavailable"),
    )
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_RPC, post(handle_rpc))
        .route(PATH_SLOW, post(handle_slow))
        .route(PATH_FAIL, post(handle_fail))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    rpc_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            rpc_url: format!("http://{addr}{PATH_RPC}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn slow_url(&self) -> String {
        format!("http://{}{PATH_SLOW}", self.addr)
    }

    pub fn fail_url(&self) -> String {
        format!("http://{}{PATH_FAIL}", self.addr)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
