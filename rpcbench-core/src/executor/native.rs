use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hdrhistogram::Histogram;
use rpcbench_http::{HttpClient, HttpRequest, HttpResponse};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use super::{AttackExecutor, AttackReport, AttackRequest, AttackResult, ExecutorError};
use crate::load_test::AttackOptions;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Highest latency the histogram tracks (1h, in microseconds).
const MAX_TRACKABLE_MICROS: u64 = 3_600_000_000;

/// In-process executor: paces JSON-RPC POSTs with a tokio interval and records latencies in an
/// HDR histogram.
///
/// Supported options: `timeout` (e.g. `5s`) and `max_in_flight`.
#[derive(Debug, Clone, Default)]
pub struct NativeExecutor {
    client: HttpClient,
}

impl NativeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct NativeOptions {
    timeout: Duration,
    max_in_flight: usize,
}

impl NativeOptions {
    fn parse(options: &AttackOptions) -> Result<Self, ExecutorError> {
        let mut out = Self {
            timeout: DEFAULT_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        };

        for (name, value) in options {
            let invalid = |reason: &str| ExecutorError::InvalidOption {
                name: name.clone(),
                reason: reason.to_string(),
            };
            let value = value.as_deref().ok_or_else(|| invalid("a value is required"))?;

            match name.as_str() {
                "timeout" => {
                    out.timeout = humantime::parse_duration(value)
                        .map_err(|e| invalid(&e.to_string()))?;
                    if out.timeout.is_zero() {
                        return Err(invalid("must be a positive duration"));
                    }
                }
                "max_in_flight" => {
                    out.max_in_flight = value
                        .parse()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid("must be a positive integer"))?;
                }
                _ => return Err(invalid("not supported by the native executor")),
            }
        }

        Ok(out)
    }
}

enum Outcome {
    Ok { status: String },
    Failed { status: String, error: String },
}

struct Sample {
    latency: Duration,
    bytes_in: u64,
    outcome: Outcome,
}

fn classify(res: Result<HttpResponse, rpcbench_http::Error>) -> (u64, Outcome) {
    let res = match res {
        Ok(res) => res,
        Err(err) => {
            return (
                0,
                Outcome::Failed {
                    status: "0".to_string(),
                    error: err.transport_error_kind().to_string(),
                },
            );
        }
    };

    let bytes_in = res.body.len() as u64;
    let status = res.status.to_string();
    if !res.is_success() {
        return (
            bytes_in,
            Outcome::Failed {
                error: format!("http status {status}"),
                status,
            },
        );
    }

    // A JSON-RPC error still arrives with HTTP 200.
    let rpc_error = serde_json::from_slice::<serde_json::Value>(&res.body)
        .ok()
        .and_then(|v| v.get("error").cloned());
    match rpc_error {
        Some(err) if !err.is_null() => {
            let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
            (
                bytes_in,
                Outcome::Failed {
                    status,
                    error: format!("json-rpc error {code}"),
                },
            )
        }
        _ => (bytes_in, Outcome::Ok { status }),
    }
}

struct Tally {
    latencies: Histogram<u64>,
    successes: u64,
    bytes_in: u64,
    status_codes: BTreeMap<String, u64>,
    errors: BTreeSet<String>,
}

impl Tally {
    fn new() -> Result<Self, ExecutorError> {
        let latencies = Histogram::new_with_bounds(1, MAX_TRACKABLE_MICROS, 3)
            .map_err(|e| ExecutorError::Failed(format!("latency histogram: {e}")))?;
        Ok(Self {
            latencies,
            successes: 0,
            bytes_in: 0,
            status_codes: BTreeMap::new(),
            errors: BTreeSet::new(),
        })
    }

    fn record(&mut self, sample: Sample) {
        let micros = u64::try_from(sample.latency.as_micros()).unwrap_or(u64::MAX);
        self.latencies.saturating_record(micros.max(1));
        self.bytes_in = self.bytes_in.saturating_add(sample.bytes_in);

        let status = match sample.outcome {
            Outcome::Ok { status } => {
                self.successes += 1;
                status
            }
            Outcome::Failed { status, error } => {
                self.errors.insert(error);
                status
            }
        };
        *self.status_codes.entry(status).or_default() += 1;
    }

    fn record_dropped(&mut self) {
        self.errors.insert("dropped: max_in_flight reached".to_string());
        *self.status_codes.entry("0".to_string()).or_default() += 1;
    }

    fn percentile_secs(&self, q: f64) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        micros_to_secs(self.latencies.value_at_quantile(q))
    }
}

fn micros_to_secs(v: u64) -> f64 {
    v as f64 / 1_000_000.0
}

impl AttackExecutor for NativeExecutor {
    async fn execute(&self, req: AttackRequest<'_>) -> Result<AttackResult, ExecutorError> {
        let options = NativeOptions::parse(req.options)?;
        if req.calls.is_empty() || req.rate == 0 {
            return Err(ExecutorError::Failed(
                "attack has no calls or a zero rate".to_string(),
            ));
        }

        let total = req.total_requests();
        let url = req.url.as_str().to_string();
        let period = Duration::from_nanos((1_000_000_000 / req.rate).max(1));
        let window = Duration::from_secs(req.duration);

        let started = Instant::now();
        // Request `i` is due at `started + i * period`; the attack owns the whole window.
        let mut ticker = tokio::time::interval_at(started, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let in_flight = Arc::new(Semaphore::new(options.max_in_flight));
        let mut tasks: JoinSet<Sample> = JoinSet::new();
        let mut tally = Tally::new()?;
        let mut bytes_out = 0u64;

        for (i, call) in (0..total).zip(req.calls.iter().cycle()) {
            ticker.tick().await;

            let Ok(permit) = in_flight.clone().try_acquire_owned() else {
                tally.record_dropped();
                continue;
            };

            let body = Bytes::from(call.request_body(i + 1));
            bytes_out = bytes_out.saturating_add(body.len() as u64);

            let client = self.client.clone();
            let request = HttpRequest::json(&url, body).with_timeout(options.timeout);
            tasks.spawn(async move {
                let _permit = permit;
                let sent = Instant::now();
                let res = client.request(request).await;
                let latency = sent.elapsed();
                let (bytes_in, outcome) = classify(res);
                Sample {
                    latency,
                    bytes_in,
                    outcome,
                }
            });

            // Keep the set from growing with finished tasks during long attacks.
            while let Some(done) = tasks.try_join_next() {
                tally.record(done.map_err(|e| ExecutorError::Failed(e.to_string()))?);
            }
        }
        tokio::time::sleep_until(started + window).await;
        let attack_time = started.elapsed();

        while let Some(done) = tasks.join_next().await {
            tally.record(done.map_err(|e| ExecutorError::Failed(e.to_string()))?);
        }
        let total_time = started.elapsed();

        tracing::debug!(
            url = %url,
            rate = req.rate,
            duration = req.duration,
            requests = total,
            successes = tally.successes,
            "native attack finished"
        );

        let attack_secs = attack_time.as_secs_f64().max(1e-9);
        let report = AttackReport {
            target_rate: req.rate,
            actual_rate: total as f64 / attack_secs,
            target_duration: req.duration,
            actual_duration: attack_secs,
            requests: total,
            throughput: tally.successes as f64 / total_time.as_secs_f64().max(1e-9),
            success: if total == 0 {
                0.0
            } else {
                tally.successes as f64 / total as f64
            },
            min: if tally.latencies.is_empty() {
                0.0
            } else {
                micros_to_secs(tally.latencies.min())
            },
            mean: micros_to_secs(tally.latencies.mean() as u64),
            p50: tally.percentile_secs(0.50),
            p90: tally.percentile_secs(0.90),
            p95: tally.percentile_secs(0.95),
            p99: tally.percentile_secs(0.99),
            max: micros_to_secs(tally.latencies.max()),
            bytes_in: tally.bytes_in,
            bytes_out,
            status_codes: tally.status_codes,
            errors: tally.errors.into_iter().collect(),
        };

        Ok(report.into_result())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::call::Call;
    use rpcbench_testserver::TestServer;
    use serde_json::json;
    use url::Url;

    fn block_calls(n: u64) -> Vec<Call> {
        (0..n)
            .map(|i| {
                Call::new(
                    "eth_getBlockByNumber",
                    vec![json!(format!("0x{i:x}")), json!(false)],
                )
            })
            .collect()
    }

    #[test]
    fn options_default_and_parse() {
        let defaults = NativeOptions::parse(&AttackOptions::new()).unwrap();
        assert_eq!(defaults.timeout, DEFAULT_TIMEOUT);
        assert_eq!(defaults.max_in_flight, DEFAULT_MAX_IN_FLIGHT);

        let mut opts = AttackOptions::new();
        opts.insert("timeout".to_string(), Some("250ms".to_string()));
        opts.insert("max_in_flight".to_string(), Some("8".to_string()));
        let parsed = NativeOptions::parse(&opts).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(250));
        assert_eq!(parsed.max_in_flight, 8);
    }

    #[test]
    fn unknown_or_valueless_options_are_rejected() {
        let mut opts = AttackOptions::new();
        opts.insert("keepalive".to_string(), Some("false".to_string()));
        assert!(matches!(
            NativeOptions::parse(&opts),
            Err(ExecutorError::InvalidOption { .. })
        ));

        let mut opts = AttackOptions::new();
        opts.insert("timeout".to_string(), None);
        assert!(NativeOptions::parse(&opts).is_err());
    }

    #[tokio::test]
    async fn attack_hits_node_at_requested_volume() {
        let server = TestServer::start().await.unwrap();
        let url = Url::parse(server.rpc_url()).unwrap();
        let calls = block_calls(20);
        let options = AttackOptions::new();

        let result = NativeExecutor::new()
            .execute(AttackRequest {
                url: &url,
                calls: &calls,
                rate: 20,
                duration: 1,
                options: &options,
            })
            .await
            .unwrap();

        assert_eq!(server.stats().get_block_by_number(), 20);
        assert_eq!(result["requests"], 20);
        assert_eq!(result["target_rate"], 20);
        assert_eq!(result["success"], 1.0);
        assert_eq!(result["status_codes"]["200"], 20);
        assert!(result["p99"].as_f64().unwrap() >= result["p50"].as_f64().unwrap());

        server.shutdown().await;
    }

    async fn paced_attack(rate: u64, duration: u64) -> (AttackResult, Duration) {
        let server = TestServer::start().await.unwrap();
        let url = Url::parse(server.rpc_url()).unwrap();
        let calls = block_calls(rate * duration);
        let options = AttackOptions::new();

        let wall = std::time::Instant::now();
        let result = NativeExecutor::new()
            .execute(AttackRequest {
                url: &url,
                calls: &calls,
                rate,
                duration,
                options: &options,
            })
            .await
            .unwrap();
        let wall = wall.elapsed();

        assert_eq!(server.stats().get_block_by_number(), rate * duration);
        server.shutdown().await;
        (result, wall)
    }

    #[tokio::test]
    async fn attack_spans_its_duration_at_its_rate() {
        for (rate, duration) in [(1, 1), (5, 1), (10, 2)] {
            let (result, wall) = paced_attack(rate, duration).await;
            let actual_duration = result["actual_duration"].as_f64().unwrap();
            let actual_rate = result["actual_rate"].as_f64().unwrap();
            let target = duration as f64;

            assert!(
                wall >= Duration::from_secs(duration),
                "rate={rate}: attack returned after {wall:?}"
            );
            assert!(
                actual_duration >= target && actual_duration < target + 0.5,
                "rate={rate}: actual_duration={actual_duration}"
            );
            assert!(
                actual_rate <= rate as f64 && actual_rate > rate as f64 * 0.6,
                "rate={rate}: actual_rate={actual_rate}"
            );
            assert_eq!(result["requests"], rate * duration);
        }
    }

    #[tokio::test]
    async fn http_failures_are_counted_not_raised() {
        let server = TestServer::start().await.unwrap();
        let url = Url::parse(&server.fail_url()).unwrap();
        let calls = block_calls(5);
        let options = AttackOptions::new();

        let result = NativeExecutor::new()
            .execute(AttackRequest {
                url: &url,
                calls: &calls,
                rate: 5,
                duration: 1,
                options: &options,
            })
            .await
            .unwrap();

        assert_eq!(result["success"], 0.0);
        assert_eq!(result["status_codes"]["503"], 5);
        assert_eq!(result["errors"], json!(["http status 503"]));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn json_rpc_errors_count_as_failures() {
        let server = TestServer::start().await.unwrap();
        let url = Url::parse(server.rpc_url()).unwrap();
        let calls = vec![Call::new("eth_unknownMethod", Vec::new())];
        let options = AttackOptions::new();

        let result = NativeExecutor::new()
            .execute(AttackRequest {
                url: &url,
                calls: &calls,
                rate: 4,
                duration: 1,
                options: &options,
            })
            .await
            .unwrap();

        assert_eq!(result["requests"], 4);
        assert_eq!(result["success"], 0.0);
        assert_eq!(result["errors"], json!(["json-rpc error -32601"]));

        server.shutdown().await;
    }
}
