use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::Stdio;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::process::Command;

use super::{AttackExecutor, AttackReport, AttackRequest, AttackResult, ExecutorError};
use crate::load_test::AttackOptions;

/// Flags the executor sets itself; options may not override them.
const RESERVED_FLAGS: &[&str] = &["format", "targets", "rate", "duration", "output"];

/// Runs each attack through an external [vegeta](https://github.com/tsenart/vegeta) binary.
///
/// Attack options become extra `vegeta attack` flags: `Some(v)` renders as `-key=v`, `None` as
/// `-key`.
#[derive(Debug, Clone)]
pub struct VegetaExecutor {
    bin: PathBuf,
}

impl Default for VegetaExecutor {
    fn default() -> Self {
        Self::new("vegeta")
    }
}

impl VegetaExecutor {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    fn tool(&self) -> String {
        self.bin.display().to_string()
    }

    async fn run(&self, mut cmd: Command) -> Result<Vec<u8>, ExecutorError> {
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        let out = cmd.output().await.map_err(|source| ExecutorError::Spawn {
            tool: self.tool(),
            source,
        })?;

        if !out.status.success() {
            return Err(ExecutorError::ExitStatus {
                tool: self.tool(),
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        Ok(out.stdout)
    }
}

#[derive(Debug, Serialize)]
struct VegetaTarget<'a> {
    method: &'static str,
    url: &'a str,
    body: String,
    header: BTreeMap<&'static str, [&'static str; 1]>,
}

/// Targets in vegeta's JSON format, one per line, in call order.
fn render_targets(req: &AttackRequest<'_>) -> Result<Vec<u8>, ExecutorError> {
    let header = BTreeMap::from([("Content-Type", ["application/json"])]);
    let mut out = Vec::new();

    for (i, call) in req.calls.iter().enumerate() {
        let target = VegetaTarget {
            method: "POST",
            url: req.url.as_str(),
            body: base64::engine::general_purpose::STANDARD.encode(call.request_body(i as u64 + 1)),
            header: header.clone(),
        };
        serde_json::to_writer(&mut out, &target).map_err(|source| ExecutorError::Parse {
            what: "vegeta target",
            source,
        })?;
        out.push(b'\n');
    }

    Ok(out)
}

fn option_flags(options: &AttackOptions) -> Result<Vec<String>, ExecutorError> {
    options
        .iter()
        .map(|(name, value)| {
            let key = name.trim_start_matches('-');
            if key.is_empty() || RESERVED_FLAGS.contains(&key) {
                return Err(ExecutorError::InvalidOption {
                    name: name.clone(),
                    reason: "reserved or empty vegeta flag".to_string(),
                });
            }
            Ok(match value {
                Some(v) => format!("-{key}={v}"),
                None => format!("-{key}"),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct VegetaLatencies {
    mean: u64,
    #[serde(rename = "50th")]
    p50: u64,
    #[serde(rename = "90th")]
    p90: u64,
    #[serde(rename = "95th")]
    p95: u64,
    #[serde(rename = "99th")]
    p99: u64,
    max: u64,
    min: u64,
}

#[derive(Debug, Deserialize)]
struct VegetaBytes {
    total: u64,
}

/// `vegeta report -type=json` output. Durations are nanoseconds.
#[derive(Debug, Deserialize)]
struct VegetaReport {
    latencies: VegetaLatencies,
    bytes_in: VegetaBytes,
    bytes_out: VegetaBytes,
    duration: u64,
    requests: u64,
    rate: f64,
    throughput: f64,
    success: f64,
    #[serde(default)]
    status_codes: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    errors: Option<Vec<String>>,
}

fn nanos_to_secs(v: u64) -> f64 {
    v as f64 / 1_000_000_000.0
}

impl VegetaReport {
    fn into_report(self, req: &AttackRequest<'_>) -> AttackReport {
        AttackReport {
            target_rate: req.rate,
            actual_rate: self.rate,
            target_duration: req.duration,
            actual_duration: nanos_to_secs(self.duration),
            requests: self.requests,
            throughput: self.throughput,
            success: self.success,
            min: nanos_to_secs(self.latencies.min),
            mean: nanos_to_secs(self.latencies.mean),
            p50: nanos_to_secs(self.latencies.p50),
            p90: nanos_to_secs(self.latencies.p90),
            p95: nanos_to_secs(self.latencies.p95),
            p99: nanos_to_secs(self.latencies.p99),
            max: nanos_to_secs(self.latencies.max),
            bytes_in: self.bytes_in.total,
            bytes_out: self.bytes_out.total,
            status_codes: self.status_codes.unwrap_or_default(),
            errors: self.errors.unwrap_or_default(),
        }
    }
}

fn parse_report(raw: &[u8], req: &AttackRequest<'_>) -> Result<AttackReport, ExecutorError> {
    let report: VegetaReport =
        serde_json::from_slice(raw).map_err(|source| ExecutorError::Parse {
            what: "vegeta report",
            source,
        })?;
    Ok(report.into_report(req))
}

/// Temp files for one attack: the targets (already written) and an empty results file.
async fn stage_files(targets: Vec<u8>) -> Result<(NamedTempFile, NamedTempFile), ExecutorError> {
    tokio::task::spawn_blocking(move || -> std::io::Result<_> {
        let mut file = NamedTempFile::new()?;
        file.write_all(&targets)?;
        file.flush()?;
        Ok((file, NamedTempFile::new()?))
    })
    .await
    .map_err(|e| ExecutorError::Failed(format!("staging vegeta files: {e}")))?
    .map_err(ExecutorError::from)
}

impl AttackExecutor for VegetaExecutor {
    async fn execute(&self, req: AttackRequest<'_>) -> Result<AttackResult, ExecutorError> {
        let flags = option_flags(req.options)?;

        let (targets, results) = stage_files(render_targets(&req)?).await?;

        let mut attack = Command::new(&self.bin);
        attack
            .arg("attack")
            .arg("-format=json")
            .arg(format!("-targets={}", targets.path().display()))
            .arg(format!("-rate={}/1s", req.rate))
            .arg(format!("-duration={}s", req.duration))
            .arg(format!("-output={}", results.path().display()))
            .args(&flags);

        tracing::debug!(
            bin = %self.bin.display(),
            rate = req.rate,
            duration = req.duration,
            flags = ?flags,
            "starting vegeta attack"
        );
        self.run(attack).await?;

        let mut report = Command::new(&self.bin);
        report.arg("report").arg("-type=json").arg(results.path());
        let raw = self.run(report).await?;
        let report = parse_report(&raw, &req)?;

        let _ = tokio::task::spawn_blocking(move || drop((targets, results)));
        Ok(report.into_result())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::call::Call;
    use serde_json::{Value, json};
    use url::Url;

    const SAMPLE_REPORT: &str = r#"{
        "latencies": {"total": 3000000000, "mean": 1500000, "50th": 1200000, "90th": 2500000,
                      "95th": 3000000, "99th": 4000000, "max": 5000000, "min": 800000},
        "bytes_in": {"total": 2048, "mean": 102.4},
        "bytes_out": {"total": 1024, "mean": 51.2},
        "earliest": "2024-01-01T00:00:00Z", "latest": "2024-01-01T00:00:02Z",
        "end": "2024-01-01T00:00:02.001Z",
        "duration": 1999000000, "wait": 1000000,
        "requests": 20, "rate": 10.005, "throughput": 9.99, "success": 1,
        "status_codes": {"200": 20}, "errors": null
    }"#;

    fn request_parts() -> (Url, Vec<Call>, AttackOptions) {
        let url = Url::parse("http://127.0.0.1:8545/").unwrap();
        let calls = vec![
            Call::new("eth_getBlockByNumber", vec![json!("0x1"), json!(false)]),
            Call::new("eth_getBlockByNumber", vec![json!("0x2"), json!(false)]),
        ];
        (url, calls, AttackOptions::new())
    }

    #[tokio::test]
    async fn staged_targets_hold_the_rendered_body() {
        let (targets, results) = stage_files(b"{\"method\":\"POST\"}\n".to_vec())
            .await
            .unwrap();

        let written = tokio::fs::read(targets.path()).await.unwrap();
        assert_eq!(written, b"{\"method\":\"POST\"}\n");
        assert_eq!(tokio::fs::metadata(results.path()).await.unwrap().len(), 0);
        assert_ne!(targets.path(), results.path());
    }

    #[test]
    fn report_is_normalised_to_seconds() {
        let (url, calls, options) = request_parts();
        let req = AttackRequest {
            url: &url,
            calls: &calls,
            rate: 10,
            duration: 2,
            options: &options,
        };

        let report = parse_report(SAMPLE_REPORT.as_bytes(), &req).unwrap();
        assert_eq!(report.target_rate, 10);
        assert_eq!(report.target_duration, 2);
        assert_eq!(report.requests, 20);
        assert!((report.p50 - 0.0012).abs() < 1e-12);
        assert!((report.actual_duration - 1.999).abs() < 1e-12);
        assert_eq!(report.bytes_in, 2048);
        assert_eq!(report.status_codes.get("200"), Some(&20));
        assert!(report.errors.is_empty());
    }

    #[test]
    fn targets_are_json_lines_with_base64_bodies() {
        let (url, calls, options) = request_parts();
        let req = AttackRequest {
            url: &url,
            calls: &calls,
            rate: 1,
            duration: 2,
            options: &options,
        };

        let raw = render_targets(&req).unwrap();
        let lines: Vec<Value> = String::from_utf8(raw)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["method"], "POST");
        assert_eq!(lines[0]["header"]["Content-Type"], json!(["application/json"]));

        let body = base64::engine::general_purpose::STANDARD
            .decode(lines[1]["body"].as_str().unwrap())
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["params"][0], "0x2");
        assert_eq!(body["id"], 2);
    }

    #[test]
    fn options_render_as_flags() {
        let mut options = AttackOptions::new();
        options.insert("timeout".to_string(), Some("5s".to_string()));
        options.insert("-insecure".to_string(), None);
        assert_eq!(
            option_flags(&options).unwrap(),
            vec!["-insecure".to_string(), "-timeout=5s".to_string()]
        );

        let mut reserved = AttackOptions::new();
        reserved.insert("rate".to_string(), Some("5".to_string()));
        assert!(matches!(
            option_flags(&reserved),
            Err(ExecutorError::InvalidOption { .. })
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let (url, calls, options) = request_parts();
        let req = AttackRequest {
            url: &url,
            calls: &calls,
            rate: 1,
            duration: 1,
            options: &options,
        };

        let err = VegetaExecutor::new("/nonexistent/rpcbench/vegeta")
            .execute(req)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { .. }), "got {err:?}");
    }
}
