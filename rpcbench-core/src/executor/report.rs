use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::AttackResult;

/// Normalised outcome of one attack. Latencies are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttackReport {
    pub target_rate: u64,
    pub actual_rate: f64,
    pub target_duration: u64,
    pub actual_duration: f64,
    pub requests: u64,
    pub throughput: f64,
    /// Fraction of requests that succeeded (0..=1).
    pub success: f64,
    pub min: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub status_codes: BTreeMap<String, u64>,
    pub errors: Vec<String>,
}

impl AttackReport {
    pub fn into_result(self) -> AttackResult {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => AttackResult::new(),
        }
    }
}
