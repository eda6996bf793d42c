#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::call::Call;
use crate::executor::{AttackExecutor, AttackRequest, AttackResult, ExecutorError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeenAttack {
    pub url: String,
    pub rate: u64,
    pub duration: u64,
    pub calls: usize,
}

#[derive(Debug, Clone, Default)]
enum Behaviour {
    /// Report `rate` and `requests` derived from the request.
    #[default]
    Echo,
    /// Fail the n-th (1-based) attack.
    FailAt(usize),
    Scripted(Arc<Mutex<VecDeque<AttackResult>>>),
    Hang,
}

/// Records every attack it is asked to run.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockExecutor {
    seen: Arc<Mutex<Vec<SeenAttack>>>,
    behaviour: Behaviour,
}

impl MockExecutor {
    pub fn failing_at(attack: usize) -> Self {
        Self {
            behaviour: Behaviour::FailAt(attack),
            ..Self::default()
        }
    }

    pub fn with_results(results: Vec<AttackResult>) -> Self {
        Self {
            behaviour: Behaviour::Scripted(Arc::new(Mutex::new(results.into()))),
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            behaviour: Behaviour::Hang,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<SeenAttack> {
        self.seen.lock().unwrap().clone()
    }
}

impl AttackExecutor for MockExecutor {
    async fn execute(&self, req: AttackRequest<'_>) -> Result<AttackResult, ExecutorError> {
        let attack = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(SeenAttack {
                url: req.url.to_string(),
                rate: req.rate,
                duration: req.duration,
                calls: req.calls.len(),
            });
            seen.len()
        };

        match &self.behaviour {
            Behaviour::Echo => Ok(metrics(&[
                ("rate", json!(req.rate)),
                ("requests", json!(req.total_requests())),
            ])),
            Behaviour::FailAt(n) if *n == attack => {
                Err(ExecutorError::Failed(format!("attack {attack} exploded")))
            }
            Behaviour::FailAt(_) => Ok(metrics(&[("rate", json!(req.rate))])),
            Behaviour::Scripted(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ExecutorError::Failed("no scripted result left".to_string())),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

/// `n` distinct `eth_getBlockByNumber` calls for blocks `0x1..`.
pub(crate) fn block_calls(n: usize) -> Vec<Call> {
    (1..=n)
        .map(|i| {
            Call::new(
                "eth_getBlockByNumber",
                vec![json!(format!("0x{i:x}")), json!(false)],
            )
        })
        .collect()
}

pub(crate) fn metrics(pairs: &[(&str, Value)]) -> AttackResult {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
