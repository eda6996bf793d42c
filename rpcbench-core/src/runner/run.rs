use std::collections::BTreeMap;
use std::future::Future;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::{Error, Result};
use super::progress::{AttackProgress, ProgressFn, ProgressUpdate};
use crate::executor::{
    AttackExecutor, AttackRequest, AttackResult, ExecutorError, RemoteExecutor, UnsupportedRemote,
};
use crate::load_test::LoadTest;
use crate::node::Node;

/// Per-metric series for one load test, one entry per attack in attack order.
pub type LoadTestOutput = BTreeMap<String, Vec<Value>>;

/// Runs load tests one attack at a time; attacks never overlap.
///
/// The first failure aborts the run and no partial output is returned.
pub struct Runner<E, R = UnsupportedRemote> {
    executor: E,
    remote: R,
    progress: Option<ProgressFn>,
    cancel: CancellationToken,
}

impl<E: AttackExecutor> Runner<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            remote: UnsupportedRemote,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl<E, R> Runner<E, R> {
    /// Executor used for nodes that carry a `remote` descriptor.
    pub fn with_remote<R2: RemoteExecutor>(self, remote: R2) -> Runner<E, R2> {
        Runner {
            executor: self.executor,
            remote,
            progress: self.progress,
            cancel: self.cancel,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Option<ProgressFn>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn emit(&self, update: ProgressUpdate) {
        if let Some(progress) = &self.progress {
            progress(update);
        }
    }

    async fn guarded<T>(&self, fut: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            out = fut => Ok(out),
        }
    }
}

fn attack_error(attack: usize, err: ExecutorError) -> Error {
    match err {
        ExecutorError::Unsupported(msg) => Error::Unsupported(msg),
        source => Error::Execution { attack, source },
    }
}

impl<E: AttackExecutor, R: RemoteExecutor> Runner<E, R> {
    /// Run every attack of `test` against `node`, in order, and merge the results.
    pub async fn run_load_test(&self, node: &Node, test: &LoadTest) -> Result<LoadTestOutput> {
        self.run_labeled(&node.name, node, test).await
    }

    pub(crate) async fn run_labeled(
        &self,
        run: &str,
        node: &Node,
        test: &LoadTest,
    ) -> Result<LoadTestOutput> {
        if test.is_empty() {
            return Err(Error::config("a load test needs at least one attack"));
        }

        tracing::info!(
            run,
            node = %node.name,
            url = %node.url,
            remote = node.remote.as_ref().map(|r| r.as_str()),
            attacks = test.len(),
            "starting load test"
        );

        let attacks = test.len();
        let mut results: Vec<AttackResult> = Vec::with_capacity(attacks);

        for (idx, spec) in test.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(run, attack = idx + 1, "load test cancelled");
                return Err(Error::Cancelled);
            }

            let position = AttackProgress {
                run: run.to_string(),
                attack: idx + 1,
                attacks,
                rate: spec.rate(),
                duration: spec.duration(),
            };
            self.emit(ProgressUpdate::AttackStarted(position.clone()));

            let req = AttackRequest::new(&node.url, spec);
            let started = Instant::now();
            let outcome = match &node.remote {
                None => self.guarded(self.executor.execute(req)).await,
                Some(remote) => self.guarded(self.remote.execute(remote, req)).await,
            };
            let result = match outcome {
                Ok(res) => res.map_err(|e| attack_error(idx + 1, e))?,
                Err(err) => {
                    tracing::warn!(run, attack = idx + 1, "load test cancelled mid-attack");
                    return Err(err);
                }
            };
            let elapsed = started.elapsed();

            tracing::debug!(
                run,
                attack = idx + 1,
                rate = spec.rate(),
                duration = spec.duration(),
                elapsed_ms = elapsed.as_millis() as u64,
                "attack finished"
            );
            self.emit(ProgressUpdate::AttackFinished {
                attack: position,
                elapsed,
            });
            results.push(result);
        }

        reduce_results(results)
    }
}

/// Fold per-attack results into per-metric series.
///
/// Every result must expose exactly the key set of the first one.
pub fn reduce_results(results: Vec<AttackResult>) -> Result<LoadTestOutput> {
    let Some(first) = results.first() else {
        return Err(Error::config("no attack results to merge"));
    };

    for (idx, result) in results.iter().enumerate().skip(1) {
        if !result.keys().eq(first.keys()) {
            return Err(Error::SchemaMismatch {
                attack: idx + 1,
                expected: first.keys().cloned().collect(),
                found: result.keys().cloned().collect(),
            });
        }
    }

    let n = results.len();
    let mut out: LoadTestOutput = first
        .keys()
        .map(|k| (k.clone(), Vec::with_capacity(n)))
        .collect();

    for result in results {
        for (key, value) in result {
            if let Some(series) = out.get_mut(&key) {
                series.push(value);
            }
        }
    }

    Ok(out)
}
