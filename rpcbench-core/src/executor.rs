//! The boundary between the orchestration engine and whatever actually fires requests.
//!
//! The runner only relies on an executor returning a metric map whose keys stay the same from
//! one attack to the next. [`NativeExecutor`] and [`VegetaExecutor`] both normalise into
//! [`AttackReport`] for that reason.

use std::collections::BTreeMap;
use std::future::Future;

use serde_json::Value;
use url::Url;

use crate::call::Call;
use crate::load_test::{AttackOptions, AttackSpec};
use crate::node::Remote;

mod native;
mod report;
mod vegeta;

pub use native::NativeExecutor;
pub use report::AttackReport;
pub use vegeta::VegetaExecutor;

/// Metrics produced by one attack, keyed by metric name.
pub type AttackResult = BTreeMap<String, Value>;

/// Everything an executor needs to run one attack.
#[derive(Debug, Clone, Copy)]
pub struct AttackRequest<'a> {
    pub url: &'a Url,
    pub calls: &'a [Call],
    pub rate: u64,
    pub duration: u64,
    pub options: &'a AttackOptions,
}

impl<'a> AttackRequest<'a> {
    pub fn new(url: &'a Url, spec: &'a AttackSpec) -> Self {
        Self {
            url,
            calls: spec.calls(),
            rate: spec.rate(),
            duration: spec.duration(),
            options: spec.options(),
        }
    }

    /// Requests the attack should fire: one per call slot at `rate` over `duration`.
    pub fn total_requests(&self) -> u64 {
        self.rate.saturating_mul(self.duration)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to launch `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{tool}` exited with {status}: {stderr}")]
    ExitStatus {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid attack option `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },

    /// The execution path exists as an extension point but has no implementation.
    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

/// Runs a single attack and reports its metrics.
pub trait AttackExecutor: Send + Sync {
    fn execute(
        &self,
        req: AttackRequest<'_>,
    ) -> impl Future<Output = Result<AttackResult, ExecutorError>> + Send;
}

/// Runs a single attack from a separate execution context identified by a [`Remote`].
pub trait RemoteExecutor: Send + Sync {
    fn execute(
        &self,
        remote: &Remote,
        req: AttackRequest<'_>,
    ) -> impl Future<Output = Result<AttackResult, ExecutorError>> + Send;
}

/// Default remote executor: every call fails with [`ExecutorError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRemote;

impl RemoteExecutor for UnsupportedRemote {
    async fn execute(
        &self,
        remote: &Remote,
        _req: AttackRequest<'_>,
    ) -> Result<AttackResult, ExecutorError> {
        Err(ExecutorError::Unsupported(format!(
            "remote execution (remote `{remote}`) is not implemented"
        )))
    }
}
