use std::time::Duration;

/// Position of one attack inside a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackProgress {
    /// Run label (node name, test name, or `node__test`).
    pub run: String,
    /// 1-based attack index.
    pub attack: usize,
    pub attacks: usize,
    pub rate: u64,
    /// Seconds.
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    AttackStarted(AttackProgress),
    AttackFinished {
        attack: AttackProgress,
        elapsed: Duration,
    },
    RunFinished {
        run: String,
        /// 1-based run index.
        index: usize,
        runs: usize,
        elapsed: Duration,
    },
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
