mod coordinator;
mod error;
mod progress;
mod run;

pub use coordinator::{
    NodeSelection, PlannedRun, RUN_KEY_SEPARATOR, ResultMapping, RunMatrix, TestSelection,
};
pub use error::{Error, ErrorKind, Result};
pub use progress::{AttackProgress, ProgressFn, ProgressUpdate};
pub use run::{LoadTestOutput, Runner, reduce_results};
