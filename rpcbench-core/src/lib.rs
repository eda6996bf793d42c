#![forbid(unsafe_code)]

pub mod call;
pub mod executor;
pub mod generators;
pub mod node;
pub mod runner;

#[cfg(test)]
pub(crate) mod test_support;

pub use call::Call;
pub use executor::{
    AttackExecutor, AttackReport, AttackRequest, AttackResult, ExecutorError, NativeExecutor,
    RemoteExecutor, UnsupportedRemote, VegetaExecutor,
};
pub use generators::{
    BlockByHashGenerator, BlockByNumberGenerator, CallGenerator, estimate_call_count,
    generate_load_test,
};
pub use load_test::{AttackOptions, AttackSpec, LoadTest, construct_load_test, resolve_durations};
pub use node::{Node, Remote};
pub use runner::{
    AttackProgress, Error, ErrorKind, LoadTestOutput, NodeSelection, ProgressFn, ProgressUpdate,
    Result, ResultMapping, RunMatrix, Runner, TestSelection,
};
