#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// An attack could not be executed (executor failed, external tool crashed, bad option).
    AttackFailed = 20,

    /// Invalid CLI/plan/config (bad flags, malformed plan, unsupported remote execution, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, executors disagreeing on metric names).
    RuntimeError = 40,

    /// Stopped by Ctrl-C.
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
