use crate::executor::ExecutorError;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`], stable enough to map onto process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Config,
    SchemaMismatch,
    Execution,
    Unsupported,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(
        "attack {attack} reported metrics {found:?}, expected the same metrics as attack 1: {expected:?}"
    )]
    SchemaMismatch {
        /// 1-based index of the offending attack.
        attack: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("attack {attack} failed: {source}")]
    Execution {
        /// 1-based index of the failed attack.
        attack: usize,
        #[source]
        source: ExecutorError,
    },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}
