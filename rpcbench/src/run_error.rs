use rpcbench_core::ErrorKind;

use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    AttackFailed(anyhow::Error),
    RuntimeError(anyhow::Error),
    Interrupted(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::AttackFailed(_) => ExitCode::AttackFailed,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
            Self::Interrupted(_) => ExitCode::Interrupted,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e)
            | Self::AttackFailed(e)
            | Self::RuntimeError(e)
            | Self::Interrupted(e) => e,
        }
    }
}

impl From<rpcbench_core::Error> for RunError {
    fn from(err: rpcbench_core::Error) -> Self {
        let kind = err.kind();
        let err = anyhow::Error::new(err);
        match kind {
            ErrorKind::Config | ErrorKind::Unsupported => Self::InvalidInput(err),
            ErrorKind::Execution => Self::AttackFailed(err),
            ErrorKind::SchemaMismatch => Self::RuntimeError(err),
            ErrorKind::Cancelled => Self::Interrupted(err),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                rpcbench_core::Error::Config("bad".to_string()),
                ExitCode::InvalidInput,
            ),
            (
                rpcbench_core::Error::Unsupported("remote".to_string()),
                ExitCode::InvalidInput,
            ),
            (
                rpcbench_core::Error::Execution {
                    attack: 1,
                    source: rpcbench_core::ExecutorError::Failed("boom".to_string()),
                },
                ExitCode::AttackFailed,
            ),
            (
                rpcbench_core::Error::SchemaMismatch {
                    attack: 2,
                    expected: vec!["a".to_string()],
                    found: vec!["b".to_string()],
                },
                ExitCode::RuntimeError,
            ),
            (rpcbench_core::Error::Cancelled, ExitCode::Interrupted),
        ];

        for (err, code) in cases {
            assert_eq!(RunError::from(err).exit_code(), code);
        }
    }
}
