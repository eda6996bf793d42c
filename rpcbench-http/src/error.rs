use std::time::Duration;

use hyper_util::client::legacy::Error as ClientError;

pub type Result<T> = std::result::Result<T, Error>;

/// Label for a transport failure, as it appears in an attack report's `errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HttpTransportErrorKind {
    InvalidUrl,
    UnsupportedScheme,
    RequestBuild,
    Connect,
    Request,
    Timeout,
    BodyRead,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid node url: {0}")]
    InvalidUrl(String),

    #[error("node url must be http:// or https://: {0}")]
    UnsupportedScheme(String),

    #[error("failed to build JSON-RPC request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("failed to connect to node: {0}")]
    Connect(#[source] ClientError),

    #[error("JSON-RPC request failed: {0}")]
    Request(#[source] ClientError),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        if err.is_connect() {
            Self::Connect(err)
        } else {
            Self::Request(err)
        }
    }
}

impl Error {
    #[must_use]
    pub fn transport_error_kind(&self) -> HttpTransportErrorKind {
        match self {
            Self::InvalidUrl(_) => HttpTransportErrorKind::InvalidUrl,
            Self::UnsupportedScheme(_) => HttpTransportErrorKind::UnsupportedScheme,
            Self::RequestBuild(_) => HttpTransportErrorKind::RequestBuild,
            Self::Connect(_) => HttpTransportErrorKind::Connect,
            Self::Request(_) => HttpTransportErrorKind::Request,
            Self::Timeout(_) => HttpTransportErrorKind::Timeout,
            Self::BodyRead(_) => HttpTransportErrorKind::BodyRead,
        }
    }
}
