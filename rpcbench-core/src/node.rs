use std::fmt;

use serde::Serialize;
use url::Url;

use crate::runner::{Error, Result};

/// Opaque handle to a separate execution context that should fire attacks on a node's behalf.
///
/// The runner hands it to a [`crate::RemoteExecutor`] unchanged; no transport is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Remote(String);

impl Remote {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An RPC endpoint under test. Built through [`Node::new`] so the url is always http(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    pub url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<Remote>,
}

impl Node {
    /// Parse and validate `url` (http/https only).
    pub fn new(name: impl Into<String>, url: &str) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| Error::config(format!("invalid node url `{url}`: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::config(format!(
                "node url must be http:// or https:// (got `{url}`)"
            )));
        }

        let name = name.into();
        if name.is_empty() {
            return Err(Error::config("node name must not be empty"));
        }

        Ok(Self {
            name,
            url: parsed,
            remote: None,
        })
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Remote) -> Self {
        self.remote = Some(remote);
        self
    }
}
