//! Backend selection from the environment.

use std::env;
use std::sync::Arc;

use thiserror::Error;

use crate::backend::Backend;
use crate::memory::MemoryBackend;
use crate::rest::RestBackend;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Connection details for the hosted PostgREST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project URL, without the `/rest/v1` suffix.
    pub url: String,
    /// Sent both as `apikey` and as the bearer token.
    pub api_key: String,
}

/// Where rows live for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    /// In-process tables; nothing survives the process.
    Memory,
    Rest(BackendConfig),
}

impl BackendTarget {
    /// Reads `BACKEND_URL` and `BACKEND_API_KEY`.
    ///
    /// `BACKEND_URL=memory` selects the in-process backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("BACKEND_URL").ok_or(ConfigError::Missing("BACKEND_URL"))?;
        if url.eq_ignore_ascii_case("memory") {
            return Ok(BackendTarget::Memory);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "BACKEND_URL",
                reason: format!("expected an http(s) URL, got {url:?}"),
            });
        }

        let api_key = lookup("BACKEND_API_KEY")
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("BACKEND_API_KEY"))?;

        Ok(BackendTarget::Rest(BackendConfig {
            url: url.trim_end_matches('/').to_string(),
            api_key,
        }))
    }

    pub fn connect(&self) -> Arc<dyn Backend> {
        match self {
            BackendTarget::Memory => Arc::new(MemoryBackend::new()),
            BackendTarget::Rest(config) => Arc::new(RestBackend::new(config)),
        }
    }
}
