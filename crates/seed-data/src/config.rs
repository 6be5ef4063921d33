//! Seeding configuration from the environment.

use std::env;

use records::ConfigError;

use crate::db::DEFAULT_BATCH_SIZE;
use crate::sources::DEFAULT_ENDPOINT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    /// Base URL of the sample API.
    pub source_url: String,
    /// Rows per insert request.
    pub batch_size: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SeedConfig {
    /// Reads `SEED_SOURCE_URL` and `SEED_BATCH_SIZE`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let source_url = lookup("SEED_SOURCE_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.source_url);

        let batch_size = match lookup("SEED_BATCH_SIZE") {
            None => defaults.batch_size,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SEED_BATCH_SIZE",
                        reason: format!("expected a positive integer, got {raw:?}"),
                    });
                }
            },
        };

        Ok(Self {
            source_url,
            batch_size,
        })
    }
}
