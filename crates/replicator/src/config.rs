//! Syncer configuration.
//!
//! Loaded from TOML; every field but `publications` has a default.
//!
//! ```toml
//! replica_id = "replica-1"
//! publications = ["ripple_data", "ripple_meta"]
//! initial_backoff_ms = 100
//! max_backoff_ms = 10000
//! ```

use crate::error::{ReplicatorError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;
pub const DEFAULT_PROTOCOL_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncerConfig {
    /// Publications to subscribe to.
    pub publications: Vec<String>,
    /// Identifies this replica in logs and slot names.
    #[serde(default = "default_replica_id")]
    pub replica_id: String,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// pgoutput protocol version.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
}

fn default_replica_id() -> String {
    "ripple".to_string()
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

fn default_protocol_version() -> u32 {
    DEFAULT_PROTOCOL_VERSION
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            publications: Vec::new(),
            replica_id: default_replica_id(),
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
        }
    }
}

impl SyncerConfig {
    /// A default config subscribed to `publications`.
    pub fn with_publications<S: AsRef<str>>(publications: &[S]) -> Self {
        Self {
            publications: publications.iter().map(|p| p.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SyncerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.publications.is_empty() {
            return Err(ReplicatorError::InvalidConfig(
                "at least one publication is required".into(),
            ));
        }
        if self.initial_backoff_ms == 0 {
            return Err(ReplicatorError::InvalidConfig(
                "initial_backoff_ms must be positive".into(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ReplicatorError::InvalidConfig(format!(
                "max_backoff_ms ({}) is smaller than initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }
        if self.protocol_version != DEFAULT_PROTOCOL_VERSION {
            return Err(ReplicatorError::InvalidConfig(format!(
                "unsupported protocol_version {}",
                self.protocol_version
            )));
        }
        Ok(())
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
