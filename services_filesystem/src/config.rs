//! Engine configuration
//!
//! Configuration is plain data with serde defaults, so a partial JSON
//! document only overrides the fields it names.

use core_types::Identity;
use hal::{DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use services_storage::PermissionPolicy;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Largest disk the engine will back with memory, in bytes
pub const MAX_DISK_BYTES: usize = 1 << 30;

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON for [`EngineConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The values are well-formed but unusable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one filesystem engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes per block
    pub block_size: usize,
    /// Number of blocks on the disk
    pub block_count: usize,
    /// Whether uid 0 passes every permission check
    pub superuser_bypass: bool,
    /// uid of the session at startup; also owns the root directory
    pub initial_uid: u32,
    /// gid of the session at startup; also the root directory's group
    pub initial_gid: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            superuser_bypass: false,
            initial_uid: 1,
            initial_gid: 1,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serializes the configuration as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects geometries that hold no content or exceed [`MAX_DISK_BYTES`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be non-zero".to_string()));
        }
        if self.block_count == 0 {
            return Err(ConfigError::Invalid("block_count must be non-zero".to_string()));
        }
        match self.block_count.checked_mul(self.block_size) {
            Some(bytes) if bytes <= MAX_DISK_BYTES => Ok(()),
            _ => Err(ConfigError::Invalid(format!(
                "disk of {} x {} bytes exceeds {} bytes",
                self.block_count, self.block_size, MAX_DISK_BYTES
            ))),
        }
    }

    pub fn initial_identity(&self) -> Identity {
        Identity::new(self.initial_uid, self.initial_gid)
    }

    pub fn policy(&self) -> PermissionPolicy {
        PermissionPolicy::new(self.superuser_bypass)
    }
}
