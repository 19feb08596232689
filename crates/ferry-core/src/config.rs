//! Configuration system for ferry.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FERRY_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ferry/config.toml
//!   3. ~/.config/ferry/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    pub stream: StreamConfig,
}

/// How a stream moves bytes from the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Direct memory when the host offers it, chunked otherwise.
    #[default]
    Auto,
    /// Always fetch base64 chunks over the channel.
    Chunked,
    /// Require direct memory; opening fails without it.
    Direct,
}

impl std::str::FromStr for TransferMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(TransferMode::Auto),
            "chunked" => Ok(TransferMode::Chunked),
            "direct" => Ok(TransferMode::Direct),
            other => Err(ConfigError::Invalid(format!(
                "unknown transfer mode {other:?} (expected auto, chunked or direct)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Chunk size in bytes. One remote call carries at most this much.
    pub maximum_message_size: usize,
    /// Prefetch budget in bytes. Divided by the message size to get the
    /// number of chunks kept in flight.
    pub maximum_buffer_size: usize,
    pub transfer_mode: TransferMode,
    /// Largest entry `read_all` will load into memory.
    pub read_all_limit: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_MAXIMUM_MESSAGE_SIZE: usize = 20 * 1024;
pub const DEFAULT_MAXIMUM_BUFFER_SIZE: usize = 1024 * 1024;
pub const DEFAULT_READ_ALL_LIMIT: u64 = 1024 * 1024;

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            maximum_message_size: DEFAULT_MAXIMUM_MESSAGE_SIZE,
            maximum_buffer_size: DEFAULT_MAXIMUM_BUFFER_SIZE,
            transfer_mode: TransferMode::Auto,
            read_all_limit: DEFAULT_READ_ALL_LIMIT,
        }
    }
}

impl StreamConfig {
    /// Chunks kept in flight: `max(1, buffer / message)`.
    pub fn window_capacity(&self) -> usize {
        (self.maximum_buffer_size / self.maximum_message_size.max(1)).max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maximum_message_size == 0 {
            return Err(ConfigError::Invalid(
                "stream.maximum_message_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ferry")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FerryConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            FerryConfig::default()
        };
        config.apply_env_overrides()?;
        config.stream.validate()?;
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FERRY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = FerryConfig::default().to_toml()?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Apply FERRY_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("FERRY_STREAM__MAXIMUM_MESSAGE_SIZE") {
            if let Ok(n) = v.parse() {
                self.stream.maximum_message_size = n;
            }
        }
        if let Ok(v) = std::env::var("FERRY_STREAM__MAXIMUM_BUFFER_SIZE") {
            if let Ok(n) = v.parse() {
                self.stream.maximum_buffer_size = n;
            }
        }
        if let Ok(v) = std::env::var("FERRY_STREAM__READ_ALL_LIMIT") {
            if let Ok(n) = v.parse() {
                self.stream.read_all_limit = n;
            }
        }
        if let Ok(v) = std::env::var("FERRY_STREAM__TRANSFER_MODE") {
            self.stream.transfer_mode = v.parse()?;
        }
        Ok(())
    }
}
