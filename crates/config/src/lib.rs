//! # Config - RZIP runtime settings
//!
//! Settings shared by the `rzip` tool and anything else that writes
//! containers. Everything is controlled through environment variables:
//!
//! ```text
//! RZIP_CHUNK_KB   Uncompressed chunk size in KiB   (default: 1024 = 1 MiB)
//! RZIP_LEVEL      zlib level 0-9                    (default: 6)
//! RZIP_SYNC       fsync after every write call     (default: "false")
//! RZIP_STRICT     fail on truncated/corrupt input  (default: "false")
//! ```
//!
//! Missing or unparsable values fall back to the defaults; out-of-range
//! values are caught by [`RzipConfig::validate`].

use rzip::{WriterOptions, DEFAULT_CHUNK_SIZE, DEFAULT_LEVEL, MAX_CHUNK_SIZE};
use thiserror::Error;

/// Errors reported by [`RzipConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk size must be between 1 byte and {max} bytes, got {got}")]
    ChunkSize { got: u64, max: u32 },

    #[error("compression level must be 0-9, got {0}")]
    Level(u32),
}

/// Container settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RzipConfig {
    /// Uncompressed bytes per chunk.
    pub chunk_size: u64,
    /// zlib compression level.
    pub level: u32,
    /// fsync after every write call.
    pub sync: bool,
    /// Treat truncation and corruption as errors instead of short reads.
    pub strict: bool,
}

impl Default for RzipConfig {
    fn default() -> Self {
        Self {
            chunk_size: u64::from(DEFAULT_CHUNK_SIZE),
            level: DEFAULT_LEVEL,
            sync: false,
            strict: false,
        }
    }
}

impl RzipConfig {
    /// Builds a config from `RZIP_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup (used by tests so they
    /// do not race on the process environment).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, default: String| lookup(key).unwrap_or(default);

        let chunk_kb: u64 = get("RZIP_CHUNK_KB", (defaults.chunk_size / 1024).to_string())
            .trim()
            .parse()
            .unwrap_or(defaults.chunk_size / 1024);
        let level: u32 = get("RZIP_LEVEL", defaults.level.to_string())
            .trim()
            .parse()
            .unwrap_or(defaults.level);
        let sync: bool = get("RZIP_SYNC", defaults.sync.to_string())
            .trim()
            .parse()
            .unwrap_or(defaults.sync);
        let strict: bool = get("RZIP_STRICT", defaults.strict.to_string())
            .trim()
            .parse()
            .unwrap_or(defaults.strict);

        Self {
            chunk_size: chunk_kb.saturating_mul(1024),
            level,
            sync,
            strict,
        }
    }

    /// Checks that the values can be written into a container header.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > u64::from(MAX_CHUNK_SIZE) {
            return Err(ConfigError::ChunkSize {
                got: self.chunk_size,
                max: MAX_CHUNK_SIZE,
            });
        }
        if self.level > 9 {
            return Err(ConfigError::Level(self.level));
        }
        Ok(())
    }

    /// Writer options for these settings.
    ///
    /// # Errors
    ///
    /// Anything [`validate`](Self::validate) rejects.
    pub fn writer_options(&self) -> Result<WriterOptions, ConfigError> {
        self.validate()?;
        Ok(WriterOptions {
            chunk_size: self.chunk_size as u32,
            level: self.level,
        })
    }

    /// One-line summary for startup banners.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "chunk={}KiB, level={}, sync={}, strict={}",
            self.chunk_size / 1024,
            self.level,
            self.sync,
            self.strict
        )
    }
}
