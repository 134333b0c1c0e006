//! Error types for sccache-ci
//!
//! All modules use `CiResult<T>` as their return type. Acquisition-phase
//! errors propagate to `main` and fail the job; cache-phase call sites
//! catch and log instead of propagating.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sccache-ci operations
pub type CiResult<T> = Result<T, CiError>;

/// All errors that can occur in sccache-ci
#[derive(Error, Debug)]
pub enum CiError {
    // Platform resolution errors
    #[error("Unsupported platform: os={os}, arch={arch}")]
    UnsupportedPlatform { os: String, arch: String },

    // Release index errors
    #[error("Release index query failed: {0}")]
    ReleaseIndex(String),

    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    // Integrity errors
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Failed to extract {archive}: {reason}")]
    Extract { archive: PathBuf, reason: String },

    // Input errors
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("Invalid input {name}: {reason}")]
    InvalidInput { name: &'static str, reason: String },

    // Remote cache store errors (caught and logged by the coordinator)
    #[error("Cache service unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Cache store request failed: {0}")]
    CacheStore(String),

    #[error("No cache entry under key: {0}")]
    CacheEntryNotFound(String),

    // Stats errors
    #[error("Failed to collect sccache stats: {0}")]
    Stats(String),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CiError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means a cache key had no live entry.
    ///
    /// The dedup step treats delete-not-found as success; everything
    /// else it logs.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CacheEntryNotFound(_))
    }
}
