//! Core error types for mise-core.
//!
//! Every concern gets its own thiserror enum; [`CoreError`] wraps them for
//! callers that do not care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::ids::EntityId;

/// Core error type for mise-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timer errors
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Converter errors
    #[error("Converter error: {0}")]
    Converter(#[from] ConverterError),

    /// Remote store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Page session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

/// Timer validation and lookup errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Invalid duration {0}s: must be a positive number of seconds")]
    InvalidDuration(i64),

    #[error("Timer label must not be empty")]
    InvalidLabel,

    #[error("Timer {0} not found")]
    NotFound(EntityId),
}

/// Converter policy and lookup errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConverterError {
    #[error("Unknown conversion category '{0}'")]
    UnknownCategory(String),

    #[error("Converter {0} is saved; its category can no longer change")]
    ImmutableOnceSaved(EntityId),

    #[error("Converter {0} is already saved")]
    AlreadySaved(EntityId),

    #[error("Cannot remove the last remaining converter")]
    LastConverterProtected,

    #[error("Converter {0} not found")]
    NotFound(EntityId),

    #[error("Invalid conversion factor {0}: must be positive and finite")]
    InvalidFactor(f64),
}

/// Errors reported by the external page/timer/converter store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected the payload (bad label, duration, category...).
    #[error("Rejected by store: {0}")]
    Validation(String),

    /// The identifier is unknown to the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, expired or rejected credential.
    #[error("Unauthorized")]
    Unauthorized,

    /// Network or server failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store answered with a body we could not understand.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::Unauthorized)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for StoreError {
    fn from(err: url::ParseError) -> Self {
        StoreError::Transport(format!("invalid store URL: {err}"))
    }
}

/// Errors surfaced by a [`crate::session::PageSession`].
///
/// Remote failures are converted at the session boundary; none of them leave
/// partially applied local state behind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Page {0} not found")]
    PageNotFound(String),

    #[error("Failed to load page: {0}")]
    LoadFailed(StoreError),

    #[error("Page is not loaded")]
    NotLoaded,

    #[error("Another operation on {0} is still in flight")]
    OperationInFlight(EntityId),

    #[error("Saving converter failed: {0}")]
    SaveRejected(StoreError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Stale identifier {0}; page was resynchronized")]
    NotFound(EntityId),

    #[error("Store request failed: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    Converter(#[from] ConverterError),

    #[error("Session has ended")]
    Closed,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
