//! Core Error Types
//!
//! Defines the foundational error type shared by every Toolgate crate.
//! Kept dependency-free (only thiserror + serde_json) so the core crate stays
//! lightweight.
//!
//! Per-field validation problems are NOT represented here: they are plain
//! data (`ValidationError`) because the engine reports all of them at once
//! instead of failing on the first.

use thiserror::Error;

/// Core error type for the Toolgate workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate registration errors
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Capability execution errors
    #[error("Execution error: {0}")]
    Execution(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an already-exists error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
