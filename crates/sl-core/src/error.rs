//! Error types for sl-core

use thiserror::Error;

/// Core error type for Sluice
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Invalid configuration value
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Resource name does not match the expected layout
    #[error("[E003] Invalid resource name '{name}': {reason}")]
    InvalidResourceName { name: String, reason: String },

    /// E004: Unknown enum tag read from storage or payload
    #[error("[E004] Unknown {kind} '{value}'")]
    UnknownTag { kind: &'static str, value: String },

    /// E005: IO error
    #[error("[E005] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E006: IO error with file path context
    #[error("[E006] IO error at {path}: {source}")]
    IoWithPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// E007: YAML parse error
    #[error("[E007] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// E008: JSON error
    #[error("[E008] JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
