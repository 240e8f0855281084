use thiserror::Error;

use crate::codec::CodecError;

/// Validation and contract errors exposed by `statlink-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source id cannot be empty")]
    EmptySourceId,
    #[error("source id contains whitespace: '{value}'")]
    SourceIdWhitespace { value: String },
    #[error("source '{source_id}' does not declare alias '{alias}'")]
    UnknownAlias { source_id: String, alias: String },

    #[error("driver id cannot be empty")]
    EmptyDriverId,
    #[error("invalid driver id '{value}', expected upper-case words separated by '_'")]
    InvalidDriverId { value: String },

    #[error("invalid flow reference '{value}', expected AGENCY,ID,VERSION")]
    InvalidFlowRef { value: String },

    #[error("key has {actual} dimension(s) but structure declares {expected}")]
    KeyDimensionMismatch { expected: usize, actual: usize },
    #[error("code '{code}' is not allowed for dimension '{dimension}'")]
    KeyInvalidCode { dimension: String, code: String },

    #[error("invalid language range '{value}'")]
    InvalidLanguage { value: String },
    #[error("invalid language weight '{value}', expected q=0..1")]
    InvalidLanguageWeight { value: String },
}

/// Top-level error type for configuration and bootstrap operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },
}

/// Failures surfaced by cache implementations to their direct caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no suitable codec registered for '{type_name}'")]
    NoSuitableCodec { type_name: &'static str },

    #[error("cache i/o failure on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl CacheError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
