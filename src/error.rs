//! Error types for tickmon.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown key: {key}")]
    UnknownKey { key: String },

    #[error("unsupported metric method: {method}")]
    UnsupportedMetricMethod { method: String },

    #[error("integer out of range of uint64: {value}")]
    IntegerOutOfRange { value: i128 },

    #[error("unknown value type: {tag}")]
    UnknownValueType { tag: String },

    #[error("invalid value length: expected {expected} bytes, got {actual}")]
    InvalidValueLength { expected: usize, actual: usize },

    #[error("invalid time: {input}")]
    InvalidTime { input: String },

    #[error("storage failure: {reason}")]
    StorageFailure { reason: String },

    #[error("sampler failed for {key}: {reason}")]
    SamplerFailed { key: String, reason: String },

    #[error("failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::StorageFailure {
            reason: e.to_string(),
        }
    }
}
