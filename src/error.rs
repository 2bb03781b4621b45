// Error types for the task store

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted snapshot could not be decoded
    #[error("corrupted snapshot under key '{key}': {source}")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The value is valid JSON but not a task snapshot
    #[error("malformed snapshot under key '{key}': {reason}")]
    Malformed { key: String, reason: String },

    /// The snapshot was written by a newer schema
    #[error("snapshot under key '{key}' has unsupported version {version} (max {supported})")]
    UnsupportedVersion { key: String, version: u64, supported: u32 },

    /// Writing the snapshot failed; the in-memory collection still holds the mutation
    #[error("failed to persist snapshot under key '{key}': {source}")]
    PersistenceWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid slot key: {0}")]
    InvalidKey(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
