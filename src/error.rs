// src/error.rs
//
//! Error kinds surfaced by a mirror run.
//!
//! Nothing here is recovered internally: every kind is logged at error level
//! where it is detected and then propagated to the caller. The single
//! exception in the crate is progress-bar rendering, which is swallowed so
//! it can never mask a transfer failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// The bucket identifier was empty or absent. Raised before any call to
    /// the storage service.
    #[error("bucket identifier is missing or empty")]
    Configuration,

    /// The existence probe failed: the bucket does not exist or is
    /// unreachable.
    #[error("bucket {bucket} does not exist or is unreachable")]
    BucketNotFound { bucket: String },

    /// The selected object set does not fit in the destination volume.
    /// Equality counts as insufficient.
    #[error("not enough space in local directory: required {required} bytes, available {available} bytes")]
    InsufficientSpace { required: u64, available: u64 },

    /// A single object failed to transfer. The run is aborted; `completed`
    /// holds the keys that landed before the failure.
    #[error("download of {key} failed after {} completed object(s)", .completed.len())]
    Transfer {
        key: String,
        completed: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other failure surfaced by the storage collaborator.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
