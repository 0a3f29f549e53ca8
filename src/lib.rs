// src/lib.rs
//
// Crate root — public re-exports.

pub mod constants;
pub mod error;
pub mod mirror;
pub mod object_store;
pub mod progress;
pub mod run_log;
pub mod s3_utils;

pub use error::{MirrorError, Result};
pub use mirror::{cumulative_size, BucketMirror, RunContext, RunSummary};
pub use object_store::{ObjectDescriptor, ObjectStorage, S3ObjectStorage};
pub use progress::{ProgressObserver, SilentProgress, TransferProgress};
pub use run_log::RunLogger;
