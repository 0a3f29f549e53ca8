// src/constants.rs
//
//! Crate-wide defaults.

/// Region used when neither the environment nor the AWS config chain
/// supplies one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Directory the mirror writes into when the caller does not name one.
pub const DEFAULT_DOWNLOAD_DIR: &str = "s3_downloads";

/// Base directory for run logs; one subdirectory per calendar date.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// File name of the run log inside its dated directory.
pub const LOG_FILE_NAME: &str = "s3_mirror.log";

/// Maximum keys requested per ListObjectsV2 page (the S3 ceiling).
pub const LIST_PAGE_SIZE: i32 = 1_000;
