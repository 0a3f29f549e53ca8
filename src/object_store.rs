// src/object_store.rs
//
//! Pluggable object-storage seam.
//!
//! The mirror talks to storage only through [`ObjectStorage`], so tests can
//! substitute an in-memory fake and a future backend only has to implement
//! three methods. The production implementation delegates to the blocking
//! S3 wrappers in `s3_utils`.

use std::path::Path;

use anyhow::Result;

use crate::s3_utils;

/// One remote object as reported by listing: its path-like key and its size
/// in bytes. Immutable; lives only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub key: String,
    pub size: u64,
}

/// Minimal storage capability the mirror needs: an existence probe, a
/// bounded listing in provider-defined order, and a single-object transfer
/// to a local path.
pub trait ObjectStorage: Send + Sync {
    /// Probe whether `bucket` exists and is reachable.
    fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// List objects in the provider's own order. With `limit`, return only
    /// the first `limit` descriptors.
    fn list_objects(&self, bucket: &str, limit: Option<usize>) -> Result<Vec<ObjectDescriptor>>;

    /// Transfer one object to `dest`. The parent directory of `dest` exists
    /// by the time this is called.
    fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;
}

/// S3 backend over the shared blocking client.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3ObjectStorage;

impl S3ObjectStorage {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectStorage for S3ObjectStorage {
    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        s3_utils::bucket_exists(bucket)
    }

    fn list_objects(&self, bucket: &str, limit: Option<usize>) -> Result<Vec<ObjectDescriptor>> {
        s3_utils::list_objects(bucket, limit)
    }

    fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        s3_utils::download_object(bucket, key, dest)
    }
}
