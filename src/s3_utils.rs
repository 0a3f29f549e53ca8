// src/s3_utils.rs
//
//! Thread-safe, blocking wrappers around the async AWS Rust SDK.
//! Everything the mirror needs from S3: an existence probe, bounded
//! listing, and single-object download-to-path.

use std::path::Path;
use std::{env, fs};

use anyhow::{Context, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::{config::Region, Client};
use once_cell::sync::{Lazy, OnceCell};
use tokio::{runtime::Handle, task};

use crate::constants::{DEFAULT_REGION, LIST_PAGE_SIZE};
use crate::object_store::ObjectDescriptor;

// -----------------------------------------------------------------------------
//  Global S3 client (lazy, thread-safe)
// -----------------------------------------------------------------------------
static CLIENT: OnceCell<Client> = OnceCell::new();

fn client() -> Result<Client> {
    CLIENT
        .get_or_try_init(|| {
            // Load .env first so AWS_* vars are available.
            dotenvy::dotenv().ok();

            if env::var("AWS_ACCESS_KEY_ID").is_err() || env::var("AWS_SECRET_ACCESS_KEY").is_err() {
                return Err(anyhow::anyhow!(
                    "Missing required environment variables: AWS_ACCESS_KEY_ID and/or AWS_SECRET_ACCESS_KEY. \
                    Please set these variables (and optionally AWS_REGION) in your environment or .env file."
                ));
            }

            let region = RegionProviderChain::first_try(
                env::var("AWS_REGION").ok().map(Region::new),
            )
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));

            let mut loader =
                aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

            if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
                if !endpoint.is_empty() {
                    loader = loader.endpoint_url(endpoint);
                }
            }

            let cfg = block_on(loader.load());
            Ok::<_, anyhow::Error>(Client::new(&cfg))
        })
        .map(Clone::clone)
}

// -----------------------------------------------------------------------------
//  Helper: synchronously wait on a future
// -----------------------------------------------------------------------------
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    if let Ok(handle) = Handle::try_current() {
        task::block_in_place(|| handle.block_on(fut))
    } else {
        static RT: Lazy<tokio::runtime::Runtime> =
            Lazy::new(|| tokio::runtime::Runtime::new().expect("tokio runtime"));
        RT.block_on(fut)
    }
}

// -----------------------------------------------------------------------------
//  Bucket identifier helpers
// -----------------------------------------------------------------------------

/// Reduce a caller-supplied bucket argument to a bare bucket name by
/// stripping an `s3://` prefix and any trailing slashes. An empty argument
/// stays empty; validation happens in the mirror.
pub fn normalize_bucket(arg: &str) -> String {
    arg.strip_prefix("s3://")
        .unwrap_or(arg)
        .trim_end_matches('/')
        .to_owned()
}

// -----------------------------------------------------------------------------
//  Blocking object operations
// -----------------------------------------------------------------------------

/// Lightweight existence probe (HeadBucket). `Ok(false)` means the service
/// answered "no such bucket"; any other failure propagates.
pub fn bucket_exists(bucket: &str) -> Result<bool> {
    let client = client()?;
    block_on(async {
        match client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(anyhow::Error::from(e).context("head_bucket failed")),
        }
    })
}

/// List `(key, size)` pairs in the order the service returns them (handles
/// pagination). With `limit`, stop after the first `limit` objects; the
/// ordering is whatever ListObjectsV2 yields and is not re-ranked here.
pub fn list_objects(bucket: &str, limit: Option<usize>) -> Result<Vec<ObjectDescriptor>> {
    let client = client()?;
    block_on(async {
        let mut objects = Vec::new();
        let mut cont: Option<String> = None;
        loop {
            let mut req = client
                .list_objects_v2()
                .bucket(bucket)
                .max_keys(LIST_PAGE_SIZE);
            if let Some(token) = &cont {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.context("list_objects_v2 failed")?;
            for obj in resp.contents() {
                if let Some(key) = obj.key() {
                    objects.push(ObjectDescriptor {
                        key: key.to_owned(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                    });
                    if limit.is_some_and(|n| objects.len() >= n) {
                        return Ok(objects);
                    }
                }
            }
            match resp.next_continuation_token() {
                Some(token) => cont = Some(token.to_string()),
                None => break,
            }
        }
        Ok(objects)
    })
}

/// Download a single object and write it to `dest`. The parent directory
/// must already exist; the mirror creates intermediate segments before
/// calling this.
pub fn download_object(bucket: &str, key: &str, dest: &Path) -> Result<()> {
    let client = client()?;
    block_on(async {
        let resp = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("get_object failed")?;
        let data = resp
            .body
            .collect()
            .await
            .context("collect body failed")?
            .into_bytes();
        fs::write(dest, &data)
            .with_context(|| format!("writing {} failed", dest.display()))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_scheme_and_trailing_slash() {
        assert_eq!(normalize_bucket("s3://my-bucket/"), "my-bucket");
        assert_eq!(normalize_bucket("s3://my-bucket"), "my-bucket");
        assert_eq!(normalize_bucket("my-bucket"), "my-bucket");
    }

    #[test]
    fn normalize_keeps_empty_input_empty() {
        assert_eq!(normalize_bucket(""), "");
        assert_eq!(normalize_bucket("s3://"), "");
    }
}
