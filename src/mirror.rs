// src/mirror.rs
//
//! End-to-end mirror orchestration for one bucket into one local directory.
//!
//! A run is strictly sequential: Validate → List → Size-check → Transfer →
//! Summarize, each phase gated on the success of the previous one. There is
//! no retry, resume, or partial re-entry; the first unrecoverable condition
//! stops the run and files landed before it stay on disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::error::{MirrorError, Result};
use crate::object_store::{ObjectDescriptor, ObjectStorage};
use crate::progress::{ProgressObserver, SilentProgress};
use crate::run_log::RunLogger;

/// Parameters of one invocation. Immutable for the run's duration; the date
/// selects the run-log segment.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub bucket: String,
    pub requested_count: Option<usize>,
    pub local_dir: PathBuf,
    pub date: NaiveDate,
}

impl RunContext {
    pub fn new(
        bucket: impl Into<String>,
        requested_count: Option<usize>,
        local_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            requested_count,
            local_dir: local_dir.into(),
            date: Local::now().date_naive(),
        }
    }
}

/// What a finished run looked like. Pure reporting; no decision logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Objects transferred this run (skipped objects excluded).
    pub downloaded: usize,
    /// Bytes transferred this run.
    pub bytes_downloaded: u64,
    /// Bytes across everything the listing returned, present-or-not.
    pub bytes_listed: u64,
    /// Free bytes on the destination volume after the run.
    pub space_remaining: u64,
}

/// Sum of object sizes; 0 for an empty selection.
pub fn cumulative_size(objects: &[ObjectDescriptor]) -> u64 {
    objects.iter().map(|o| o.size).sum()
}

// Equality counts as insufficient: the batch must fit with room to spare.
fn space_is_sufficient(required: u64, available: u64) -> bool {
    required < available
}

/// Coordinates the mirror operation. Storage, run log, and progress
/// rendering are injected so they can be swapped without touching the
/// orchestration.
pub struct BucketMirror {
    storage: Box<dyn ObjectStorage>,
    local_dir: PathBuf,
    logger: RunLogger,
    progress: Box<dyn ProgressObserver>,
}

impl BucketMirror {
    /// Build a mirror writing into `local_dir`, creating the directory
    /// (including intermediate segments) if it is absent. Progress is
    /// silent unless [`with_progress`](Self::with_progress) swaps it.
    pub fn new(
        storage: Box<dyn ObjectStorage>,
        local_dir: impl Into<PathBuf>,
        logger: RunLogger,
    ) -> Result<Self> {
        let local_dir = local_dir.into();
        fs::create_dir_all(&local_dir)?;
        Ok(Self {
            storage,
            local_dir,
            logger,
            progress: Box::new(SilentProgress),
        })
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Check the bucket identifier and probe for existence. An empty
    /// identifier fails before the storage service is contacted.
    pub fn validate_bucket(&self, bucket: &str) -> Result<()> {
        if bucket.is_empty() {
            self.logger.error("Bucket identifier is not provided");
            return Err(MirrorError::Configuration);
        }
        match self.storage.bucket_exists(bucket) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.logger.error(format!("Bucket {bucket} does not exist"));
                Err(MirrorError::BucketNotFound {
                    bucket: bucket.to_owned(),
                })
            }
            Err(e) => {
                self.logger
                    .error(format!("Bucket {bucket} is unreachable: {e:#}"));
                Err(MirrorError::BucketNotFound {
                    bucket: bucket.to_owned(),
                })
            }
        }
    }

    /// List candidate objects: everything, or the first `limit` in the
    /// provider's own listing order. No ranking is applied here.
    pub fn list_objects(
        &self,
        bucket: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ObjectDescriptor>> {
        let objects = self.storage.list_objects(bucket, limit)?;
        info!("listed {} object(s) in bucket {bucket}", objects.len());
        Ok(objects)
    }

    /// Free bytes on the filesystem holding the destination directory.
    pub fn available_space(&self) -> Result<u64> {
        Ok(fs2::available_space(&self.local_dir)?)
    }

    /// One-shot, up-front space check for the whole selected batch. Returns
    /// the observed available bytes on success; not re-checked per file as
    /// space is consumed.
    pub fn ensure_space(&self, required: u64) -> Result<u64> {
        let available = self.available_space()?;
        if space_is_sufficient(required, available) {
            Ok(available)
        } else {
            self.logger.error(format!(
                "Not enough space available in local directory. \
                 Available space: {available}, Required space: {required}"
            ));
            Err(MirrorError::InsufficientSpace {
                required,
                available,
            })
        }
    }

    /// Whether `key` is already present under the destination directory.
    /// Keys containing separators map to nested paths.
    pub fn file_exists_locally(&self, key: &str) -> bool {
        self.local_dir.join(key).exists()
    }

    /// Transfer the given objects in order, skipping ones already present.
    /// The first transfer failure aborts the run: the error names the
    /// failing key and carries the manifest of keys that completed before
    /// it. The progress observer is ticked after each completed or skipped
    /// object.
    pub fn download_selected(
        &self,
        bucket: &str,
        objects: &[ObjectDescriptor],
    ) -> Result<Vec<String>> {
        let total = objects.len() as u64;
        let mut downloaded = Vec::new();
        for (index, object) in objects.iter().enumerate() {
            let dest = self.local_dir.join(&object.key);
            if self.file_exists_locally(&object.key) {
                debug!("skipping {}: already present locally", object.key);
                self.logger
                    .info(format!("Skipped {}: already present locally", object.key));
                self.progress
                    .object_done((index + 1) as u64, total, &object.key);
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            match self.storage.download_object(bucket, &object.key, &dest) {
                Ok(()) => {
                    self.logger.info(format!(
                        "Downloaded {} ({} bytes)",
                        object.key, object.size
                    ));
                    downloaded.push(object.key.clone());
                    self.progress
                        .object_done((index + 1) as u64, total, &object.key);
                }
                Err(e) => {
                    self.logger
                        .error(format!("File {} download failed: {e:#}", object.key));
                    return Err(MirrorError::Transfer {
                        key: object.key.clone(),
                        completed: downloaded,
                        source: e,
                    });
                }
            }
        }
        Ok(downloaded)
    }

    /// Log and return the run's bookkeeping: count downloaded, bytes
    /// downloaded, bytes listed, and the space left afterwards.
    pub fn summarize_run(
        &self,
        downloaded: &[String],
        listed: &[ObjectDescriptor],
    ) -> Result<RunSummary> {
        let bytes_downloaded = listed
            .iter()
            .filter(|o| downloaded.iter().any(|k| k == &o.key))
            .map(|o| o.size)
            .sum();
        let bytes_listed = cumulative_size(listed);
        let space_remaining = self.available_space()?;

        self.logger
            .info(format!("Downloaded {} files", downloaded.len()));
        self.logger
            .info(format!("Total size of files downloaded: {bytes_downloaded}"));
        self.logger
            .info(format!("Total size of files in bucket: {bytes_listed}"));
        self.logger.info(format!(
            "Available space in local directory: {space_remaining}"
        ));

        Ok(RunSummary {
            downloaded: downloaded.len(),
            bytes_downloaded,
            bytes_listed,
            space_remaining,
        })
    }

    /// Top-level orchestration for one mirror run. Returns the ordered
    /// manifest of keys transferred this run.
    pub fn run(&self, bucket: &str, limit: Option<usize>) -> Result<Vec<String>> {
        self.validate_bucket(bucket)?;
        let listed = self.list_objects(bucket, limit)?;
        let required = cumulative_size(&listed);
        self.ensure_space(required)?;
        let downloaded = self.download_selected(bucket, &listed)?;
        self.progress.finish();
        let summary = self.summarize_run(&downloaded, &listed)?;
        info!(
            "run complete: {} downloaded, {} bytes",
            summary.downloaded, summary.bytes_downloaded
        );
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::{tempdir, TempDir};

    /// In-memory storage fake: serves a fixed listing, writes zero-filled
    /// files of the declared size, and records every call.
    #[derive(Clone, Default)]
    struct FakeStorage {
        objects: Vec<ObjectDescriptor>,
        fail_keys: Vec<String>,
        bucket_present: bool,
        probe_calls: Arc<AtomicUsize>,
        attempts: Arc<Mutex<Vec<String>>>,
    }

    impl FakeStorage {
        fn with_objects(objects: &[(&str, u64)]) -> Self {
            Self {
                objects: objects
                    .iter()
                    .map(|(k, s)| ObjectDescriptor {
                        key: (*k).to_owned(),
                        size: *s,
                    })
                    .collect(),
                bucket_present: true,
                ..Self::default()
            }
        }

        fn failing_on(mut self, key: &str) -> Self {
            self.fail_keys.push(key.to_owned());
            self
        }

        fn attempted(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl ObjectStorage for FakeStorage {
        fn bucket_exists(&self, _bucket: &str) -> anyhow::Result<bool> {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bucket_present)
        }

        fn list_objects(
            &self,
            _bucket: &str,
            limit: Option<usize>,
        ) -> anyhow::Result<Vec<ObjectDescriptor>> {
            let mut objects = self.objects.clone();
            if let Some(n) = limit {
                objects.truncate(n);
            }
            Ok(objects)
        }

        fn download_object(
            &self,
            _bucket: &str,
            key: &str,
            dest: &Path,
        ) -> anyhow::Result<()> {
            self.attempts.lock().unwrap().push(key.to_owned());
            if self.fail_keys.iter().any(|k| k == key) {
                return Err(anyhow!("injected transfer failure"));
            }
            let size = self
                .objects
                .iter()
                .find(|o| o.key == key)
                .map(|o| o.size)
                .unwrap_or(0);
            fs::write(dest, vec![0u8; size as usize])?;
            Ok(())
        }
    }

    /// Observer that records every tick.
    #[derive(Clone, Default)]
    struct CountingProgress {
        ticks: Arc<Mutex<Vec<(u64, u64, String)>>>,
    }

    impl ProgressObserver for CountingProgress {
        fn object_done(&self, completed: u64, total: u64, key: &str) {
            self.ticks
                .lock()
                .unwrap()
                .push((completed, total, key.to_owned()));
        }
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    fn mirror_in(root: &TempDir, storage: FakeStorage) -> (BucketMirror, RunLogger) {
        let logger = RunLogger::new(&root.path().join("logs"), test_date()).unwrap();
        let mirror = BucketMirror::new(
            Box::new(storage),
            root.path().join("s3_downloads"),
            logger.clone(),
        )
        .unwrap();
        (mirror, logger)
    }

    #[test]
    fn cumulative_size_sums_member_sizes() {
        let objects = vec![
            ObjectDescriptor { key: "a".into(), size: 100 },
            ObjectDescriptor { key: "b".into(), size: 200 },
            ObjectDescriptor { key: "c".into(), size: 300 },
        ];
        assert_eq!(cumulative_size(&objects), 600);
        assert_eq!(cumulative_size(&[]), 0);
    }

    #[test]
    fn exactly_equal_space_is_insufficient() {
        assert!(!space_is_sufficient(500, 500));
        assert!(space_is_sufficient(499, 500));
        assert!(!space_is_sufficient(501, 500));
        assert!(space_is_sufficient(0, 1));
    }

    #[test]
    fn empty_bucket_id_fails_without_probing_storage() {
        let root = tempdir().unwrap();
        let storage = FakeStorage::with_objects(&[]);
        let probes = storage.probe_calls.clone();
        let (mirror, logger) = mirror_in(&root, storage);

        let err = mirror.validate_bucket("").unwrap_err();
        assert!(matches!(err, MirrorError::Configuration));
        assert_eq!(probes.load(Ordering::SeqCst), 0);
        logger.finalize();
    }

    #[test]
    fn missing_bucket_is_not_found() {
        let root = tempdir().unwrap();
        let storage = FakeStorage {
            bucket_present: false,
            ..FakeStorage::default()
        };
        let (mirror, logger) = mirror_in(&root, storage);

        let err = mirror.validate_bucket("nope").unwrap_err();
        match err {
            MirrorError::BucketNotFound { bucket } => assert_eq!(bucket, "nope"),
            other => panic!("expected BucketNotFound, got {other:?}"),
        }
        logger.finalize();
    }

    #[test]
    fn limit_returns_first_n_in_listing_order() {
        let root = tempdir().unwrap();
        let listing: Vec<(String, u64)> =
            (0..10).map(|i| (format!("obj-{i:02}"), 10)).collect();
        let pairs: Vec<(&str, u64)> =
            listing.iter().map(|(k, s)| (k.as_str(), *s)).collect();
        let (mirror, logger) = mirror_in(&root, FakeStorage::with_objects(&pairs));

        let limited = mirror.list_objects("bucket", Some(3)).unwrap();
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0].key, "obj-00");
        assert_eq!(limited[2].key, "obj-02");

        let all = mirror.list_objects("bucket", None).unwrap();
        assert_eq!(all.len(), 10);
        logger.finalize();
    }

    #[test]
    fn existing_files_are_skipped_but_still_counted_as_listed() {
        let root = tempdir().unwrap();
        let storage = FakeStorage::with_objects(&[("a.dat", 100), ("b.dat", 200)]);
        let attempts = storage.attempts.clone();
        let (mirror, logger) = mirror_in(&root, storage);

        // a.dat is already present at the destination.
        fs::write(mirror.local_dir().join("a.dat"), b"already here").unwrap();

        let listed = mirror.list_objects("bucket", None).unwrap();
        let downloaded = mirror.download_selected("bucket", &listed).unwrap();
        assert_eq!(downloaded, vec!["b.dat".to_string()]);
        assert_eq!(attempts.lock().unwrap().as_slice(), ["b.dat"]);

        let summary = mirror.summarize_run(&downloaded, &listed).unwrap();
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.bytes_downloaded, 200);
        assert_eq!(summary.bytes_listed, 300);
        logger.finalize();
    }

    #[test]
    fn first_transfer_failure_aborts_the_run() {
        let root = tempdir().unwrap();
        let storage = FakeStorage::with_objects(&[("a", 1), ("b", 2), ("c", 3)])
            .failing_on("b");
        let attempts = storage.attempts.clone();
        let (mirror, logger) = mirror_in(&root, storage);

        let listed = mirror.list_objects("bucket", None).unwrap();
        let err = mirror.download_selected("bucket", &listed).unwrap_err();
        match err {
            MirrorError::Transfer { key, completed, .. } => {
                assert_eq!(key, "b");
                assert_eq!(completed, vec!["a".to_string()]);
            }
            other => panic!("expected Transfer, got {other:?}"),
        }
        // c was never attempted.
        assert_eq!(attempts.lock().unwrap().as_slice(), ["a", "b"]);
        logger.finalize();
    }

    #[test]
    fn nested_keys_create_intermediate_directories() {
        let root = tempdir().unwrap();
        let storage = FakeStorage::with_objects(&[("dir/sub/file.dat", 16)]);
        let (mirror, logger) = mirror_in(&root, storage);

        let listed = mirror.list_objects("bucket", None).unwrap();
        let downloaded = mirror.download_selected("bucket", &listed).unwrap();
        assert_eq!(downloaded, vec!["dir/sub/file.dat".to_string()]);
        assert!(mirror.local_dir().join("dir/sub/file.dat").is_file());
        logger.finalize();
    }

    #[test]
    fn progress_ticks_for_skipped_and_downloaded_objects() {
        let root = tempdir().unwrap();
        let storage = FakeStorage::with_objects(&[("a", 1), ("b", 2)]);
        let progress = CountingProgress::default();
        let ticks = progress.ticks.clone();
        let logger = RunLogger::new(&root.path().join("logs"), test_date()).unwrap();
        let mirror = BucketMirror::new(
            Box::new(storage),
            root.path().join("s3_downloads"),
            logger.clone(),
        )
        .unwrap()
        .with_progress(Box::new(progress));

        fs::write(mirror.local_dir().join("a"), b"x").unwrap();
        let listed = mirror.list_objects("bucket", None).unwrap();
        mirror.download_selected("bucket", &listed).unwrap();

        let ticks = ticks.lock().unwrap();
        assert_eq!(
            ticks.as_slice(),
            [(1, 2, "a".to_string()), (2, 2, "b".to_string())]
        );
        logger.finalize();
    }

    #[test]
    fn oversized_selection_is_rejected_up_front() {
        let root = tempdir().unwrap();
        let storage = FakeStorage::with_objects(&[("huge", u64::MAX)]);
        let attempts = storage.attempts.clone();
        let (mirror, logger) = mirror_in(&root, storage);

        let err = mirror.run("bucket", None).unwrap_err();
        match err {
            MirrorError::InsufficientSpace { required, .. } => {
                assert_eq!(required, u64::MAX)
            }
            other => panic!("expected InsufficientSpace, got {other:?}"),
        }
        // No transfer was attempted.
        assert!(attempts.lock().unwrap().is_empty());
        logger.finalize();
    }

    #[test]
    fn run_downloads_everything_in_listing_order() {
        let root = tempdir().unwrap();
        let storage = FakeStorage::with_objects(&[("a", 100), ("b", 200), ("c", 300)]);
        let (mirror, logger) = mirror_in(&root, storage);

        let downloaded = mirror.run("bucket", None).unwrap();
        assert_eq!(downloaded, vec!["a", "b", "c"]);
        for (key, size) in [("a", 100u64), ("b", 200), ("c", 300)] {
            let meta = fs::metadata(mirror.local_dir().join(key)).unwrap();
            assert_eq!(meta.len(), size);
        }

        logger.finalize();
        let contents = fs::read_to_string(logger.path()).unwrap();
        assert!(contents.contains("INFO - Downloaded 3 files"));
        assert!(contents.contains("INFO - Total size of files downloaded: 600"));
        assert!(contents.contains("INFO - Total size of files in bucket: 600"));
    }
}
