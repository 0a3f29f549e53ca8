// src/progress.rs
//
//! Operator-facing progress reporting for the transfer loop.
//!
//! The mirror only knows the [`ProgressObserver`] trait, so the rendering
//! can be swapped (silent, textual, structured) without touching transfer
//! logic. Observers must never fail the run; rendering problems are
//! swallowed here.

use indicatif::{ProgressBar, ProgressStyle};

/// Callback invoked after each completed (or skipped) object.
pub trait ProgressObserver {
    /// `completed` objects out of `total` are done; `key` is the object
    /// that just finished.
    fn object_done(&self, completed: u64, total: u64, key: &str);

    /// The transfer loop is over.
    fn finish(&self) {}
}

/// No-op observer for scripted runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn object_done(&self, _completed: u64, _total: u64, _key: &str) {}
}

/// Terminal progress bar over object counts, with the current key as the
/// message line.
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    pub fn new() -> Self {
        // Length is set lazily on the first tick, once the listing total is
        // known.
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("DOWNLOAD: [{bar:60.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=- "),
        );
        Self { bar }
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TransferProgress {
    fn object_done(&self, completed: u64, total: u64, key: &str) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(completed);
        self.bar.set_message(key.to_owned());
    }

    fn finish(&self) {
        self.bar.finish_with_message("download complete");
    }
}
