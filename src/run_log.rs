// src/run_log.rs
//
//! Durable per-run log file.
//!
//! One plain-text, append-only log per run, segmented by calendar date:
//! `<base>/<YYYY-MM-DD>/s3_mirror.log`. Records are handed to a background
//! writer thread over a bounded channel; `send` blocks rather than drops, so
//! every record written before `finalize` returns is on disk. The handle is
//! injected into the mirror at construction — there is no process-global
//! logger registry.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, sync_channel, Receiver, SyncSender};
use std::sync::Mutex;
use std::thread;

use chrono::{DateTime, Local, NaiveDate};

use crate::constants::LOG_FILE_NAME;

/// Severity of one run-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }
}

#[derive(Debug)]
struct LogRecord {
    level: Level,
    message: String,
    at: DateTime<Local>,
}

impl LogRecord {
    fn to_log_line(&self) -> String {
        format!(
            "{} - s3mirror - {} - {}\n",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.level.as_str(),
            self.message
        )
    }
}

enum Message {
    Record(LogRecord),
    Shutdown,
}

/// Handle for submitting records and waiting on shutdown.
#[derive(Debug)]
pub struct RunLogger {
    sender: SyncSender<Message>,
    done_rx: Mutex<Option<Receiver<()>>>,
    path: PathBuf,
}

impl Clone for RunLogger {
    fn clone(&self) -> Self {
        // Only the original handle keeps the shutdown receiver.
        RunLogger {
            sender: self.sender.clone(),
            done_rx: Mutex::new(None),
            path: self.path.clone(),
        }
    }
}

impl RunLogger {
    /// Create the dated log directory and spawn the background writer.
    /// Reopening the same date appends.
    pub fn new(base_dir: &Path, date: NaiveDate) -> std::io::Result<Self> {
        let log_dir = base_dir.join(date.format("%Y-%m-%d").to_string());
        fs::create_dir_all(&log_dir)?;
        let path = log_dir.join(LOG_FILE_NAME);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        // Bounded channel for records; blocking send keeps this lossless.
        let (sender, receiver): (SyncSender<Message>, Receiver<Message>) = sync_channel(256);

        // One-shot channel to signal that the background thread finished.
        let (done_tx, done_rx) = channel::<()>();

        thread::spawn(move || {
            for msg in receiver {
                let record = match msg {
                    Message::Record(r) => r,
                    Message::Shutdown => break,
                };
                let line = record.to_log_line();
                if let Err(e) = writer.write_all(line.as_bytes()) {
                    eprintln!("Error writing to run log: {e}");
                    break;
                }
                // Volume is low; flush per record so the log survives an
                // abrupt exit.
                let _ = writer.flush();
            }
            let _ = writer.flush();
            let _ = done_tx.send(());
        });

        Ok(RunLogger {
            sender,
            done_rx: Mutex::new(Some(done_rx)),
            path,
        })
    }

    /// Path of the log file this handle writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message.into());
    }

    fn log(&self, level: Level, message: String) {
        let record = LogRecord {
            level,
            message,
            at: Local::now(),
        };
        // Blocking send: a full buffer stalls the (sequential) run rather
        // than dropping a record. A send error means the writer thread is
        // gone; nothing useful to do with it here.
        let _ = self.sender.send(Message::Record(record));
    }

    /// Signal the background writer to finish and wait for it to flush.
    pub fn finalize(&self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(done_rx) = self.done_rx.lock().unwrap().take() {
            let _ = done_rx.recv();
        }
    }
}
