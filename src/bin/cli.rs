// src/bin/cli.rs
//
//! CLI entry point: mirror a slice of an S3 bucket into a local directory.
//!
//! Examples:
//! ```bash
//! s3mirror my-bucket                 # mirror every object
//! s3mirror s3://my-bucket 25         # first 25 objects in listing order
//! s3mirror my-bucket -d /data/mirror --log-dir /var/log/s3mirror -v
//! ```

use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use s3mirror::constants::{DEFAULT_DOWNLOAD_DIR, DEFAULT_LOG_DIR};
use s3mirror::s3_utils::normalize_bucket;
use s3mirror::{
    BucketMirror, ProgressObserver, RunContext, RunLogger, S3ObjectStorage, SilentProgress,
    TransferProgress,
};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Gracefully exit on broken pipe (e.g., when piped to head/tail)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Bucket to mirror: a bare name or an s3://bucket URI.
    bucket: String,

    /// How many objects to take from the front of the listing. Omitted or
    /// non-numeric means every object in the bucket.
    count: Option<String>,

    /// Local directory to mirror into (created if absent).
    #[arg(short = 'd', long = "dest", default_value = DEFAULT_DOWNLOAD_DIR)]
    dest: PathBuf,

    /// Base directory for run logs; one subdirectory per calendar date.
    #[arg(long = "log-dir", default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    #[arg(
        short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    /// Suppress the progress bar.
    #[arg(short = 'q', long)]
    quiet: bool,
}

/// Check if AWS credentials are available for S3 operations
fn check_aws_credentials() -> Result<()> {
    if std::env::var("AWS_ACCESS_KEY_ID").is_err() || std::env::var("AWS_SECRET_ACCESS_KEY").is_err() {
        bail!(
            "Missing required AWS environment variables. Please set AWS_ACCESS_KEY_ID and \
             AWS_SECRET_ACCESS_KEY (and optionally AWS_REGION) either in your environment \
             or in a .env file."
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialise logging once, based on how many `-v` flags were given.
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    check_aws_credentials()?;

    let bucket = normalize_bucket(&cli.bucket);
    let count = cli
        .count
        .as_deref()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0);
    let ctx = RunContext::new(bucket, count, cli.dest);

    let logger = RunLogger::new(&cli.log_dir, ctx.date)?;
    let progress: Box<dyn ProgressObserver> = if cli.quiet {
        Box::new(SilentProgress)
    } else {
        Box::new(TransferProgress::new())
    };
    let mirror = BucketMirror::new(
        Box::new(S3ObjectStorage::new()),
        ctx.local_dir.clone(),
        logger.clone(),
    )?
    .with_progress(progress);

    let result = mirror.run(&ctx.bucket, ctx.requested_count);

    // Flush the run log before surfacing any error.
    logger.finalize();
    let downloaded = result?;

    safe_println!(
        "Downloaded {} object(s) into {}",
        downloaded.len(),
        ctx.local_dir.display()
    );
    for key in &downloaded {
        safe_println!("  {key}");
    }
    safe_println!("Run log: {}", logger.path().display());
    Ok(())
}
