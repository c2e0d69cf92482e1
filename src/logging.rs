//! Logger setup: console output plus an optional log file.
//!
//! Events go through `tracing`. Rank 0 logs to the console and appends to
//! `{log_dir}/{filename}`; other ranks only log to the console and default to
//! warnings and errors, so a multi-process run writes one log file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is unset or invalid.
fn default_directives(rank: usize) -> &'static str {
    if rank > 0 { "warn" } else { "info" }
}

/// Build the filter from a `RUST_LOG` value, falling back to the rank default.
fn env_filter(rust_log: Option<&str>, rank: usize) -> EnvFilter {
    rust_log
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(rank)))
}

/// Install the global subscriber.
///
/// * `log_dir` - Directory for the log file (created if missing).
/// * `rank` - Process rank; only rank 0 writes the file.
/// * `filename` - Log file name inside `log_dir`.
/// * `append` - Append to an existing file instead of truncating it.
///
/// The filter comes from `RUST_LOG` and defaults to `info` on rank 0 and
/// `warn` elsewhere.
pub fn setup_logger(
    log_dir: &Path,
    rank: usize,
    filename: &str,
    append: bool,
) -> Result<Option<PathBuf>> {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref(), rank);
    let console = fmt::layer().with_target(false).with_writer(std::io::stdout);

    if rank > 0 {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?;
        return Ok(None);
    }

    let (path, file) = open_log_file(log_dir, filename, append)?;
    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::debug!(path = %path.display(), "logger initialized");
    Ok(Some(path))
}

/// Open (and create) the log file.
pub(crate) fn open_log_file(log_dir: &Path, filename: &str, append: bool) -> Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(filename);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&path)?;
    Ok((path, file))
}
