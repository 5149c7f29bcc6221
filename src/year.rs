//! Year bucketing by last-modified time.

use chrono::{DateTime, Datelike, Local};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Returns the local-time calendar year of `path`'s last modification.
///
/// Files and directories are treated alike. Nothing is cached: every call
/// reads the metadata again.
///
/// # Errors
///
/// Returns the underlying I/O error if the metadata cannot be read.
pub fn year_of(path: &Path) -> io::Result<i32> {
    let modified = modified_time(path)?;
    Ok(DateTime::<Local>::from(modified).year())
}

/// Returns the last-modified timestamp of `path`.
pub fn modified_time(path: &Path) -> io::Result<SystemTime> {
    path.metadata()?.modified()
}
