//! Deduplication of same-named files headed for the same bucket.
//!
//! Picking a strategy ([`ConflictResolver`]) is kept apart from carrying it
//! out ([`decide`]): the force policy answers every conflict the same way,
//! while the interactive policy lives in the CLI and asks the user.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// Marker inserted before the extension by "keep both".
pub const DUP_MARKER: &str = "_dup";

/// Strategy for same-named destination conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Keep the most recently modified file, without asking.
    Force,
    /// Ask for every conflict.
    Prompt,
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "force" => Ok(DedupPolicy::Force),
            "prompt" => Ok(DedupPolicy::Prompt),
            other => Err(format!("unknown dedup policy '{}': expected force or prompt", other)),
        }
    }
}

/// What to do with one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupChoice {
    KeepMostRecent,
    KeepBoth,
    DeleteDuplicate,
}

impl FromStr for DedupChoice {
    type Err = String;

    /// Accepts the canonical words or their single-letter forms, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "k" | "recent" | "keep most recent" => Ok(DedupChoice::KeepMostRecent),
            "both" | "b" | "keep both" => Ok(DedupChoice::KeepBoth),
            "delete" | "d" | "delete duplicate" => Ok(DedupChoice::DeleteDuplicate),
            other => Err(format!("invalid choice '{}'", other)),
        }
    }
}

/// Resolution of one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupOutcome {
    /// The existing file wins; the incoming file is removed from its source.
    SkipNew,
    /// The incoming file wins; the existing file is removed.
    Replace,
    /// The incoming file is placed under a `_dup` name next to the existing one.
    KeepBoth,
    /// The incoming file is removed unconditionally.
    DeleteNew,
}

impl DedupOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DedupOutcome::SkipNew => "kept existing",
            DedupOutcome::Replace => "replaced existing",
            DedupOutcome::KeepBoth => "kept both",
            DedupOutcome::DeleteNew => "deleted duplicate",
        }
    }
}

/// Two files competing for the same destination name.
#[derive(Debug, Clone)]
pub struct Conflict<'a> {
    /// File already placed in the bucket, or already present at the destination.
    pub existing: &'a Path,
    pub existing_modified: SystemTime,
    /// File about to be placed.
    pub incoming: &'a Path,
    pub incoming_modified: SystemTime,
}

impl Conflict<'_> {
    /// True if the incoming file is strictly newer.
    pub fn incoming_is_newer(&self) -> bool {
        self.incoming_modified > self.existing_modified
    }
}

/// Picks a [`DedupChoice`] for each conflict.
pub trait ConflictResolver {
    /// # Errors
    ///
    /// Returns an I/O error if no choice can be obtained (e.g. input closed).
    fn resolve(&mut self, conflict: &Conflict<'_>) -> io::Result<DedupChoice>;
}

/// The force policy: always keep the most recent file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForceResolver;

impl ConflictResolver for ForceResolver {
    fn resolve(&mut self, _conflict: &Conflict<'_>) -> io::Result<DedupChoice> {
        Ok(DedupChoice::KeepMostRecent)
    }
}

/// Turns a choice into an outcome. Ties go to the existing file.
pub fn decide(choice: DedupChoice, conflict: &Conflict<'_>) -> DedupOutcome {
    match choice {
        DedupChoice::KeepMostRecent if conflict.incoming_is_newer() => DedupOutcome::Replace,
        DedupChoice::KeepMostRecent => DedupOutcome::SkipNew,
        DedupChoice::KeepBoth => DedupOutcome::KeepBoth,
        DedupChoice::DeleteDuplicate => DedupOutcome::DeleteNew,
    }
}

/// Inserts [`DUP_MARKER`] before the extension.
///
/// ```
/// use fastsort::dedup::dup_name;
///
/// assert_eq!(dup_name("photo.jpg"), "photo_dup.jpg");
/// assert_eq!(dup_name("backup.tar.gz"), "backup.tar_dup.gz");
/// assert_eq!(dup_name("README"), "README_dup");
/// assert_eq!(dup_name(".bashrc"), ".bashrc_dup");
/// ```
pub fn dup_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}{}.{}", stem, DUP_MARKER, ext),
        _ => format!("{}{}", file_name, DUP_MARKER),
    }
}

/// Applies [`dup_name`] until the result is not taken.
pub fn unique_dup_name(file_name: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = dup_name(file_name);
    while is_taken(&candidate) {
        candidate = dup_name(&candidate);
    }
    candidate
}

/// A conflict and how it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupDecision {
    pub year: i32,
    pub category: String,
    pub existing: PathBuf,
    pub incoming: PathBuf,
    pub outcome: DedupOutcome,
    /// Name given to the incoming file by "keep both".
    pub renamed_to: Option<String>,
}
