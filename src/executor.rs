/// Plan execution: creating bucket directories and moving entries into them.
///
/// [`execute_plan`] builds a plan and applies it. With `mutate` set to false
/// (test mode) every decision and log line is produced, but nothing on disk
/// changes. There is no rollback: an interrupted run leaves the tree partly
/// organized.
use crate::config::CompiledRules;
use crate::dedup::ConflictResolver;
use crate::logging::LogSink;
use crate::plan::{Plan, PlannedMove, build_plan};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while planning or applying an organization run.
#[derive(Debug)]
pub enum OrganizeError {
    /// The base directory path is invalid or doesn't exist.
    InvalidBasePath {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Creating a bucket directory or moving an entry into it failed.
    PlacementFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Deleting a file chosen by deduplication failed.
    RemovalFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Metadata of a path could not be read while planning.
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No deduplication choice could be read.
    Prompt { source: std::io::Error },
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBasePath { path, source } => {
                write!(f, "Invalid base path {}: {}", path.display(), source)
            }
            Self::PlacementFailed { path, source } => {
                write!(f, "Placement failed for {}: {}", path.display(), source)
            }
            Self::RemovalFailed { path, source } => {
                write!(f, "Failed to remove {}: {}", path.display(), source)
            }
            Self::Scan { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            Self::Prompt { source } => {
                write!(f, "Could not read deduplication choice: {}", source)
            }
        }
    }
}

impl std::error::Error for OrganizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidBasePath { source, .. }
            | Self::PlacementFailed { source, .. }
            | Self::RemovalFailed { source, .. }
            | Self::Scan { source, .. }
            | Self::Prompt { source } => Some(source),
        }
    }
}

/// Result type for organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// What an applied plan did (or, in test mode, would have done).
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// False in test mode.
    pub mutated: bool,
    /// (source, destination) pairs that were moved.
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Files deleted by deduplication.
    pub removed: Vec<PathBuf>,
    /// Sources not attempted because their bucket directory could not be created.
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<OrganizeError>,
}

impl ExecutionReport {
    /// Returns true if nothing failed or was skipped.
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// Builds a plan for `base_dir` and applies it.
///
/// All planning (including every deduplication prompt) finishes before the
/// first change on disk.
///
/// # Errors
///
/// Returns an error only if planning fails; failures of individual moves
/// and removals are collected in the report.
pub fn execute_plan(
    base_dir: &Path,
    rules: &CompiledRules,
    resolver: Option<&mut dyn ConflictResolver>,
    mutate: bool,
    sink: &mut dyn LogSink,
) -> OrganizeResult<(Plan, ExecutionReport)> {
    let plan = build_plan(base_dir, rules, resolver, sink)?;
    let report = apply_plan(&plan, mutate, sink);
    Ok((plan, report))
}

/// Applies `plan`: dedup removals first, then moves bucket by bucket.
pub fn apply_plan(plan: &Plan, mutate: bool, sink: &mut dyn LogSink) -> ExecutionReport {
    apply_plan_with_progress(plan, mutate, sink, |_| {})
}

/// Like [`apply_plan`], calling `on_step` after each removal or move.
pub fn apply_plan_with_progress(
    plan: &Plan,
    mutate: bool,
    sink: &mut dyn LogSink,
    mut on_step: impl FnMut(&Path),
) -> ExecutionReport {
    let mut report = ExecutionReport {
        mutated: mutate,
        ..Default::default()
    };
    if !mutate {
        sink.info("Running in test mode: no files will be changed");
    }

    for removal in &plan.removals {
        sink.info(&format!(
            "Removing {} ({})",
            removal.path.display(),
            removal.outcome.label()
        ));
        let result = if mutate {
            fs::remove_file(&removal.path)
        } else {
            Ok(())
        };
        match result {
            Ok(()) => report.removed.push(removal.path.clone()),
            Err(e) => {
                let error = OrganizeError::RemovalFailed {
                    path: removal.path.clone(),
                    source: e,
                };
                sink.error(&error.to_string());
                report.failures.push(error);
            }
        }
        on_step(&removal.path);
    }

    let mut created: HashSet<PathBuf> = HashSet::new();
    for moves in plan.buckets.values().flat_map(|categories| categories.values()) {
        let mut remaining = moves.iter();
        while let Some(planned) = remaining.next() {
            if let Err(error) = ensure_dir(&planned.dest_dir, &mut created, mutate, sink) {
                sink.error(&error.to_string());
                report.failures.push(error);
                // The rest of this bucket cannot be placed either.
                report.skipped.push(planned.source.clone());
                report
                    .skipped
                    .extend(remaining.by_ref().map(|planned| planned.source.clone()));
                break;
            }

            match move_entry(planned, mutate, sink) {
                Ok(destination) => report.moved.push((planned.source.clone(), destination)),
                Err(error) => {
                    sink.error(&error.to_string());
                    report.failures.push(error);
                }
            }
            on_step(&planned.source);
        }
    }

    report
}

/// Creates `dir` (and its parents) the first time it is needed.
fn ensure_dir(
    dir: &Path,
    created: &mut HashSet<PathBuf>,
    mutate: bool,
    sink: &mut dyn LogSink,
) -> OrganizeResult<()> {
    if created.contains(dir) || dir.is_dir() {
        return Ok(());
    }

    sink.info(&format!("Creating directory: {}", dir.display()));
    if mutate {
        fs::create_dir_all(dir).map_err(|e| OrganizeError::PlacementFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    created.insert(dir.to_path_buf());
    Ok(())
}

/// Moves one planned entry to its destination and returns the destination.
///
/// A file already at the destination is overwritten by the rename.
fn move_entry(planned: &PlannedMove, mutate: bool, sink: &mut dyn LogSink) -> OrganizeResult<PathBuf> {
    let destination = planned.destination();
    sink.info(&format!(
        "Moving {} to {}",
        planned.source.display(),
        destination.display()
    ));

    if mutate {
        fs::rename(&planned.source, &destination).map_err(|e| OrganizeError::PlacementFailed {
            path: planned.source.clone(),
            source: e,
        })?;
    }

    Ok(destination)
}
