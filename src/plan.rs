//! Plan building: the year → category → moves mapping.
//!
//! A [`Plan`] is built by scanning the base directory once, before anything
//! is touched. Simulation renders it; execution applies it (see
//! [`crate::executor`]). Both therefore see the same traversal, the same
//! classification, and the same deduplication decisions.
//!
//! Two scans feed the plan:
//!
//! 1. The top level of the base directory. Files are classified and filed
//!    under `(year, category)`; directories matching an `archive_dir`
//!    fragment are filed whole under `(year, "archive_dir")`.
//! 2. A recursive walk of the ignore-path regions. Directories found there
//!    are filed whole under `archive_dir`; files (including a file that is
//!    itself named by an ignore path) go through category matching. Ignore
//!    patterns do not apply inside these regions.

use crate::classifier::Classification;
use crate::config::{ARCHIVE_BUCKET, CompiledRules};
use crate::dedup::{
    Conflict, ConflictResolver, DedupDecision, DedupOutcome, decide, unique_dup_name,
};
use crate::executor::{OrganizeError, OrganizeResult};
use crate::logging::LogSink;
use crate::year::{modified_time, year_of};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Whether a planned move carries a single file or a whole directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// One source path and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub dest_dir: PathBuf,
    pub file_name: String,
    /// File name for files, path relative to the base directory for archive units.
    pub display: String,
    pub kind: EntryKind,
}

impl PlannedMove {
    pub fn destination(&self) -> PathBuf {
        self.dest_dir.join(&self.file_name)
    }
}

/// A file deleted as the result of a deduplication decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub path: PathBuf,
    pub outcome: DedupOutcome,
}

/// Files and years planned for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub entries: usize,
    pub years: usize,
}

/// Everything a run will do, grouped by year then category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub base_dir: PathBuf,
    /// Moves per bucket, in the order they were encountered.
    pub buckets: BTreeMap<i32, BTreeMap<String, Vec<PlannedMove>>>,
    /// Deletions decided by deduplication.
    pub removals: Vec<Removal>,
    pub decisions: Vec<DedupDecision>,
}

impl Plan {
    fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            ..Default::default()
        }
    }

    /// Moves planned for one bucket, empty if there are none.
    pub fn entries(&self, year: i32, category: &str) -> &[PlannedMove] {
        self.buckets
            .get(&year)
            .and_then(|categories| categories.get(category))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every planned move, bucket by bucket.
    pub fn moves(&self) -> impl Iterator<Item = &PlannedMove> {
        self.buckets
            .values()
            .flat_map(|categories| categories.values())
            .flatten()
    }

    /// Total number of planned moves.
    pub fn len(&self) -> usize {
        self.moves().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.removals.is_empty()
    }

    /// Planned destination for `source`, if it is moved at all.
    pub fn destination_of(&self, source: &Path) -> Option<PathBuf> {
        self.moves()
            .find(|planned| planned.source == source)
            .map(PlannedMove::destination)
    }

    /// Per-category counts, sorted by category name.
    pub fn category_summary(&self) -> Vec<CategorySummary> {
        let mut stats: BTreeMap<&str, (usize, BTreeSet<i32>)> = BTreeMap::new();
        for (year, categories) in &self.buckets {
            for (category, moves) in categories {
                let entry = stats.entry(category.as_str()).or_default();
                entry.0 += moves.len();
                entry.1.insert(*year);
            }
        }

        stats
            .into_iter()
            .map(|(category, (entries, years))| CategorySummary {
                category: category.to_string(),
                entries,
                years: years.len(),
            })
            .collect()
    }

    fn push(&mut self, year: i32, category: &str, planned: PlannedMove) {
        self.buckets
            .entry(year)
            .or_default()
            .entry(category.to_string())
            .or_default()
            .push(planned);
    }
}

/// Scans `base_dir` and builds the plan.
///
/// With a resolver, same-named files headed for the same bucket (or for a
/// destination that already holds that name) are deduplicated. Without one,
/// they are all planned and the last move wins.
///
/// Per-file problems (unreadable metadata, non UTF-8 names) are logged and the
/// file is left out of the plan.
///
/// # Errors
///
/// Returns `OrganizeError::InvalidBasePath` if `base_dir` is not a readable
/// directory, and `OrganizeError::Prompt` if the resolver cannot answer.
pub fn build_plan(
    base_dir: &Path,
    rules: &CompiledRules,
    resolver: Option<&mut dyn ConflictResolver>,
    sink: &mut dyn LogSink,
) -> OrganizeResult<Plan> {
    if !base_dir.is_dir() {
        return Err(OrganizeError::InvalidBasePath {
            path: base_dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut builder = PlanBuilder {
        base_dir,
        rules,
        resolver,
        sink,
        plan: Plan::new(base_dir),
    };
    builder.scan_top_level()?;
    builder.scan_ignore_regions()?;

    let plan = builder.plan;
    builder.sink.info(&format!(
        "Planned {} moves and {} removals across {} years",
        plan.len(),
        plan.removals.len(),
        plan.buckets.len()
    ));
    Ok(plan)
}

struct PlanBuilder<'a, 'r, 's> {
    base_dir: &'a Path,
    rules: &'a CompiledRules,
    resolver: Option<&'r mut dyn ConflictResolver>,
    sink: &'s mut dyn LogSink,
    plan: Plan,
}

impl PlanBuilder<'_, '_, '_> {
    fn scan_top_level(&mut self) -> OrganizeResult<()> {
        let entries = fs::read_dir(self.base_dir).map_err(|e| OrganizeError::InvalidBasePath {
            path: self.base_dir.to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.sink.warning(&format!(
                        "Skipping unreadable entry in {}: {}",
                        self.base_dir.display(),
                        e
                    ));
                    continue;
                }
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            let rules = self.rules;

            if file_type.is_file() {
                match rules.classify(&path, false) {
                    Classification::Category(category) => self.place_file(&path, category)?,
                    Classification::Ignored => self
                        .sink
                        .warning(&format!("File {} ignored", path.display())),
                    _ => self
                        .sink
                        .debug(&format!("No category for {}", path.display())),
                }
            } else if file_type.is_dir() {
                match rules.classify(&path, true) {
                    Classification::ArchiveWhole => self.place_archive(&path),
                    Classification::Ignored => self
                        .sink
                        .warning(&format!("Directory {} ignored", path.display())),
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn scan_ignore_regions(&mut self) -> OrganizeResult<()> {
        if self.rules.ignore_paths().is_empty() {
            return Ok(());
        }

        let rules = self.rules;
        let mut walker = WalkDir::new(self.base_dir).min_depth(1).into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.sink.warning(&format!("Skipping unreadable entry: {}", e));
                    continue;
                }
            };
            let path = entry.path();
            let is_dir = entry.file_type().is_dir();
            // A file counts when it is itself excluded by an ignore path (for
            // example a top-level file named by one); a directory only below
            // one, so the region root is never archived.
            let in_region = if is_dir {
                path.parent()
                    .is_some_and(|parent| rules.in_ignore_path(parent))
            } else {
                rules.in_ignore_path(path)
            };

            if !in_region {
                // Top-level archive units are moved whole by the first scan.
                if is_dir
                    && entry.depth() == 1
                    && rules.classify(path, true) == Classification::ArchiveWhole
                {
                    walker.skip_current_dir();
                }
                continue;
            }

            if is_dir {
                self.place_archive(path);
                walker.skip_current_dir();
            } else if entry.file_type().is_file() {
                match rules.category_for(path) {
                    Some(category) => self.place_file(path, category)?,
                    None => self
                        .sink
                        .debug(&format!("No category for {}", path.display())),
                }
            }
        }

        Ok(())
    }

    /// Files `path` under `(year, category)`, deduplicating if a resolver is set.
    ///
    /// Only a failed prompt aborts; other per-file failures are logged.
    fn place_file(&mut self, path: &Path, category: &str) -> OrganizeResult<()> {
        let year = match year_of(path) {
            Ok(year) => year,
            Err(e) => {
                self.sink.error(&format!(
                    "Could not read modification time of {}: {}",
                    path.display(),
                    e
                ));
                return Ok(());
            }
        };
        self.sink
            .debug(&format!("File {} last modified in year: {}", path.display(), year));

        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            self.sink
                .warning(&format!("Skipping non UTF-8 file name {}", path.display()));
            return Ok(());
        };
        let dest_dir = self.base_dir.join(year.to_string()).join(category);

        let file_name = match self.resolve_conflict(path, year, category, &dest_dir, file_name) {
            Ok(Some(file_name)) => file_name,
            Ok(None) => return Ok(()),
            Err(e @ OrganizeError::Prompt { .. }) => return Err(e),
            Err(e) => {
                self.sink.error(&e.to_string());
                return Ok(());
            }
        };

        self.sink.debug(&format!(
            "Planned {} -> {}",
            path.display(),
            dest_dir.join(&file_name).display()
        ));
        self.plan.push(
            year,
            category,
            PlannedMove {
                source: path.to_path_buf(),
                dest_dir,
                display: file_name.clone(),
                file_name,
                kind: EntryKind::File,
            },
        );
        Ok(())
    }

    /// Files a whole directory under `(year, archive_dir)`, keyed by its path relative to the base.
    fn place_archive(&mut self, path: &Path) {
        let year = match year_of(path) {
            Ok(year) => year,
            Err(e) => {
                self.sink.error(&format!(
                    "Could not read modification time of {}: {}",
                    path.display(),
                    e
                ));
                return;
            }
        };

        let relative = match path.strip_prefix(self.base_dir) {
            Ok(relative) => relative,
            Err(_) => {
                self.sink
                    .warning(&format!("Skipping {}: outside base directory", path.display()));
                return;
            }
        };
        let (Some(display), Some(file_name)) = (
            relative.to_str(),
            relative.file_name().and_then(|name| name.to_str()),
        ) else {
            self.sink
                .warning(&format!("Skipping non UTF-8 path {}", path.display()));
            return;
        };

        let archive_root = self.base_dir.join(year.to_string()).join(ARCHIVE_BUCKET);
        let dest_dir = match relative.parent() {
            Some(parent) => archive_root.join(parent),
            None => archive_root,
        };

        self.sink.info(&format!(
            "Archiving directory {} as a whole (year {})",
            path.display(),
            year
        ));
        self.plan.push(
            year,
            ARCHIVE_BUCKET,
            PlannedMove {
                source: path.to_path_buf(),
                dest_dir,
                file_name: file_name.to_string(),
                display: display.to_string(),
                kind: EntryKind::Directory,
            },
        );
    }

    /// Returns the name to place the file under, or `None` if it is dropped.
    fn resolve_conflict(
        &mut self,
        path: &Path,
        year: i32,
        category: &str,
        dest_dir: &Path,
        file_name: &str,
    ) -> OrganizeResult<Option<String>> {
        let Some(resolver) = self.resolver.as_deref_mut() else {
            return Ok(Some(file_name.to_string()));
        };

        let placed_index = self
            .plan
            .entries(year, category)
            .iter()
            .position(|planned| planned.kind == EntryKind::File && planned.file_name == file_name);
        let existing = match placed_index {
            Some(index) => self.plan.entries(year, category)[index].source.clone(),
            None => {
                let on_disk = dest_dir.join(file_name);
                if !on_disk.is_file() {
                    return Ok(Some(file_name.to_string()));
                }
                on_disk
            }
        };

        let existing_modified = modified_time(&existing).map_err(|e| OrganizeError::Scan {
            path: existing.clone(),
            source: e,
        })?;
        let incoming_modified = modified_time(path).map_err(|e| OrganizeError::Scan {
            path: path.to_path_buf(),
            source: e,
        })?;
        let conflict = Conflict {
            existing: &existing,
            existing_modified,
            incoming: path,
            incoming_modified,
        };

        let choice = resolver
            .resolve(&conflict)
            .map_err(|source| OrganizeError::Prompt { source })?;
        let outcome = decide(choice, &conflict);

        let mut renamed_to = None;
        let placed_name = match outcome {
            DedupOutcome::Replace => {
                let loser = match placed_index {
                    Some(index) => self
                        .plan
                        .buckets
                        .get_mut(&year)
                        .and_then(|categories| categories.get_mut(category))
                        .map(|moves| moves.remove(index).source)
                        .unwrap_or_else(|| existing.clone()),
                    None => existing.clone(),
                };
                self.plan.removals.push(Removal {
                    path: loser,
                    outcome,
                });
                Some(file_name.to_string())
            }
            DedupOutcome::SkipNew | DedupOutcome::DeleteNew => {
                self.plan.removals.push(Removal {
                    path: path.to_path_buf(),
                    outcome,
                });
                None
            }
            DedupOutcome::KeepBoth => {
                let placed = self.plan.entries(year, category);
                let new_name = unique_dup_name(file_name, |candidate| {
                    placed.iter().any(|planned| planned.file_name == candidate)
                        || dest_dir.join(candidate).exists()
                });
                renamed_to = Some(new_name.clone());
                Some(new_name)
            }
        };

        self.sink.info(&format!(
            "Duplicate {} in {}/{}: {} (existing {}, incoming {})",
            file_name,
            year,
            category,
            outcome.label(),
            existing.display(),
            path.display()
        ));
        self.plan.decisions.push(DedupDecision {
            year,
            category: category.to_string(),
            existing,
            incoming: path.to_path_buf(),
            outcome,
            renamed_to,
        });

        Ok(placed_name)
    }
}
