//! Directory statistics.
//!
//! Walks a directory tree and reports file counts, total size, the most
//! common extensions, files per modification year, and the largest files.

use crate::classifier::extension_of;
use crate::year::year_of;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Number of largest files kept.
const LARGEST_FILES: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryStats {
    pub total_files: usize,
    pub total_dirs: usize,
    pub total_size: u64,
    /// Counts per lowercased extension. Files without one are not counted here.
    pub by_extension: HashMap<String, usize>,
    pub by_year: BTreeMap<i32, usize>,
    /// Largest files, biggest first.
    pub largest_files: Vec<(PathBuf, u64)>,
}

impl DirectoryStats {
    /// The `n` most common extensions, most common first; ties by name.
    pub fn top_extensions(&self, n: usize) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .by_extension
            .iter()
            .map(|(ext, count)| (ext.as_str(), *count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        counts.truncate(n);
        counts
    }
}

/// Collects statistics for everything below `root`.
///
/// Entries that cannot be read are skipped.
pub fn collect_stats(root: &Path) -> DirectoryStats {
    let mut stats = DirectoryStats::default();
    let mut sizes: Vec<(PathBuf, u64)> = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).into_iter().flatten() {
        if entry.file_type().is_dir() {
            stats.total_dirs += 1;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(year) = year_of(entry.path()) else {
            continue;
        };

        stats.total_files += 1;
        stats.total_size += metadata.len();

        let ext = extension_of(entry.path());
        if !ext.is_empty() {
            *stats.by_extension.entry(ext).or_insert(0) += 1;
        }
        *stats.by_year.entry(year).or_insert(0) += 1;
        sizes.push((entry.into_path(), metadata.len()));
    }

    sizes.sort_by(|a, b| b.1.cmp(&a.1));
    sizes.truncate(LARGEST_FILES);
    stats.largest_files = sizes;
    stats
}

/// Formats a byte count with two decimals, e.g. `1.50 KB`.
///
/// ```
/// use fastsort::stats::format_size;
///
/// assert_eq!(format_size(512), "512.00 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_stats() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "12345").unwrap();
        fs::write(root.join("b.TXT"), "1").unwrap();
        fs::write(root.join("sub").join("c.jpg"), "1234567890").unwrap();
        fs::write(root.join("Makefile"), "").unwrap();

        let stats = collect_stats(root);

        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.total_dirs, 1);
        assert_eq!(stats.total_size, 16);
        assert_eq!(stats.top_extensions(10), vec![("txt", 2), ("jpg", 1)]);
        assert_eq!(stats.by_year.values().sum::<usize>(), 4);
        assert_eq!(stats.largest_files[0].0, root.join("sub").join("c.jpg"));
        assert_eq!(stats.largest_files[0].1, 10);
    }

    #[test]
    fn test_format_size_large_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1024u64.pow(5)), "1.00 PB");
    }
}
