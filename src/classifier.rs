//! Path classification against compiled rules.
//!
//! Decides, for a single file or directory, whether it is ignored, archived
//! as a whole, or filed into a category.
//!
//! # Examples
//!
//! ```
//! use fastsort::classifier::Classification;
//! use fastsort::config::{IgnorePathMode, RuleSet};
//! use std::path::Path;
//!
//! let rules = RuleSet::parse("Documents: pdf\nignore: *.tmp", Path::new("/data"))
//!     .compile(IgnorePathMode::Ancestor)
//!     .unwrap();
//!
//! assert_eq!(rules.classify(Path::new("/data/report.PDF"), false), Classification::Category("Documents"));
//! assert_eq!(rules.classify(Path::new("/data/draft.tmp"), false), Classification::Ignored);
//! assert_eq!(rules.classify(Path::new("/data/song.mp3"), false), Classification::Unmatched);
//! ```

use crate::config::CompiledRules;
use std::path::Path;

/// Outcome of classifying one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    /// Matched an ignore pattern or lies inside an ignore path.
    Ignored,
    /// A directory moved as a single unit.
    ArchiveWhole,
    /// A file filed under the named category.
    Category(&'a str),
    /// No rule applies; the path is left where it is.
    Unmatched,
}

/// Returns the lowercased text after the last dot of the file name, or `""` if there is none.
///
/// ```
/// use fastsort::classifier::extension_of;
/// use std::path::Path;
///
/// assert_eq!(extension_of(Path::new("a/Photo.JPG")), "jpg");
/// assert_eq!(extension_of(Path::new("archive.tar.gz")), "gz");
/// assert_eq!(extension_of(Path::new(".bashrc")), "bashrc");
/// assert_eq!(extension_of(Path::new("Makefile")), "");
/// ```
pub fn extension_of(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

impl CompiledRules {
    /// Classifies `path`. Ignore rules are checked first, archive rules apply
    /// to directories only, category rules to files only.
    pub fn classify(&self, path: &Path, is_dir: bool) -> Classification<'_> {
        if self.matches_ignore_pattern(path) || self.in_ignore_path(path) {
            return Classification::Ignored;
        }

        if is_dir {
            return if self.is_archive_dir(path) {
                Classification::ArchiveWhole
            } else {
                Classification::Unmatched
            };
        }

        match self.category_for(path) {
            Some(name) => Classification::Category(name),
            None => Classification::Unmatched,
        }
    }

    /// Check if the full path or the base name matches any ignore glob.
    pub fn matches_ignore_pattern(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches(&full) || pattern.matches(&name))
    }

    /// Check if `path` lies inside (or is) an ignore path.
    ///
    /// In loose mode a `*<ignore_path>*` glob match on the path string also counts.
    pub fn in_ignore_path(&self, path: &Path) -> bool {
        if self.ignore_paths.iter().any(|ignore| path.starts_with(ignore)) {
            return true;
        }

        let full = path.to_string_lossy();
        self.loose_ignore_paths
            .iter()
            .any(|pattern| pattern.matches(&full))
    }

    /// Check if any archive fragment occurs in the directory's full path.
    pub fn is_archive_dir(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        self.archive_dirs
            .iter()
            .any(|fragment| full.contains(fragment.as_str()))
    }

    /// First category, in declaration order, listing the file's extension.
    pub fn category_for(&self, path: &Path) -> Option<&str> {
        let ext = extension_of(path);
        if ext.is_empty() {
            return None;
        }

        self.categories
            .iter()
            .find(|rule| rule.extensions.iter().any(|candidate| *candidate == ext))
            .map(|rule| rule.name.as_str())
    }
}
