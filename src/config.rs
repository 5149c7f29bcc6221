//! Rule file parsing and compilation.
//!
//! This module loads the line-oriented rule file (by default `categories.conf`)
//! into a [`RuleSet`] and compiles it into [`CompiledRules`] for matching.
//!
//! # Configuration File Format
//!
//! ```text
//! # Category format: FolderName: extension1, extension2, ...
//! Documents: pdf, docx, txt
//! Pictures: jpg, png
//!
//! ignore: *.tmp, Thumbs.db
//! ignore_path: Keep, /home/me/Private
//! archive_dir: OldDownloads
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Every other line is
//! split once on the first colon. The keys `ignore`, `ignore_path` and
//! `archive_dir` are reserved (case-insensitive); any other key names a
//! category. Lines without a colon are skipped.

use glob::Pattern;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Default rule file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "categories.conf";

/// Reserved bucket name for directories moved as a single unit.
pub const ARCHIVE_BUCKET: &str = "archive_dir";

/// Rule file written by `fastsort init`.
pub const DEFAULT_CONFIG: &str = "# FAST Configuration File
# Category format: FolderName: extension1, extension2, ...

# Archives
archive_documents: pdf, doc, docx, txt, odf, xls, xlsx, ppt, pptx, md
archive_pictures: png, jpeg, jpg, gif, bmp, svg, webp, psd, tiff
archive_videos: mp4, avi, mkv, mov, flv, wmv, webm, mpeg, mpg
archive_music: mp3, wav, flac, aac, ogg, m4a, wma
archive_compressed: zip, rar, 7z, tar, gz, bz2, xz, iso
archive_scripts: py, js, ts, php, java, cpp, c, h, cs, rb

# Installers
installer_windows: exe, msi
installer_linux: deb, rpm

# Data
archive_data: json, xml, csv, sql, db

# Other
archive_books: epub, mobi, pdf, chm
archive_fonts: ttf, otf, woff, woff2

# Ignore patterns (files/directories to skip)
ignore: *.tmp, *.log, *.cache

# Paths to ignore (contents are filed under archive_dir instead)
# ignore_path: path1, path2

# Directories to archive as a whole
# archive_dir: OldDownloads
";

/// Errors that can occur while loading or compiling rules.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Rule file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Rule file exists but could not be read.
    IoError(String),
    /// An `ignore` value is not a valid glob pattern.
    InvalidGlobPattern(String),
    /// Refused to overwrite an existing rule file.
    AlreadyExists(PathBuf),
    /// `categories add` named a category that is already declared.
    CategoryExists(String),
    /// `categories set` or `remove` named an undeclared category.
    CategoryNotFound(String),
    /// A category name or extension list that cannot be written as a rule line.
    InvalidCategory(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid ignore pattern '{}'", pattern)
            }
            ConfigError::AlreadyExists(path) => write!(
                f,
                "Configuration file already exists: {} (use --force to overwrite)",
                path.display()
            ),
            ConfigError::CategoryExists(name) => write!(f, "Category '{}' already exists", name),
            ConfigError::CategoryNotFound(name) => write!(f, "Category '{}' not found", name),
            ConfigError::InvalidCategory(msg) => write!(f, "Invalid category: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A named folder and the extensions filed into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRule {
    /// Folder name, case-sensitive.
    pub name: String,
    /// Extensions without the leading dot, in declaration order.
    pub extensions: Vec<String>,
}

/// How `ignore_path` entries are matched against candidate paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IgnorePathMode {
    /// The ignore path must be a component-wise ancestor of (or equal to) the candidate.
    #[default]
    Ancestor,
    /// Ancestor containment, or a `*<ignore_path>*` glob match on the path string.
    ///
    /// This also matches unrelated paths that merely share a substring,
    /// e.g. ignore path `/data/Keep` matches `/data/Keeper/file.txt`.
    Loose,
}

/// Parsed rules, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub categories: Vec<CategoryRule>,
    pub ignore_patterns: Vec<String>,
    pub ignore_paths: Vec<PathBuf>,
    pub archive_dirs: Vec<String>,
}

impl RuleSet {
    /// Loads rules from `config_path`, resolving `ignore_path` values against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file does not exist and
    /// `ConfigError::IoError` if it cannot be read.
    pub fn load(config_path: &Path, base_dir: &Path) -> Result<Self, ConfigError> {
        let content = read_config_text(config_path)?;
        Ok(Self::parse(&content, base_dir))
    }

    /// Parses rule text. Never fails: malformed lines are skipped.
    pub fn parse(text: &str, base_dir: &Path) -> Self {
        let mut rules = RuleSet::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, values)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let values = values
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);

            match key.to_lowercase().as_str() {
                "ignore" => rules.ignore_patterns.extend(values),
                "ignore_path" => rules
                    .ignore_paths
                    .extend(values.map(|value| resolve_against(base_dir, &value))),
                "archive_dir" => rules.archive_dirs.extend(values),
                _ if key.is_empty() => {}
                _ => rules.add_category(key, values),
            }
        }

        rules
    }

    /// Registers a category, appending to an earlier declaration of the same name.
    fn add_category(&mut self, name: &str, values: impl Iterator<Item = String>) {
        match self.categories.iter_mut().find(|rule| rule.name == name) {
            Some(rule) => rule.extensions.extend(values),
            None => self.categories.push(CategoryRule {
                name: name.to_string(),
                extensions: values.collect(),
            }),
        }
    }

    /// Compiles the rules for matching.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGlobPattern` if an `ignore` value is not a valid glob.
    pub fn compile(self, ignore_path_mode: IgnorePathMode) -> Result<CompiledRules, ConfigError> {
        CompiledRules::new(self, ignore_path_mode)
    }
}

/// Resolves `value` to an absolute, lexically normalized path under `base_dir`.
///
/// Absolute values are kept as they are (apart from normalization).
fn resolve_against(base_dir: &Path, value: &str) -> PathBuf {
    let joined = base_dir.join(value);
    let absolute = std::path::absolute(&joined).unwrap_or(joined);
    normalize(&absolute)
}

/// Removes `.` components and folds `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Writes [`DEFAULT_CONFIG`] to `path`.
///
/// # Errors
///
/// Returns `ConfigError::AlreadyExists` if the file exists and `force` is false.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    fs::write(path, DEFAULT_CONFIG).map_err(|e| ConfigError::IoError(e.to_string()))
}

/// Reads the raw rule file text.
///
/// # Errors
///
/// Returns `ConfigError::ConfigNotFound` if the file does not exist and
/// `ConfigError::IoError` if it cannot be read.
pub fn read_config_text(config_path: &Path) -> Result<String, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::ConfigNotFound(config_path.to_path_buf()));
    }
    fs::read_to_string(config_path).map_err(|e| ConfigError::IoError(e.to_string()))
}

const RESERVED_KEYS: [&str; 3] = ["ignore", "ignore_path", "archive_dir"];

/// A change to the category lines of a rule file.
///
/// Edits rewrite only the lines declaring the named category; comments,
/// blank lines and every other rule are kept byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryEdit {
    /// Append `name: ext, ...`. The category must not exist yet.
    Add { name: String, extensions: Vec<String> },
    /// Replace the extensions of an existing category. When the category is
    /// declared on several lines, the first becomes the new line and the
    /// others are dropped.
    Set { name: String, extensions: Vec<String> },
    /// Delete every line declaring the category.
    Remove { name: String },
}

impl CategoryEdit {
    pub fn name(&self) -> &str {
        match self {
            Self::Add { name, .. } | Self::Set { name, .. } | Self::Remove { name } => name,
        }
    }

    /// Applies the edit to rule file text and returns the new text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidCategory` for a reserved or malformed name
    /// or an empty extension list, `ConfigError::CategoryExists` when adding a
    /// declared category, and `ConfigError::CategoryNotFound` when changing an
    /// undeclared one.
    pub fn apply(&self, text: &str) -> Result<String, ConfigError> {
        let name = self.name();
        validate_category_name(name)?;

        let declared = text.lines().any(|line| declares_category(line, name));
        match self {
            Self::Add { extensions, .. } => {
                if declared {
                    return Err(ConfigError::CategoryExists(name.to_string()));
                }
                let line = category_line(name, extensions)?;
                let mut out = text.to_string();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&line);
                out.push('\n');
                Ok(out)
            }
            Self::Set { extensions, .. } => {
                if !declared {
                    return Err(ConfigError::CategoryNotFound(name.to_string()));
                }
                let line = category_line(name, extensions)?;
                let mut replaced = false;
                let mut out = String::with_capacity(text.len());
                for original in text.split_inclusive('\n') {
                    if !declares_category(original, name) {
                        out.push_str(original);
                    } else if !replaced {
                        replaced = true;
                        out.push_str(&line);
                        if original.ends_with('\n') {
                            out.push('\n');
                        }
                    }
                }
                Ok(out)
            }
            Self::Remove { .. } => {
                if !declared {
                    return Err(ConfigError::CategoryNotFound(name.to_string()));
                }
                Ok(text
                    .split_inclusive('\n')
                    .filter(|original| !declares_category(original, name))
                    .collect())
            }
        }
    }
}

/// Applies `edit` to the rule file at `config_path` in place.
///
/// # Errors
///
/// Returns any error of [`read_config_text`] or [`CategoryEdit::apply`], and
/// `ConfigError::IoError` if the file cannot be written back.
pub fn edit_config(config_path: &Path, edit: &CategoryEdit) -> Result<(), ConfigError> {
    let text = read_config_text(config_path)?;
    let updated = edit.apply(&text)?;
    fs::write(config_path, updated).map_err(|e| ConfigError::IoError(e.to_string()))
}

fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() || name.trim() != name {
        return Err(ConfigError::InvalidCategory(format!(
            "'{}' must be non-empty without surrounding spaces",
            name
        )));
    }
    if name.contains(':') || name.starts_with('#') {
        return Err(ConfigError::InvalidCategory(format!(
            "'{}' must not contain ':' or start with '#'",
            name
        )));
    }
    if RESERVED_KEYS.contains(&name.to_lowercase().as_str()) {
        return Err(ConfigError::InvalidCategory(format!("'{}' is a reserved key", name)));
    }
    Ok(())
}

fn category_line(name: &str, extensions: &[String]) -> Result<String, ConfigError> {
    let extensions: Vec<&str> = extensions
        .iter()
        .map(|ext| ext.trim())
        .filter(|ext| !ext.is_empty())
        .collect();
    if extensions.is_empty() {
        return Err(ConfigError::InvalidCategory(format!(
            "'{}' needs at least one extension",
            name
        )));
    }
    if let Some(bad) = extensions.iter().find(|ext| ext.contains(',')) {
        return Err(ConfigError::InvalidCategory(format!(
            "extension '{}' must not contain ','",
            bad
        )));
    }
    Ok(format!("{}: {}", name, extensions.join(", ")))
}

/// True if `line` is a rule line whose key is exactly the category `name`.
fn declares_category(line: &str, name: &str) -> bool {
    let line = line.trim();
    if line.starts_with('#') {
        return false;
    }
    line.split_once(':')
        .is_some_and(|(key, _)| key.trim() == name)
}

/// Rules pre-processed for matching.
///
/// Glob patterns are compiled once and category extensions are lowercased,
/// so matching never reparses rule text.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub(crate) categories: Vec<CategoryRule>,
    pub(crate) ignore_patterns: Vec<Pattern>,
    pub(crate) ignore_paths: Vec<PathBuf>,
    pub(crate) loose_ignore_paths: Vec<Pattern>,
    pub(crate) archive_dirs: Vec<String>,
}

impl CompiledRules {
    fn new(rules: RuleSet, ignore_path_mode: IgnorePathMode) -> Result<Self, ConfigError> {
        let ignore_patterns = rules
            .ignore_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let loose_ignore_paths = match ignore_path_mode {
            IgnorePathMode::Ancestor => Vec::new(),
            IgnorePathMode::Loose => rules
                .ignore_paths
                .iter()
                .filter_map(|path| loose_pattern(&path.to_string_lossy()))
                .collect(),
        };

        let categories = rules
            .categories
            .into_iter()
            .map(|rule| CategoryRule {
                name: rule.name,
                extensions: rule
                    .extensions
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_lowercase())
                    .collect(),
            })
            .collect();

        Ok(Self {
            categories,
            ignore_patterns,
            ignore_paths: rules.ignore_paths,
            loose_ignore_paths,
            archive_dirs: rules.archive_dirs,
        })
    }

    /// Category rules with lowercased extensions, in declaration order.
    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    /// Resolved ignore paths.
    pub fn ignore_paths(&self) -> &[PathBuf] {
        &self.ignore_paths
    }
}

/// Builds `*<path>*`, treating the path as a glob where it is one and as literal text otherwise.
fn loose_pattern(path: &str) -> Option<Pattern> {
    Pattern::new(&format!("*{}*", path))
        .or_else(|_| Pattern::new(&format!("*{}*", Pattern::escape(path))))
        .ok()
}
