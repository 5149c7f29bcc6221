//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored messages,
//! the progress bar used while applying a plan, summary tables, and the
//! tree-formatted simulation report.

use crate::config::CategoryRule;
use crate::plan::{CategorySummary, Plan, PlannedMove};
use crate::stats::{DirectoryStats, format_size};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fastsort::output::OutputFormatter;
    /// OutputFormatter::success("Files organized successfully!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates and returns a progress bar for file operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fastsort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints per-category counts with the number of years each spans.
    pub fn summary_table(summary: &[CategorySummary]) {
        Self::header("SUMMARY");

        let max_category_len = summary
            .iter()
            .map(|row| row.category.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {:>7} | {}",
            "Category".bold(),
            "Files".bold(),
            "Years".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 20));

        for row in summary {
            println!(
                "{:<width$} | {:>7} | {}",
                row.category,
                row.entries.to_string().green(),
                row.years.to_string().yellow(),
                width = max_category_len
            );
        }

        let total: usize = summary.iter().map(|row| row.entries).sum();
        println!("{}", "-".repeat(max_category_len + 20));
        println!(
            "{:<width$} | {:>7} | -",
            "Total".bold(),
            total.to_string().green().bold(),
            width = max_category_len
        );
    }

    /// Prints declared categories with their extension counts.
    ///
    /// Long extension lists are cut after five entries.
    pub fn category_table(categories: &[CategoryRule]) {
        Self::header("CATEGORIES");

        let width = categories
            .iter()
            .map(|rule| rule.name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {:>5} | {}",
            "Category".bold(),
            "Count".bold(),
            "Extensions".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 30));
        for rule in categories {
            println!(
                "{:<width$} | {:>5} | {}",
                rule.name.cyan(),
                rule.extensions.len().to_string().yellow(),
                preview_extensions(&rule.extensions).green(),
                width = width
            );
        }
    }

    /// Prints a test-mode notice message.
    pub fn test_mode_notice(message: &str) {
        println!("{}", format!("[TEST MODE] {}", message).yellow());
    }

    /// Prints the directory statistics tables.
    pub fn directory_stats(stats: &DirectoryStats) {
        Self::header("SUMMARY");
        println!("{:<18} {:>12}", "Total Files", stats.total_files.to_string().green());
        println!("{:<18} {:>12}", "Total Directories", stats.total_dirs.to_string().green());
        println!("{:<18} {:>12}", "Total Size", format_size(stats.total_size).green());

        if !stats.by_extension.is_empty() {
            Self::header("Top 10 File Types");
            for (ext, count) in stats.top_extensions(10) {
                let label = if ext.is_empty() { "(no extension)" } else { ext };
                println!("{:<18} {:>12}", label.cyan(), count.to_string().green());
            }
        }

        if !stats.by_year.is_empty() {
            Self::header("Files by Year");
            for (year, count) in stats.by_year.iter().rev() {
                println!("{:<18} {:>12}", year.to_string().yellow(), count.to_string().green());
            }
        }

        if !stats.largest_files.is_empty() {
            Self::header("Top 10 Largest Files");
            for (path, size) in &stats.largest_files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                println!("{:<40} {:>12}", name.cyan(), format_size(*size).green());
            }
        }
    }
}

fn preview_extensions(extensions: &[String]) -> String {
    let mut preview = extensions.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    if extensions.len() > 5 {
        preview.push_str("...");
    }
    preview
}

fn branch(last: bool) -> &'static str {
    if last { "└── " } else { "├── " }
}

fn indent(last: bool) -> &'static str {
    if last { "    " } else { "│   " }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "entry" } else { "entries" }
}

/// Renders the plan as a tree: base directory, years (newest first),
/// categories, then entries sorted by source path.
///
/// Files are shown by name, archive units by their path relative to the
/// base directory. `limit` caps the entries listed per category.
pub fn render_report(plan: &Plan, limit: Option<usize>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", plan.base_dir.display());

    if plan.buckets.is_empty() {
        let _ = writeln!(out, "└── (nothing to organize)");
    }

    let year_count = plan.buckets.len();
    for (year_index, (year, categories)) in plan.buckets.iter().rev().enumerate() {
        let last_year = year_index + 1 == year_count;
        let _ = writeln!(out, "{}{}", branch(last_year), year);
        let year_indent = indent(last_year);

        let category_count = categories.len();
        for (category_index, (category, moves)) in categories.iter().enumerate() {
            let last_category = category_index + 1 == category_count;
            let _ = writeln!(
                out,
                "{}{}{} ({} {})",
                year_indent,
                branch(last_category),
                category,
                moves.len(),
                plural(moves.len())
            );
            let entry_indent = format!("{}{}", year_indent, indent(last_category));

            let mut sorted: Vec<&PlannedMove> = moves.iter().collect();
            sorted.sort_by(|a, b| a.source.cmp(&b.source));
            let shown = limit.unwrap_or(sorted.len()).min(sorted.len());
            let hidden = sorted.len() - shown;

            for (index, planned) in sorted.iter().take(shown).enumerate() {
                let last = index + 1 == shown && hidden == 0;
                let _ = writeln!(out, "{}{}{}", entry_indent, branch(last), planned.display);
            }
            if hidden > 0 {
                let _ = writeln!(out, "{}└── ... and {} more", entry_indent, hidden);
            }
        }
    }

    if !plan.decisions.is_empty() {
        let _ = writeln!(out, "\nDuplicates:");
        for decision in &plan.decisions {
            let renamed = decision
                .renamed_to
                .as_ref()
                .map(|name| format!(" as {}", name))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {}/{}: {}{} ({} vs {})",
                decision.year,
                decision.category,
                decision.outcome.label(),
                renamed,
                decision.incoming.display(),
                decision.existing.display()
            );
        }
    }

    out
}

/// Writes the full report to `path`.
pub fn write_report(plan: &Plan, path: &Path) -> io::Result<()> {
    fs::write(path, render_report(plan, None))
}
