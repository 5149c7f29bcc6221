//! Command-line interface module for fastsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing (clap)
//! - Loading rules and resolving the base directory
//! - Simulation reports and real or test-mode runs
//! - The interactive deduplication prompt
//! - Directory statistics and default config generation
//! - Listing and editing categories in the rule file

use crate::config::{
    CategoryEdit, CompiledRules, ConfigError, DEFAULT_CONFIG_FILE, IgnorePathMode, RuleSet,
    edit_config, read_config_text, write_default_config,
};
use crate::dedup::{Conflict, ConflictResolver, DedupChoice, DedupPolicy, ForceResolver};
use crate::executor::apply_plan_with_progress;
use crate::logging::{LogSink, TracingSink, init_logging};
use crate::output::{OutputFormatter, render_report, write_report};
use crate::plan::build_plan;
use crate::stats::collect_stats;
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Sort files into Year/Category folders by extension rules.
#[derive(Debug, Parser)]
#[command(name = "fastsort", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print debug-level log lines
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also log to <BASE>_<timestamp>.log
    #[arg(short = 'l', long, global = true, value_name = "BASE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Move files into <DIR>/<year>/<category>/
    Organize {
        /// Directory to organize
        path: PathBuf,
        #[command(flatten)]
        rules: RuleArgs,
        /// Log every decision without moving or deleting anything
        #[arg(short, long)]
        test: bool,
        /// How to handle same-named files headed for the same folder
        #[arg(long, value_enum)]
        dedup: Option<DedupArg>,
    },
    /// Show the folder tree a run would produce
    Simulate {
        /// Directory to analyze
        path: PathBuf,
        #[command(flatten)]
        rules: RuleArgs,
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
        /// Entries listed per category (all by default)
        #[arg(long)]
        limit: Option<usize>,
        /// Include deduplication decisions in the plan
        #[arg(long, value_enum)]
        dedup: Option<DedupArg>,
    },
    /// Print statistics about a directory tree
    Stats {
        /// Directory to analyze
        path: PathBuf,
    },
    /// Write a default rule file
    Init {
        /// Where to write it
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List or edit the categories of a rule file
    Categories {
        /// Rule file to read or edit
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CategoryAction {
    /// List categories in declaration order
    List,
    /// Print the rule file as it is
    Show,
    /// Declare a new category
    Add {
        name: String,
        /// Extensions, space or comma separated
        #[arg(required = true, value_delimiter = ',')]
        extensions: Vec<String>,
    },
    /// Replace the extensions of a category
    Set {
        name: String,
        #[arg(required = true, value_delimiter = ',')]
        extensions: Vec<String>,
    },
    /// Delete a category
    Remove { name: String },
}

#[derive(Debug, Clone, Args)]
pub struct RuleArgs {
    /// Rule file (default: ./categories.conf, then <DIR>/categories.conf)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also match ignore paths as `*<path>*` globs (may match unrelated paths)
    #[arg(long)]
    pub loose_ignore_paths: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DedupArg {
    /// Ask for every duplicate
    Prompt,
    /// Keep the most recent file without asking
    Force,
}

impl From<DedupArg> for DedupPolicy {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::Prompt => DedupPolicy::Prompt,
            DedupArg::Force => DedupPolicy::Force,
        }
    }
}

/// Represents a CLI command to execute against a directory.
#[derive(Debug, Clone)]
pub enum OrganizeCommand {
    /// Organize files in a directory.
    Organize {
        /// If true, log every decision without touching the filesystem.
        test: bool,
        dedup: Option<DedupPolicy>,
    },
    /// Print (or save) the plan without touching the filesystem.
    Simulate {
        output: Option<PathBuf>,
        json: bool,
        limit: Option<usize>,
        dedup: Option<DedupPolicy>,
    },
    /// Print directory statistics.
    Stats,
}

/// Settings shared by every command that reads rules.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub ignore_path_mode: IgnorePathMode,
}

impl From<&RuleArgs> for RunOptions {
    fn from(args: &RuleArgs) -> Self {
        Self {
            config_path: args.config.clone(),
            ignore_path_mode: if args.loose_ignore_paths {
                IgnorePathMode::Loose
            } else {
                IgnorePathMode::Ancestor
            },
        }
    }
}

/// Entry point for the binary: sets up logging and dispatches.
pub fn run(cli: Cli) -> Result<(), String> {
    let (command, dir_path, options) = match cli.command {
        Command::Init { path, force } => {
            write_default_config(&path, force).map_err(|e| e.to_string())?;
            OutputFormatter::success(&format!("Default configuration created: {}", path.display()));
            return Ok(());
        }
        Command::Categories { config, action } => return manage_categories(&config, action),
        Command::Organize {
            path,
            rules,
            test,
            dedup,
        } => (
            OrganizeCommand::Organize {
                test,
                dedup: dedup.map(DedupPolicy::from),
            },
            path,
            RunOptions::from(&rules),
        ),
        Command::Simulate {
            path,
            rules,
            output,
            json,
            limit,
            dedup,
        } => (
            OrganizeCommand::Simulate {
                output,
                json,
                limit,
                dedup: dedup.map(DedupPolicy::from),
            },
            path,
            RunOptions::from(&rules),
        ),
        Command::Stats { path } => (OrganizeCommand::Stats, path, RunOptions::default()),
    };

    if let Some(log_path) = init_logging(cli.log_file.as_deref(), cli.verbose)? {
        OutputFormatter::info(&format!("Logging to {}", log_path.display()));
    }

    run_cli_with_options(command, &dir_path, &options, &mut TracingSink)
}

/// Runs a command with the default rule file lookup.
pub fn run_cli(command: OrganizeCommand, dir_path: &Path) -> Result<(), String> {
    run_cli_with_config(command, dir_path, None)
}

/// Runs a command with an optional explicit rule file.
pub fn run_cli_with_config(
    command: OrganizeCommand,
    dir_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), String> {
    let options = RunOptions {
        config_path: config_path.map(Path::to_path_buf),
        ..Default::default()
    };
    run_cli_with_options(command, dir_path, &options, &mut TracingSink)
}

/// Runs a command, reporting decisions to `sink`.
///
/// Rules are loaded before anything else happens, so a missing rule file
/// aborts the run before any change on disk.
pub fn run_cli_with_options(
    command: OrganizeCommand,
    dir_path: &Path,
    options: &RunOptions,
    sink: &mut dyn LogSink,
) -> Result<(), String> {
    let base_path = fs::canonicalize(dir_path)
        .map_err(|e| format!("Error reading directory {}: {}", dir_path.display(), e))?;

    match command {
        OrganizeCommand::Stats => {
            show_stats(&base_path);
            Ok(())
        }
        OrganizeCommand::Organize { test, dedup } => {
            organize_directory(&base_path, options, test, dedup, sink)
        }
        OrganizeCommand::Simulate {
            output,
            json,
            limit,
            dedup,
        } => simulate_directory(&base_path, options, output.as_deref(), json, limit, dedup, sink),
    }
}

/// Lists, prints or edits the categories of the rule file at `config_path`.
///
/// Edits rewrite only the affected lines; comments and other rules are kept.
pub fn manage_categories(config_path: &Path, action: CategoryAction) -> Result<(), String> {
    let edit = match action {
        CategoryAction::List => {
            let rules = RuleSet::load(config_path, Path::new("."))
                .map_err(|e| format!("Error loading configuration: {}", e))?;
            if rules.categories.is_empty() {
                OutputFormatter::warning("No categories declared");
            } else {
                OutputFormatter::category_table(&rules.categories);
            }
            return Ok(());
        }
        CategoryAction::Show => {
            let text = read_config_text(config_path).map_err(|e| e.to_string())?;
            OutputFormatter::header(&config_path.display().to_string());
            OutputFormatter::plain(text.trim_end());
            return Ok(());
        }
        CategoryAction::Add { name, extensions } => CategoryEdit::Add { name, extensions },
        CategoryAction::Set { name, extensions } => CategoryEdit::Set { name, extensions },
        CategoryAction::Remove { name } => CategoryEdit::Remove { name },
    };

    edit_config(config_path, &edit).map_err(|e| e.to_string())?;
    let verb = match edit {
        CategoryEdit::Add { .. } => "added",
        CategoryEdit::Set { .. } => "updated",
        CategoryEdit::Remove { .. } => "deleted",
    };
    OutputFormatter::success(&format!("Category '{}' {}", edit.name(), verb));
    Ok(())
}

/// Finds the rule file: the explicit path, else `./categories.conf`, else `<base>/categories.conf`.
fn locate_config(base_path: &Path, options: &RunOptions) -> PathBuf {
    if let Some(path) = &options.config_path {
        return path.clone();
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    base_path.join(DEFAULT_CONFIG_FILE)
}

fn load_rules(
    base_path: &Path,
    options: &RunOptions,
    sink: &mut dyn LogSink,
) -> Result<CompiledRules, String> {
    let config_path = locate_config(base_path, options);
    let rules = RuleSet::load(&config_path, base_path)
        .map_err(|e: ConfigError| format!("Error loading configuration: {}", e))?;

    sink.info(&format!(
        "Parsed {} categories, {} ignore patterns, {} ignore paths, {} archive rules from {}",
        rules.categories.len(),
        rules.ignore_patterns.len(),
        rules.ignore_paths.len(),
        rules.archive_dirs.len(),
        config_path.display()
    ));

    rules
        .compile(options.ignore_path_mode)
        .map_err(|e| format!("Error compiling rules: {}", e))
}

/// Plans and applies an organization run, with a progress bar and summary.
fn organize_directory(
    base_path: &Path,
    options: &RunOptions,
    test: bool,
    dedup: Option<DedupPolicy>,
    sink: &mut dyn LogSink,
) -> Result<(), String> {
    let rules = load_rules(base_path, options, sink)?;

    OutputFormatter::info(&format!("Organizing contents of: {}", base_path.display()));
    if test {
        OutputFormatter::test_mode_notice("No files will be moved or deleted.");
    }

    let mut force = ForceResolver;
    // Stdin is only locked when answers will actually be read.
    let mut prompt;
    let resolver: Option<&mut dyn ConflictResolver> = match dedup {
        None => None,
        Some(DedupPolicy::Force) => Some(&mut force),
        Some(DedupPolicy::Prompt) => {
            prompt = PromptResolver::stdio();
            Some(&mut prompt)
        }
    };

    let plan = build_plan(base_path, &rules, resolver, sink).map_err(|e| e.to_string())?;

    let progress = OutputFormatter::create_progress_bar((plan.len() + plan.removals.len()) as u64);
    let report = apply_plan_with_progress(&plan, !test, sink, |_| progress.inc(1));
    progress.finish_and_clear();

    OutputFormatter::summary_table(&plan.category_summary());
    if !report.removed.is_empty() {
        OutputFormatter::plain(&format!("Duplicates removed: {}", report.removed.len()));
    }

    if !report.failures.is_empty() || !report.skipped.is_empty() {
        for failure in &report.failures {
            OutputFormatter::error(&failure.to_string());
        }
        if !report.skipped.is_empty() {
            OutputFormatter::warning(&format!(
                "{} entries were not attempted",
                report.skipped.len()
            ));
        }
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    } else if test {
        OutputFormatter::success("Test completed. No files were actually moved.");
    } else {
        OutputFormatter::success("Files organized successfully!");
    }

    Ok(())
}

/// Builds the plan and prints it as a tree (or JSON) without changing anything.
fn simulate_directory(
    base_path: &Path,
    options: &RunOptions,
    output: Option<&Path>,
    json: bool,
    limit: Option<usize>,
    dedup: Option<DedupPolicy>,
    sink: &mut dyn LogSink,
) -> Result<(), String> {
    let rules = load_rules(base_path, options, sink)?;

    let mut force = ForceResolver;
    // Stdin is only locked when answers will actually be read.
    let mut prompt;
    let resolver: Option<&mut dyn ConflictResolver> = match dedup {
        None => None,
        Some(DedupPolicy::Force) => Some(&mut force),
        Some(DedupPolicy::Prompt) => {
            prompt = PromptResolver::stdio();
            Some(&mut prompt)
        }
    };

    let plan = build_plan(base_path, &rules, resolver, sink).map_err(|e| e.to_string())?;

    if json {
        let rendered = serde_json::to_string_pretty(&plan)
            .map_err(|e| format!("Could not serialize plan: {}", e))?;
        match output {
            Some(path) => fs::write(path, rendered)
                .map_err(|e| format!("Could not write plan {}: {}", path.display(), e))?,
            None => println!("{}", rendered),
        }
        return Ok(());
    }

    match output {
        // Saved reports always list every entry.
        Some(path) => {
            write_report(&plan, path)
                .map_err(|e| format!("Could not write report {}: {}", path.display(), e))?;
            OutputFormatter::success(&format!("Preview saved to {}", path.display()));
        }
        None => print!("{}", render_report(&plan, limit)),
    }

    OutputFormatter::summary_table(&plan.category_summary());
    Ok(())
}

fn show_stats(base_path: &Path) {
    OutputFormatter::info(&format!("Directory statistics for: {}", base_path.display()));
    let stats = collect_stats(base_path);
    OutputFormatter::directory_stats(&stats);
}

/// Asks on a terminal (or any reader/writer pair) how to resolve each duplicate.
///
/// Invalid answers are rejected and the question is asked again; only a
/// closed input ends the loop, as an error.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptResolver<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

impl<R: BufRead, W: Write> ConflictResolver for PromptResolver<R, W> {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> io::Result<DedupChoice> {
        writeln!(self.output, "\nDuplicate found:")?;
        writeln!(
            self.output,
            "  existing: {} (modified {})",
            conflict.existing.display(),
            format_time(conflict.existing_modified)
        )?;
        writeln!(
            self.output,
            "  incoming: {} (modified {})",
            conflict.incoming.display(),
            format_time(conflict.incoming_modified)
        )?;

        loop {
            write!(
                self.output,
                "[k]eep most recent / keep [b]oth / [d]elete duplicate: "
            )?;
            self.output.flush()?;

            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed before a choice was made",
                ));
            }

            match answer.parse::<DedupChoice>() {
                Ok(choice) => return Ok(choice),
                Err(e) => writeln!(self.output, "{}. Please answer keep, both or delete.", e)?,
            }
        }
    }
}
