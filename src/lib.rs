//! fastsort - sort a directory into Year/Category folders
//!
//! This library reads extension-based category rules from a plain-text
//! config file, classifies the top-level entries of a directory, plans where
//! each one goes (`<base>/<year>/<category>/`), optionally deduplicates
//! same-named files, and then applies the plan or only reports it.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod executor;
pub mod logging;
pub mod output;
pub mod plan;
pub mod stats;
pub mod year;

pub use classifier::{Classification, extension_of};
pub use config::{
    CategoryEdit, CategoryRule, CompiledRules, ConfigError, IgnorePathMode, RuleSet, edit_config,
};
pub use dedup::{ConflictResolver, DedupChoice, DedupOutcome, DedupPolicy, ForceResolver};
pub use executor::{ExecutionReport, OrganizeError, OrganizeResult, apply_plan, execute_plan};
pub use logging::{LogSink, MemorySink, Severity, TracingSink};
pub use plan::{Plan, PlannedMove, build_plan};
pub use year::year_of;

pub use cli::{OrganizeCommand, PromptResolver, run_cli};
