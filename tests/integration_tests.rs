use chrono::{Local, TimeZone};
use fastsort::cli::{
    CategoryAction, OrganizeCommand, PromptResolver, manage_categories, run_cli, run_cli_with_config,
};
use fastsort::config::{IgnorePathMode, RuleSet};
use fastsort::dedup::{Conflict, ConflictResolver, DedupChoice, DedupOutcome, ForceResolver};
use fastsort::executor::{OrganizeError, execute_plan};
use fastsort::logging::MemorySink;
use fastsort::plan::build_plan;
use fastsort::CompiledRules;
use filetime::{FileTime, set_file_mtime};
/// Integration tests for fastsort
///
/// These tests simulate real-world usage scenarios, testing the complete
/// end-to-end functionality of the fastsort file organizer.
///
/// Test categories:
/// 1. Basic organization workflows
/// 2. Simulation and test mode
/// 3. Ignore rules, ignore paths and archive directories
/// 4. Deduplication
/// 5. Configuration and error scenarios
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture with a directory to organize and a separate directory
/// for the rule file, so the rule file is never organized itself.
struct TestFixture {
    temp_dir: TempDir,
    config_dir: TempDir,
}

impl TestFixture {
    /// Create a new test fixture with the given rule text.
    fn new(rules: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = TempDir::new().expect("Failed to create config directory");
        fs::write(config_dir.path().join("categories.conf"), rules)
            .expect("Failed to write rule file");
        TestFixture {
            temp_dir,
            config_dir,
        }
    }

    /// Get the path to the test directory.
    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("categories.conf")
    }

    /// Create a file modified in the middle of `year`. Content is the relative path.
    fn create_file(&self, rel_path: &str, year: i32) {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, rel_path).expect("Failed to write file content");
        set_mtime(&path, year, 6);
    }

    /// Create a subdirectory modified in the middle of `year`.
    fn create_subdir(&self, rel_path: &str, year: i32) {
        let path = self.path().join(rel_path);
        fs::create_dir_all(&path).expect("Failed to create subdirectory");
        set_mtime(&path, year, 6);
    }

    fn compiled_rules(&self) -> CompiledRules {
        RuleSet::load(&self.config_path(), self.path())
            .expect("Failed to load rules")
            .compile(IgnorePathMode::Ancestor)
            .expect("Failed to compile rules")
    }

    fn organize(&self) -> Result<(), String> {
        run_cli_with_config(
            OrganizeCommand::Organize {
                test: false,
                dedup: None,
            },
            self.path(),
            Some(&self.config_path()),
        )
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }

    /// Assert that a directory exists at the given relative path.
    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(
            path.exists() && path.is_dir(),
            "Directory should exist: {}",
            path.display()
        );
    }

    /// Assert that a file exists at the given relative path.
    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(
            path.exists() && path.is_file(),
            "File should exist: {}",
            path.display()
        );
    }

    /// Assert that nothing exists at the given relative path.
    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// Every file below the test directory, relative and sorted.
    fn snapshot(&self) -> Vec<String> {
        let mut files: Vec<String> = walkdir::WalkDir::new(self.path())
            .into_iter()
            .flatten()
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(self.path())
                    .ok()
                    .map(|rel| rel.to_string_lossy().to_string())
            })
            .collect();
        files.sort();
        files
    }
}

fn set_mtime(path: &Path, year: i32, month: u32) {
    let stamp = Local
        .with_ymd_and_hms(year, month, 15, 12, 0, 0)
        .single()
        .expect("Invalid local time");
    set_file_mtime(path, FileTime::from_unix_time(stamp.timestamp(), 0))
        .expect("Failed to set modification time");
}

/// Answers every conflict with the same choice and counts the questions.
struct ScriptedResolver {
    choice: DedupChoice,
    asked: usize,
}

impl ScriptedResolver {
    fn new(choice: DedupChoice) -> Self {
        Self { choice, asked: 0 }
    }
}

impl ConflictResolver for ScriptedResolver {
    fn resolve(&mut self, _conflict: &Conflict<'_>) -> io::Result<DedupChoice> {
        self.asked += 1;
        Ok(self.choice)
    }
}

// ============================================================================
// Basic Organization Workflows
// ============================================================================

#[test]
fn test_organize_by_year_and_category() {
    let fixture = TestFixture::new("Documents: pdf, txt\nignore: *.tmp\n");
    fixture.create_file("report.pdf", 2023);
    fixture.create_file("draft.tmp", 2023);
    fixture.create_file("notes.txt", 2022);

    fixture.organize().expect("Organize should succeed");

    fixture.assert_file_exists("2023/Documents/report.pdf");
    fixture.assert_file_exists("2022/Documents/notes.txt");
    fixture.assert_file_exists("draft.tmp");
    fixture.assert_file_not_exists("report.pdf");
    fixture.assert_file_not_exists("2023/Documents/draft.tmp");
}

#[test]
fn test_first_declared_category_wins() {
    let fixture = TestFixture::new("Docs: pdf\nBooks: pdf, epub\n");
    fixture.create_file("book.pdf", 2021);
    fixture.create_file("novel.epub", 2021);

    fixture.organize().expect("Organize should succeed");

    fixture.assert_file_exists("2021/Docs/book.pdf");
    fixture.assert_file_exists("2021/Books/novel.epub");
    fixture.assert_file_not_exists("2021/Books/book.pdf");
}

#[test]
fn test_unmatched_and_nested_entries_stay_put() {
    let fixture = TestFixture::new("Pictures: jpg\n");
    fixture.create_file("PHOTO.JPG", 2020);
    fixture.create_file("README", 2020);
    fixture.create_file("notes.odt", 2020);
    fixture.create_file("nested/inner.jpg", 2020);

    fixture.organize().expect("Organize should succeed");

    fixture.assert_file_exists("2020/Pictures/PHOTO.JPG");
    fixture.assert_file_exists("README");
    fixture.assert_file_exists("notes.odt");
    fixture.assert_file_exists("nested/inner.jpg");
}

#[test]
fn test_second_run_is_a_no_op() {
    let fixture = TestFixture::new("Documents: pdf\nPictures: jpg\n");
    fixture.create_file("a.pdf", 2023);
    fixture.create_file("b.jpg", 2022);

    fixture.organize().expect("First run should succeed");
    let after_first = fixture.snapshot();

    let plan = build_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        None,
        &mut MemorySink::new(),
    )
    .expect("Planning should succeed");
    assert!(plan.is_empty(), "Organized tree should plan no moves");

    fixture.organize().expect("Second run should succeed");
    assert_eq!(fixture.snapshot(), after_first);
}

// ============================================================================
// Simulation and Test Mode
// ============================================================================

#[test]
fn test_simulated_plan_matches_execution() {
    let fixture = TestFixture::new("Documents: pdf\nPictures: jpg, png\narchive_dir: OldStuff\n");
    fixture.create_file("a.pdf", 2023);
    fixture.create_file("b.png", 2021);
    fixture.create_file("OldStuff/keep.txt", 2019);
    fixture.create_subdir("OldStuff", 2019);
    let rules = fixture.compiled_rules();

    let simulated = build_plan(fixture.path(), &rules, None, &mut MemorySink::new())
        .expect("Simulation should succeed");
    assert_eq!(simulated.len(), 3);

    let (executed, report) =
        execute_plan(fixture.path(), &rules, None, true, &mut MemorySink::new())
            .expect("Execution should succeed");

    assert_eq!(simulated, executed);
    assert!(report.is_complete_success());
    for planned in simulated.moves() {
        assert!(
            planned.destination().exists(),
            "Planned destination should exist: {}",
            planned.destination().display()
        );
    }
    fixture.assert_file_exists("2019/archive_dir/OldStuff/keep.txt");

    let replanned = build_plan(fixture.path(), &rules, None, &mut MemorySink::new())
        .expect("Replanning should succeed");
    assert!(replanned.is_empty());
}

#[test]
fn test_test_mode_logs_like_a_real_run() {
    let fixture = TestFixture::new("Documents: pdf, txt\nPictures: jpg\n");
    fixture.create_file("a.pdf", 2023);
    fixture.create_file("b.txt", 2022);
    fixture.create_file("c.jpg", 2022);
    let rules = fixture.compiled_rules();
    let before = fixture.snapshot();

    let mut test_sink = MemorySink::new();
    let (_, test_report) = execute_plan(fixture.path(), &rules, None, false, &mut test_sink)
        .expect("Test mode should succeed");

    assert!(!test_report.mutated);
    assert_eq!(fixture.snapshot(), before);
    fixture.assert_file_not_exists("2023");

    let mut real_sink = MemorySink::new();
    execute_plan(fixture.path(), &rules, None, true, &mut real_sink)
        .expect("Real run should succeed");

    let mut test_lines: Vec<String> = test_sink
        .lines
        .iter()
        .map(|(_, line)| line.clone())
        .filter(|line| !line.starts_with("Running in test mode"))
        .collect();
    let mut real_lines: Vec<String> = real_sink.lines.iter().map(|(_, line)| line.clone()).collect();
    test_lines.sort();
    real_lines.sort();
    assert_eq!(test_lines, real_lines);
    assert!(test_sink.contains("Running in test mode"));
}

#[test]
fn test_cli_test_mode_moves_nothing() {
    let fixture = TestFixture::new("Documents: pdf\n");
    fixture.create_file("a.pdf", 2023);

    run_cli_with_config(
        OrganizeCommand::Organize {
            test: true,
            dedup: None,
        },
        fixture.path(),
        Some(&fixture.config_path()),
    )
    .expect("Test mode should succeed");

    fixture.assert_file_exists("a.pdf");
    fixture.assert_file_not_exists("2023");
}

#[test]
fn test_simulate_writes_report_file() {
    let fixture = TestFixture::new("Documents: pdf\n");
    fixture.create_file("report.pdf", 2023);
    let out_dir = TempDir::new().expect("Failed to create output directory");
    let report_path = out_dir.path().join("preview.txt");

    run_cli_with_config(
        OrganizeCommand::Simulate {
            output: Some(report_path.clone()),
            json: false,
            limit: None,
            dedup: None,
        },
        fixture.path(),
        Some(&fixture.config_path()),
    )
    .expect("Simulation should succeed");

    let report = fs::read_to_string(&report_path).expect("Report should be written");
    assert!(report.contains("├── 2023") || report.contains("└── 2023"));
    assert!(report.contains("Documents (1 entry)"));
    assert!(report.contains("report.pdf"));
    fixture.assert_file_exists("report.pdf");
}

#[test]
fn test_simulate_json_output() {
    let fixture = TestFixture::new("Documents: pdf\n");
    fixture.create_file("report.pdf", 2023);
    let out_dir = TempDir::new().expect("Failed to create output directory");
    let json_path = out_dir.path().join("plan.json");

    run_cli_with_config(
        OrganizeCommand::Simulate {
            output: Some(json_path.clone()),
            json: true,
            limit: None,
            dedup: None,
        },
        fixture.path(),
        Some(&fixture.config_path()),
    )
    .expect("Simulation should succeed");

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).expect("JSON should be written"))
            .expect("Output should be valid JSON");
    let entries = &value["buckets"]["2023"]["Documents"];
    assert_eq!(entries[0]["file_name"], "report.pdf");
    assert_eq!(entries[0]["kind"], "file");
}

// ============================================================================
// Ignore Rules, Ignore Paths and Archive Directories
// ============================================================================

#[test]
fn test_archive_directory_moves_as_a_unit() {
    let fixture = TestFixture::new("Documents: txt\narchive_dir: OldDownloads\n");
    fixture.create_file("OldDownloads/inner/deep.txt", 2022);
    fixture.create_file("OldDownloads/top.txt", 2022);
    fixture.create_subdir("OldDownloads", 2022);

    fixture.organize().expect("Organize should succeed");

    fixture.assert_file_exists("2022/archive_dir/OldDownloads/inner/deep.txt");
    fixture.assert_file_exists("2022/archive_dir/OldDownloads/top.txt");
    fixture.assert_file_not_exists("2022/Documents");
    fixture.assert_file_not_exists("OldDownloads");
}

#[test]
fn test_ignore_pattern_matches_directories_too() {
    let fixture = TestFixture::new("Documents: txt\nignore: node_modules, *.log\narchive_dir: node\n");
    fixture.create_file("node_modules/pkg.txt", 2022);
    fixture.create_file("build.log", 2022);

    fixture.organize().expect("Organize should succeed");

    fixture.assert_file_exists("node_modules/pkg.txt");
    fixture.assert_file_exists("build.log");
}

#[test]
fn test_ignore_path_region_is_filed_by_content() {
    let fixture = TestFixture::new("Pictures: jpg\nignore_path: Keep\n");
    fixture.create_file("Keep/photo.jpg", 2021);
    fixture.create_file("Keep/notes.xyz", 2021);
    fixture.create_file("Keep/Album/a.jpg", 2020);
    fixture.create_subdir("Keep/Album", 2020);

    fixture.organize().expect("Organize should succeed");

    fixture.assert_file_exists("2021/Pictures/photo.jpg");
    fixture.assert_file_exists("Keep/notes.xyz");
    fixture.assert_file_exists("2020/archive_dir/Keep/Album/a.jpg");
    fixture.assert_dir_exists("Keep");
}

// ============================================================================
// Deduplication
// ============================================================================

/// Two `photo.jpg` files from different sources land in the same bucket.
fn duplicate_fixture() -> TestFixture {
    let fixture = TestFixture::new("Pictures: jpg\nignore_path: Keep\n");
    fixture.create_file("photo.jpg", 2023);
    fixture.create_file("Keep/photo.jpg", 2023);
    set_mtime(&fixture.path().join("photo.jpg"), 2023, 3);
    set_mtime(&fixture.path().join("Keep/photo.jpg"), 2023, 9);
    fixture
}

#[test]
fn test_force_dedup_keeps_most_recent() {
    let fixture = duplicate_fixture();
    let rules = fixture.compiled_rules();

    let (plan, report) = execute_plan(
        fixture.path(),
        &rules,
        Some(&mut ForceResolver),
        true,
        &mut MemorySink::new(),
    )
    .expect("Organize should succeed");

    assert!(report.is_complete_success());
    assert_eq!(plan.decisions.len(), 1);
    assert_eq!(plan.decisions[0].outcome, DedupOutcome::Replace);
    assert_eq!(fixture.read("2023/Pictures/photo.jpg"), "Keep/photo.jpg");
    fixture.assert_file_not_exists("photo.jpg");
    fixture.assert_file_not_exists("Keep/photo.jpg");
    fixture.assert_file_not_exists("2023/Pictures/photo_dup.jpg");
}

#[test]
fn test_force_dedup_keeps_newer_file_that_arrived_first() {
    let fixture = duplicate_fixture();
    set_mtime(&fixture.path().join("photo.jpg"), 2023, 9);
    set_mtime(&fixture.path().join("Keep/photo.jpg"), 2023, 3);

    let (plan, report) = execute_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        Some(&mut ForceResolver),
        true,
        &mut MemorySink::new(),
    )
    .expect("Organize should succeed");

    assert!(report.is_complete_success());
    assert_eq!(plan.decisions[0].outcome, DedupOutcome::SkipNew);
    assert!(
        plan.removals
            .iter()
            .any(|removal| removal.path == fixture.path().join("Keep/photo.jpg"))
    );
    assert_eq!(fixture.read("2023/Pictures/photo.jpg"), "photo.jpg");
    fixture.assert_file_not_exists("photo.jpg");
    fixture.assert_file_not_exists("Keep/photo.jpg");
}

#[test]
fn test_force_dedup_against_organized_file() {
    let fixture = TestFixture::new("Pictures: jpg\n");
    fixture.create_file("2023/Pictures/photo.jpg", 2023);
    set_mtime(&fixture.path().join("2023/Pictures/photo.jpg"), 2023, 9);
    fixture.create_file("photo.jpg", 2023);
    set_mtime(&fixture.path().join("photo.jpg"), 2023, 2);

    let (plan, _) = execute_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        Some(&mut ForceResolver),
        true,
        &mut MemorySink::new(),
    )
    .expect("Organize should succeed");

    assert_eq!(plan.decisions[0].outcome, DedupOutcome::SkipNew);
    assert_eq!(fixture.read("2023/Pictures/photo.jpg"), "2023/Pictures/photo.jpg");
    fixture.assert_file_not_exists("photo.jpg");
}

#[test]
fn test_keep_both_avoids_existing_dup_name() {
    let fixture = TestFixture::new("Pictures: jpg\n");
    fixture.create_file("2023/Pictures/photo.jpg", 2023);
    fixture.create_file("2023/Pictures/photo_dup.jpg", 2023);
    fixture.create_file("photo.jpg", 2023);
    let mut resolver = ScriptedResolver::new(DedupChoice::KeepBoth);

    let (plan, report) = execute_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        Some(&mut resolver),
        true,
        &mut MemorySink::new(),
    )
    .expect("Organize should succeed");

    assert!(report.is_complete_success());
    assert_eq!(resolver.asked, 1);
    assert_eq!(
        plan.decisions[0].renamed_to.as_deref(),
        Some("photo_dup_dup.jpg")
    );
    assert_eq!(fixture.read("2023/Pictures/photo.jpg"), "2023/Pictures/photo.jpg");
    assert_eq!(
        fixture.read("2023/Pictures/photo_dup.jpg"),
        "2023/Pictures/photo_dup.jpg"
    );
    assert_eq!(fixture.read("2023/Pictures/photo_dup_dup.jpg"), "photo.jpg");
}

#[test]
fn test_delete_duplicate_removes_incoming() {
    let fixture = duplicate_fixture();
    let mut resolver = ScriptedResolver::new(DedupChoice::DeleteDuplicate);

    let (plan, _) = execute_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        Some(&mut resolver),
        true,
        &mut MemorySink::new(),
    )
    .expect("Organize should succeed");

    assert_eq!(plan.decisions[0].outcome, DedupOutcome::DeleteNew);
    // The top-level file is planned first; the region copy is the duplicate.
    assert_eq!(fixture.read("2023/Pictures/photo.jpg"), "photo.jpg");
    fixture.assert_file_not_exists("Keep/photo.jpg");
}

#[test]
fn test_without_dedup_same_names_are_not_compared() {
    let fixture = duplicate_fixture();

    let (plan, _) = execute_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        None,
        false,
        &mut MemorySink::new(),
    )
    .expect("Planning should succeed");

    assert!(plan.decisions.is_empty());
    assert_eq!(plan.entries(2023, "Pictures").len(), 2);
}

#[test]
fn test_closed_prompt_aborts_before_any_change() {
    let fixture = duplicate_fixture();
    fixture.create_file("report.jpg", 2022);
    let before = fixture.snapshot();
    let mut resolver = PromptResolver::new(Cursor::new(""), io::sink());

    let result = execute_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        Some(&mut resolver),
        true,
        &mut MemorySink::new(),
    );

    assert!(matches!(result, Err(OrganizeError::Prompt { .. })));
    assert_eq!(fixture.snapshot(), before);
    fixture.assert_file_not_exists("2022");
}

#[test]
fn test_prompt_answers_drive_the_plan() {
    let fixture = duplicate_fixture();
    let mut resolver = PromptResolver::new(Cursor::new("what?\nk\n"), io::sink());

    let (plan, _) = execute_plan(
        fixture.path(),
        &fixture.compiled_rules(),
        Some(&mut resolver),
        false,
        &mut MemorySink::new(),
    )
    .expect("Planning should succeed");

    assert_eq!(plan.decisions[0].outcome, DedupOutcome::Replace);
    assert_eq!(plan.removals[0].path, fixture.path().join("photo.jpg"));
}

// ============================================================================
// Configuration and Error Scenarios
// ============================================================================

#[test]
fn test_missing_config_aborts_before_any_change() {
    let fixture = TestFixture::new("Documents: pdf\n");
    fixture.create_file("a.pdf", 2023);
    let missing = fixture.config_dir.path().join("missing.conf");

    let result = run_cli_with_config(
        OrganizeCommand::Organize {
            test: false,
            dedup: None,
        },
        fixture.path(),
        Some(&missing),
    );

    let error = result.expect_err("Missing config should fail");
    assert!(error.contains("not found"), "Unexpected error: {}", error);
    fixture.assert_file_exists("a.pdf");
    fixture.assert_file_not_exists("2023");
}

#[test]
fn test_invalid_ignore_glob_is_reported() {
    let fixture = TestFixture::new("Documents: pdf\nignore: [broken\n");
    fixture.create_file("a.pdf", 2023);

    assert!(fixture.organize().is_err());
    fixture.assert_file_exists("a.pdf");
}

#[test]
fn test_nonexistent_directory() {
    let fixture = TestFixture::new("Documents: pdf\n");
    let result = run_cli_with_config(
        OrganizeCommand::Organize {
            test: false,
            dedup: None,
        },
        Path::new("/non/existent/path"),
        Some(&fixture.config_path()),
    );
    assert!(result.is_err());
}

#[test]
fn test_empty_directory() {
    let fixture = TestFixture::new("Documents: pdf\n");
    fixture.organize().expect("Organizing an empty directory should succeed");
    assert!(fixture.snapshot().is_empty());
}

#[test]
fn test_added_category_is_used_by_next_run() {
    let fixture = TestFixture::new("# personal rules\nDocuments: pdf\n");
    fixture.create_file("song.mp3", 2022);

    manage_categories(
        &fixture.config_path(),
        CategoryAction::Add {
            name: "Music".to_string(),
            extensions: vec!["mp3".to_string()],
        },
    )
    .expect("Adding a category should succeed");
    fixture.organize().expect("Organize should succeed");

    fixture.assert_file_exists("2022/Music/song.mp3");
    let text = fs::read_to_string(fixture.config_path()).expect("Failed to read rule file");
    assert!(text.starts_with("# personal rules\nDocuments: pdf\n"));
}

#[test]
fn test_stats_command() {
    let fixture = TestFixture::new("");
    fixture.create_file("a.txt", 2023);
    fixture.create_file("sub/b.jpg", 2022);

    run_cli(OrganizeCommand::Stats, fixture.path()).expect("Stats should succeed");
    fixture.assert_file_exists("a.txt");
}
