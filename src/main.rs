use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use uipatch::config::{
    apply_patch_set, check_patch_set, load_from_path, read_project_version, ApplicationError,
    PatchOutcome,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "uipatch")]
#[command(about = "Idempotent text patching for web UI source trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patch sets to a project
    Apply {
        /// Path to the project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Specific patch file to apply (otherwise applies all in patches/)
        #[arg(long)]
        patches: Option<PathBuf>,

        /// Dry run - show what would change without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Check status of patch sets without applying
    Status {
        /// Path to the project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// List available patch sets and their version constraints
    List {
        /// Path to the project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            project,
            patches,
            dry_run,
            diff,
        } => cmd_apply(project, patches, dry_run, diff),

        Commands::Status { project } => cmd_status(project),

        Commands::List { project } => cmd_list(project),
    }
}

/// Helper: Discover all .toml patch files in a patches/ directory.
///
/// Discovery order:
/// 1. `<project>/patches` (patch files kept alongside the target tree).
/// 2. `./patches` relative to the current working directory.
fn discover_patch_files(project: &Path) -> Result<Vec<PathBuf>> {
    let cwd_patches_dir = env::current_dir().ok().map(|cwd| cwd.join("patches"));
    let project_patches_dir = project.join("patches");

    let candidate_dirs: Vec<PathBuf> = std::iter::once(project_patches_dir)
        .chain(cwd_patches_dir)
        .collect();

    for patches_dir in candidate_dirs {
        if !patches_dir.exists() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&patches_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml patch files found in either ./patches or {}/patches",
        project.display()
    )
}

/// Resolve the project root using multiple detection strategies.
///
/// Priority order:
/// 1. Explicit --project flag
/// 2. UIPATCH_PROJECT environment variable
/// 3. Auto-detect by walking up from the current directory
fn resolve_project(cli_project: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_project {
        return Ok(path.canonicalize()?);
    }

    if let Ok(env_path) = env::var("UIPATCH_PROJECT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: UIPATCH_PROJECT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    if let Some(path) = auto_detect_project() {
        println!(
            "{}",
            format!("Auto-detected project: {}", path.display()).dimmed()
        );
        return Ok(path);
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find a web UI project.".red(),
        "Try one of:".bold(),
        "1. cd into the project directory: cd /path/to/frontend && uipatch apply",
        "2. Specify explicitly: uipatch apply --project /path/to/frontend",
        "3. Set environment variable: export UIPATCH_PROJECT=/path/to/frontend"
    )
}

/// Auto-detect the project by walking up from the current directory.
///
/// A directory counts as a project root when it holds a package.json next to
/// a source directory (app/, pages/ or components/).
fn auto_detect_project() -> Option<PathBuf> {
    let current = env::current_dir().ok()?;

    for ancestor in current.ancestors() {
        if !ancestor.join("package.json").exists() {
            continue;
        }

        let has_source_dir = ["app", "pages", "components"]
            .iter()
            .any(|dir| ancestor.join(dir).is_dir());

        if has_source_dir {
            return Some(ancestor.to_path_buf());
        }
    }

    None
}

/// Helper: read the project version, warning and defaulting when absent.
fn project_version_or_default(project: &Path) -> String {
    read_project_version(project).unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: Could not read project version from package.json, using 0.0.0".yellow()
        );
        "0.0.0".to_string()
    })
}

/// Helper: Show unified diff between original and patched content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(
    project: Option<PathBuf>,
    patches: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let project = resolve_project(project)?;

    let patch_files = if let Some(path) = patches {
        vec![path]
    } else {
        discover_patch_files(&project)?
    };

    let project_version = project_version_or_default(&project);

    println!("Project: {}", project.display());
    println!("Version: {}", project_version);
    println!();

    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_not_found = 0;
    let mut total_skipped = 0;
    let mut total_failed = 0;

    for patch_file in patch_files {
        println!("Loading patch set from {}...", patch_file.display());

        let set = load_from_path(&patch_file)?;

        // Capture file contents before applying (for diff output). Only the
        // files the rules touch are read.
        let mut file_contents_before: HashMap<PathBuf, String> = HashMap::new();
        if show_diff && !dry_run {
            let target_files: HashSet<PathBuf> = set
                .rules
                .iter()
                .map(|r| {
                    if set.meta.project_relative {
                        project.join(&r.file)
                    } else {
                        PathBuf::from(&r.file)
                    }
                })
                .collect();
            for file_path in target_files {
                if let Ok(content) = fs::read_to_string(&file_path) {
                    file_contents_before.insert(file_path, content);
                }
            }
        }

        let results = if dry_run {
            println!("{}", "  [DRY RUN - no files will be modified]".cyan());
            check_patch_set(&set, &project, &project_version)
        } else {
            apply_patch_set(&set, &project, &project_version)
        };

        let mut diffed_files: HashSet<PathBuf> = HashSet::new();

        for (rule_id, result) in results {
            match result {
                Ok(PatchOutcome::Applied { ref file, .. }) => {
                    if dry_run {
                        println!(
                            "{} {}: Would apply to {}",
                            "✓".green(),
                            rule_id,
                            file.display()
                        );
                    } else {
                        println!(
                            "{} {}: Applied to {}",
                            "✓".green(),
                            rule_id,
                            file.display()
                        );
                    }
                    total_applied += 1;

                    if show_diff && !dry_run && diffed_files.insert(file.clone()) {
                        // The before-map is keyed by the requested path; the
                        // applicator reports the canonical one.
                        let before = file_contents_before
                            .iter()
                            .find(|(requested, _)| {
                                requested
                                    .canonicalize()
                                    .map(|c| &c == file)
                                    .unwrap_or(false)
                            })
                            .map(|(_, content)| content);
                        if let Some(before) = before {
                            if let Ok(after) = fs::read_to_string(file) {
                                if before != &after {
                                    display_diff(file, before, &after);
                                }
                            }
                        }
                    }
                }
                Ok(PatchOutcome::AlreadyApplied { file }) => {
                    println!(
                        "{} {}: Already applied to {}",
                        "⊙".yellow(),
                        rule_id,
                        file.display()
                    );
                    total_already_applied += 1;
                }
                Ok(PatchOutcome::NotFound { file, hint }) => {
                    // Soft failure: reported, skipped, run continues.
                    println!(
                        "{} {}: Pattern not found in {}",
                        "⊘".yellow(),
                        rule_id,
                        file.display()
                    );
                    if let Some(hint) = hint {
                        println!("  {}", hint.dimmed());
                    }
                    total_not_found += 1;
                }
                Ok(PatchOutcome::SkippedVersion { reason }) => {
                    println!("{} {}: Skipped ({})", "⊘".cyan(), rule_id, reason);
                    total_skipped += 1;
                }
                Ok(PatchOutcome::Failed { file, reason }) => {
                    eprintln!("{} {}: Failed - {}", "✗".red(), rule_id, reason);
                    eprintln!("  File: {}", file.display());
                    total_failed += 1;
                }
                Err(e) => {
                    eprintln!("{} {}: Error - {}", "✗".red(), rule_id, e);
                    total_failed += 1;

                    if let ApplicationError::Safety { path, .. } = &e {
                        eprintln!("  File: {}", path.display());
                        eprintln!("  Possible causes:");
                        eprintln!("    - File was renamed, moved or deleted");
                        eprintln!("    - Patch set targets a different project layout");
                    }
                }
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!(
        "  {} already applied",
        format!("{}", total_already_applied).yellow()
    );
    println!("  {} not found", format!("{}", total_not_found).yellow());
    println!("  {} skipped", format!("{}", total_skipped).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(project: Option<PathBuf>) -> Result<()> {
    let project = resolve_project(project)?;
    let patch_files = discover_patch_files(&project)?;
    let project_version = project_version_or_default(&project);

    println!("{}", "Patch Status Report".bold());
    println!("Project: {}", project.display());
    println!("Version: {}", project_version);
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut skipped = Vec::new();

    // Read-only: does not mutate project files.
    for patch_file in patch_files {
        let set = load_from_path(&patch_file)?;
        let results = check_patch_set(&set, &project, &project_version);

        for (rule_id, result) in results {
            match result {
                Ok(PatchOutcome::Applied { .. }) => {
                    // Target found and would be changed by a real run.
                    pending.push((rule_id, "target found, not yet applied".to_string()));
                }
                Ok(PatchOutcome::AlreadyApplied { .. }) => {
                    applied.push(rule_id);
                }
                Ok(PatchOutcome::NotFound { hint, .. }) => {
                    let reason = match hint {
                        Some(hint) => format!("pattern not found; {hint}"),
                        None => "pattern not found".to_string(),
                    };
                    pending.push((rule_id, reason));
                }
                Ok(PatchOutcome::SkippedVersion { reason }) => {
                    skipped.push((rule_id, reason));
                }
                Ok(PatchOutcome::Failed { ref reason, .. }) => {
                    pending.push((rule_id, reason.clone()));
                }
                Err(ref e) => {
                    pending.push((rule_id, e.to_string()));
                }
            }
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} rules)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            pending.len()
        );
        for (id, reason) in &pending {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !skipped.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊘".cyan(),
            "SKIPPED".cyan().bold(),
            skipped.len()
        );
        for (id, reason) in &skipped {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_list(project: Option<PathBuf>) -> Result<()> {
    let project = resolve_project(project)?;
    let patch_files = discover_patch_files(&project)?;

    println!("{}", "Available patch sets:".bold());
    println!();

    for patch_file in patch_files {
        let set = load_from_path(&patch_file)?;

        println!(
            "{} ({} rules)",
            set.meta.name.bold(),
            set.rules.len()
        );
        println!("  File: {}", patch_file.display());
        if let Some(description) = &set.meta.description {
            println!("  {}", description);
        }
        if let Some(range) = &set.meta.version_range {
            println!("  Version range: {}", range.cyan());
        }
        for rule in &set.rules {
            println!("  - {} ({})", rule.id, rule.file.dimmed());
        }
        println!();
    }

    Ok(())
}
