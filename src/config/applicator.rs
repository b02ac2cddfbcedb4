//! Patch set applicator.
//!
//! Takes a loaded [`PatchSet`] and a project root, and:
//! - filters the whole set by its semver `version_range`
//! - validates every target path against the workspace guard
//! - groups rules by file (authored order preserved within a file) so each
//!   file is read and written at most once
//! - runs the engine per file and reports one result per rule

use crate::config::schema::{PatchSet, RuleDefinition};
use crate::config::version::{matches_requirement, VersionError};
use crate::engine::{self, RuleStatus};
use crate::rule::PatchRule;
use crate::safety::WorkspaceGuard;
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of applying a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for success/failure"]
pub enum PatchOutcome {
    /// The rule fired and changed the document.
    Applied { file: PathBuf, replacements: usize },
    /// Guard detected the target state is already present.
    AlreadyApplied { file: PathBuf },
    /// Matcher absent: soft, reported, non-fatal.
    NotFound { file: PathBuf, hint: Option<String> },
    /// Whole set skipped by version constraint.
    SkippedVersion { reason: String },
    /// The rule could not run (bad regex in a hand-built set, etc.).
    Failed { file: PathBuf, reason: String },
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Applied { file, replacements } => {
                if *replacements > 1 {
                    write!(f, "Applied to {} ({} replacements)", file.display(), replacements)
                } else {
                    write!(f, "Applied to {}", file.display())
                }
            }
            PatchOutcome::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
            PatchOutcome::NotFound { file, hint } => match hint {
                Some(hint) => write!(f, "Pattern not found in {} ({})", file.display(), hint),
                None => write!(f, "Pattern not found in {}", file.display()),
            },
            PatchOutcome::SkippedVersion { reason } => {
                write!(f, "Skipped (version): {}", reason)
            }
            PatchOutcome::Failed { file, reason } => {
                write!(f, "Failed on {}: {}", file.display(), reason)
            }
        }
    }
}

/// Errors during patch application.
///
/// Kept `Clone` so one file-level failure can fan out to every rule that
/// targets the file.
#[derive(Debug, Clone)]
pub enum ApplicationError {
    /// Version filtering error
    Version(VersionError),
    /// Target path rejected by the workspace guard (outside project,
    /// generated directory, or missing — the only hard abort condition)
    Safety { path: PathBuf, reason: String },
    /// File read/write error
    Document { path: PathBuf, reason: String },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Version(e) => write!(f, "version error: {}", e),
            ApplicationError::Safety { path, reason } => {
                write!(f, "refusing to patch {}: {}", path.display(), reason)
            }
            ApplicationError::Document { path, reason } => {
                write!(f, "I/O error on {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Version(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VersionError> for ApplicationError {
    fn from(e: VersionError) -> Self {
        ApplicationError::Version(e)
    }
}

type RuleResults = Vec<(String, Result<PatchOutcome, ApplicationError>)>;

/// Apply a patch set to a project.
///
/// Returns one result per rule, in authored order. Soft conditions
/// ("already applied", "pattern not found") come back as `Ok`; only
/// version errors and file-level failures are `Err`.
pub fn apply_patch_set(
    set: &PatchSet,
    project_root: &Path,
    project_version: &str,
) -> RuleResults {
    run_patch_set(set, project_root, project_version, true)
}

/// Same pipeline as [`apply_patch_set`] without the write-back: read-only
/// status that reports what a real run would do.
pub fn check_patch_set(
    set: &PatchSet,
    project_root: &Path,
    project_version: &str,
) -> RuleResults {
    run_patch_set(set, project_root, project_version, false)
}

fn run_patch_set(
    set: &PatchSet,
    project_root: &Path,
    project_version: &str,
    write: bool,
) -> RuleResults {
    match matches_requirement(project_version, set.meta.version_range.as_deref()) {
        Ok(true) => run_batched(set, project_root, write),
        Ok(false) => {
            let req = set.meta.version_range.as_deref().unwrap_or("").trim();
            let reason = format!(
                "project version {project_version} does not satisfy version_range {req}"
            );
            set.rules
                .iter()
                .map(|rule| {
                    (
                        rule.id.clone(),
                        Ok(PatchOutcome::SkippedVersion {
                            reason: reason.clone(),
                        }),
                    )
                })
                .collect()
        }
        Err(e) => set
            .rules
            .iter()
            .map(|rule| (rule.id.clone(), Err(ApplicationError::Version(e.clone()))))
            .collect(),
    }
}

fn run_batched(set: &PatchSet, project_root: &Path, write: bool) -> RuleResults {
    let guard = match WorkspaceGuard::new(project_root) {
        Ok(guard) => guard,
        Err(e) => {
            let error = ApplicationError::Safety {
                path: project_root.to_path_buf(),
                reason: e.to_string(),
            };
            return set
                .rules
                .iter()
                .map(|rule| (rule.id.clone(), Err(error.clone())))
                .collect();
        }
    };

    // Group by target file, keeping authored order within each file; the
    // original index restores the overall authored order at the end.
    let mut rules_by_file: Vec<(String, Vec<(usize, &RuleDefinition)>)> = Vec::new();
    for (idx, rule) in set.rules.iter().enumerate() {
        match rules_by_file.iter_mut().find(|(file, _)| file == &rule.file) {
            Some((_, group)) => group.push((idx, rule)),
            None => rules_by_file.push((rule.file.clone(), vec![(idx, rule)])),
        }
    }

    let mut all_results: Vec<(usize, String, Result<PatchOutcome, ApplicationError>)> = Vec::new();

    for (file, group) in rules_by_file {
        let requested = if set.meta.project_relative {
            project_root.join(&file)
        } else {
            PathBuf::from(&file)
        };

        // Missing files fail canonicalization here: the only hard failure.
        let path = match guard.validate_path(&requested) {
            Ok(path) => path,
            Err(e) => {
                let error = ApplicationError::Safety {
                    path: requested.clone(),
                    reason: e.to_string(),
                };
                for (idx, rule) in group {
                    all_results.push((idx, rule.id.clone(), Err(error.clone())));
                }
                continue;
            }
        };

        let mut compiled: Vec<(usize, &RuleDefinition, PatchRule)> = Vec::new();
        for (idx, rule) in group {
            match rule.compile() {
                Ok(compiled_rule) => compiled.push((idx, rule, compiled_rule)),
                Err(e) => all_results.push((
                    idx,
                    rule.id.clone(),
                    Ok(PatchOutcome::Failed {
                        file: path.clone(),
                        reason: format!("invalid regex: {e}"),
                    }),
                )),
            }
        }
        if compiled.is_empty() {
            continue;
        }

        let rules: Vec<PatchRule> = compiled.iter().map(|(_, _, r)| r.clone()).collect();
        let report = if write {
            engine::patch_file(&path, &rules)
        } else {
            engine::check_file(&path, &rules)
        };

        match report {
            Ok(report) => {
                for ((idx, def, _), rule_report) in compiled.iter().zip(report.rules.iter()) {
                    let outcome = match &rule_report.status {
                        RuleStatus::Applied { replacements } => PatchOutcome::Applied {
                            file: path.clone(),
                            replacements: *replacements,
                        },
                        RuleStatus::AlreadyApplied => PatchOutcome::AlreadyApplied {
                            file: path.clone(),
                        },
                        RuleStatus::NotFound { hint } => PatchOutcome::NotFound {
                            file: path.clone(),
                            hint: hint.clone(),
                        },
                    };
                    all_results.push((*idx, def.id.clone(), Ok(outcome)));
                }
            }
            Err(e) => {
                let error = ApplicationError::Document {
                    path: path.clone(),
                    reason: e.to_string(),
                };
                for (idx, def, _) in &compiled {
                    all_results.push((*idx, def.id.clone(), Err(error.clone())));
                }
            }
        }
    }

    all_results.sort_by_key(|(idx, _, _)| *idx);
    all_results
        .into_iter()
        .map(|(_, id, result)| (id, result))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ActionDef, MatcherDef, Metadata};
    use std::fs;

    fn rule(id: &str, file: &str, search: &str, text: &str) -> RuleDefinition {
        RuleDefinition {
            id: id.to_string(),
            file: file.to_string(),
            matcher: MatcherDef::Literal {
                search: search.to_string(),
            },
            action: ActionDef::Replace {
                text: text.to_string(),
            },
            guard: None,
        }
    }

    fn set(rules: Vec<RuleDefinition>) -> PatchSet {
        PatchSet {
            meta: Metadata {
                name: "test".to_string(),
                description: None,
                version_range: None,
                project_relative: true,
            },
            rules,
        }
    }

    #[test]
    fn test_apply_empty_set() {
        let temp_dir = tempfile::tempdir().unwrap();
        let results = apply_patch_set(&set(vec![]), temp_dir.path(), "0.1.0");
        assert!(results.is_empty());
    }

    #[test]
    fn test_apply_and_reapply() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("page.tsx");
        fs::write(&file, "state = A\n").unwrap();

        let config = set(vec![rule("r1", "page.tsx", "state = A", "state = B")]);

        let results = apply_patch_set(&config, temp_dir.path(), "0.1.0");
        assert!(matches!(
            results[0].1,
            Ok(PatchOutcome::Applied { .. })
        ));
        assert_eq!(fs::read_to_string(&file).unwrap(), "state = B\n");

        let results = apply_patch_set(&config, temp_dir.path(), "0.1.0");
        assert!(matches!(
            results[0].1,
            Ok(PatchOutcome::AlreadyApplied { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_hard_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = set(vec![rule("r1", "missing.tsx", "a", "b")]);

        let results = apply_patch_set(&config, temp_dir.path(), "0.1.0");
        assert!(matches!(
            results[0].1,
            Err(ApplicationError::Safety { .. })
        ));
    }

    #[test]
    fn test_version_range_skips_whole_set() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("page.tsx");
        fs::write(&file, "state = A\n").unwrap();

        let mut config = set(vec![rule("r1", "page.tsx", "state = A", "state = B")]);
        config.meta.version_range = Some(">=0.2.0".to_string());

        let results = apply_patch_set(&config, temp_dir.path(), "0.1.0");
        assert!(matches!(
            results[0].1,
            Ok(PatchOutcome::SkippedVersion { .. })
        ));
        // Untouched.
        assert_eq!(fs::read_to_string(&file).unwrap(), "state = A\n");
    }

    #[test]
    fn test_check_does_not_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("page.tsx");
        fs::write(&file, "state = A\n").unwrap();

        let config = set(vec![rule("r1", "page.tsx", "state = A", "state = B")]);

        let results = check_patch_set(&config, temp_dir.path(), "0.1.0");
        assert!(matches!(results[0].1, Ok(PatchOutcome::Applied { .. })));
        assert_eq!(fs::read_to_string(&file).unwrap(), "state = A\n");
    }

    #[test]
    fn test_results_restore_authored_order_across_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.tsx"), "one\n").unwrap();
        fs::write(temp_dir.path().join("b.tsx"), "two\n").unwrap();

        let config = set(vec![
            rule("first", "a.tsx", "one", "1"),
            rule("second", "b.tsx", "two", "2"),
            rule("third", "a.tsx", "1", "uno"),
        ]);

        let results = apply_patch_set(&config, temp_dir.path(), "0.1.0");
        let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        assert_eq!(fs::read_to_string(temp_dir.path().join("a.tsx")).unwrap(), "uno\n");
    }

    #[test]
    fn test_soft_not_found_does_not_block_later_rules() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("page.tsx");
        fs::write(&file, "state = A\n").unwrap();

        let config = set(vec![
            rule("miss", "page.tsx", "no-such-anchor", "x"),
            rule("hit", "page.tsx", "state = A", "state = B"),
        ]);

        let results = apply_patch_set(&config, temp_dir.path(), "0.1.0");
        assert!(matches!(results[0].1, Ok(PatchOutcome::NotFound { .. })));
        assert!(matches!(results[1].1, Ok(PatchOutcome::Applied { .. })));
        assert_eq!(fs::read_to_string(&file).unwrap(), "state = B\n");
    }

    #[test]
    fn test_outcome_display() {
        let applied = PatchOutcome::Applied {
            file: PathBuf::from("/tmp/page.tsx"),
            replacements: 1,
        };
        assert!(applied.to_string().contains("Applied"));

        let already = PatchOutcome::AlreadyApplied {
            file: PathBuf::from("/tmp/page.tsx"),
        };
        assert!(already.to_string().contains("Already applied"));

        let not_found = PatchOutcome::NotFound {
            file: PathBuf::from("/tmp/page.tsx"),
            hint: Some("closest match at line 3 (87% similar)".to_string()),
        };
        assert!(not_found.to_string().contains("not found"));
        assert!(not_found.to_string().contains("line 3"));

        let skipped = PatchOutcome::SkippedVersion {
            reason: "version too old".to_string(),
        };
        assert!(skipped.to_string().contains("Skipped"));
    }
}
