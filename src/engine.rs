//! Ordered rule application over one document.
//!
//! Rules run strictly in the authored sequence: a later rule's matcher is
//! often the exact text an earlier rule just inserted, so sequential,
//! non-parallel application is a correctness requirement, not a style choice.

use crate::document::{DocumentError, SourceDocument};
use crate::rule::{PatchRule, RuleOutcome};
use std::path::{Path, PathBuf};

/// Minimum line similarity before a near-miss hint is worth reporting.
const NEAR_MISS_THRESHOLD: f64 = 0.6;

/// Per-rule outcome as reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStatus {
    Applied { replacements: usize },
    AlreadyApplied,
    /// Soft skip. `hint` points at the closest-looking line when the matcher
    /// was an exact literal that probably drifted (whitespace, reformatting).
    NotFound { hint: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub id: String,
    pub status: RuleStatus,
}

/// Summary of one full run against one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RunReport should be checked for per-rule outcomes"]
pub struct RunReport {
    pub file: PathBuf,
    pub fingerprint_before: u64,
    pub fingerprint_after: u64,
    /// Whether the final content differs from what was read. For read-only
    /// checks this means "would change if applied".
    pub changed: bool,
    pub rules: Vec<RuleReport>,
}

impl RunReport {
    pub fn applied_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.status, RuleStatus::Applied { .. }))
            .count()
    }
}

/// Fold an ordered rule list over a document string.
///
/// Pure: returns the final content and one report entry per rule, in order.
/// A rule that reports `NotFound` or `AlreadyApplied` leaves the document
/// byte-identical for the next rule in the sequence.
pub fn apply_to_content(content: &str, rules: &[PatchRule]) -> (String, Vec<RuleReport>) {
    let mut current = content.to_string();
    let mut reports = Vec::with_capacity(rules.len());

    for rule in rules {
        let status = match rule.apply(&current) {
            RuleOutcome::Applied {
                content,
                replacements,
            } => {
                current = content;
                RuleStatus::Applied { replacements }
            }
            RuleOutcome::AlreadyApplied => RuleStatus::AlreadyApplied,
            RuleOutcome::NotFound => RuleStatus::NotFound {
                hint: rule.anchor_text().and_then(|t| near_miss(&current, t)),
            },
        };
        reports.push(RuleReport {
            id: rule.id.clone(),
            status,
        });
    }

    (current, reports)
}

/// Read, transform, write back if anything changed.
///
/// The write is atomic at file granularity; a missing file is the only
/// condition that aborts instead of degrading to a reported skip.
pub fn patch_file(path: &Path, rules: &[PatchRule]) -> Result<RunReport, DocumentError> {
    let doc = SourceDocument::load(path)?;
    let (final_content, reports) = apply_to_content(doc.content(), rules);
    let changed = doc.write_if_changed(&final_content)?;
    Ok(build_report(&doc, &final_content, changed, reports))
}

/// Same pipeline as [`patch_file`] without the write: read-only status.
pub fn check_file(path: &Path, rules: &[PatchRule]) -> Result<RunReport, DocumentError> {
    let doc = SourceDocument::load(path)?;
    let (final_content, reports) = apply_to_content(doc.content(), rules);
    let changed = final_content != doc.content();
    Ok(build_report(&doc, &final_content, changed, reports))
}

fn build_report(
    doc: &SourceDocument,
    final_content: &str,
    changed: bool,
    rules: Vec<RuleReport>,
) -> RunReport {
    RunReport {
        file: doc.path().to_path_buf(),
        fingerprint_before: doc.fingerprint(),
        fingerprint_after: xxhash_rust::xxh3::xxh3_64(final_content.as_bytes()),
        changed,
        rules,
    }
}

/// Find the document line most similar to the first line of a missed literal.
///
/// Exact matching is the contract here — multi-line literals silently stop
/// matching when the target reformats. Rather than guessing with normalized
/// matching, point the operator at the likely drift site.
fn near_miss(doc: &str, needle: &str) -> Option<String> {
    let probe = needle.lines().find(|l| !l.trim().is_empty())?.trim();
    if probe.is_empty() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (idx, line) in doc.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let score = strsim::normalized_levenshtein(probe, line);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((idx, score));
        }
    }

    best.filter(|&(_, score)| score >= NEAR_MISS_THRESHOLD && score < 1.0)
        .map(|(idx, score)| {
            format!(
                "closest match at line {} ({:.0}% similar)",
                idx + 1,
                score * 100.0
            )
        })
}
