use regex::Regex;

/// Default bounded prefix window for the import-insertion guard.
///
/// Import blocks in the targeted components live in the first screenful of
/// the file, so "already inserted" is decided by scanning only this many
/// leading lines.
pub const DEFAULT_WINDOW: usize = 20;

/// What a rule searches for.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    /// Exact literal substring.
    Literal(String),
    /// Compiled regular expression.
    Pattern(Regex),
}

impl TextMatcher {
    /// The literal anchor text, if any, for near-miss diagnostics.
    pub fn literal(&self) -> Option<&str> {
        match self {
            TextMatcher::Literal(search) => Some(search),
            TextMatcher::Pattern(_) => None,
        }
    }
}

/// The shape of a single guarded substitution.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Replace the first match (`all: false`) or every match (`all: true`)
    /// of `matcher` with `replacement`. For regex matchers the replacement
    /// may reference captures with `$name` / `$1`.
    Substitute {
        matcher: TextMatcher,
        replacement: String,
        all: bool,
    },
    /// Line-oriented variant: insert `lines` immediately after the first
    /// line containing `anchor`, skipping any line already present in the
    /// first `window` lines of the document.
    InsertAfter {
        anchor: String,
        lines: Vec<String>,
        window: usize,
    },
}

/// One guarded, idempotent substitution rule.
///
/// Rules are pure: [`PatchRule::apply`] maps a document string to an outcome
/// and never touches storage. The enclosing engine owns I/O.
#[derive(Debug, Clone)]
#[must_use = "a PatchRule does nothing until apply() is called"]
pub struct PatchRule {
    pub id: String,
    pub kind: RuleKind,
    /// Explicit guard: skip as already-applied when this marker is present.
    /// When absent, first-match substitutions fall back to "the replacement
    /// text already appears", and line insertions to "every line already sits
    /// inside the prefix window".
    pub skip_if_present: Option<String>,
}

/// Result of applying one rule to one in-memory document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RuleOutcome should be checked for applied/skipped"]
pub enum RuleOutcome {
    /// The rule fired; `content` is the new document.
    Applied {
        content: String,
        replacements: usize,
    },
    /// Guard detected the target state is already present.
    AlreadyApplied,
    /// Matcher absent from the document (soft failure, document unchanged).
    NotFound,
}

impl PatchRule {
    pub fn new(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            kind,
            skip_if_present: None,
        }
    }

    pub fn with_guard(mut self, marker: impl Into<String>) -> Self {
        self.skip_if_present = Some(marker.into());
        self
    }

    /// The text a human would look for when this rule reports "not found".
    pub fn anchor_text(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Substitute { matcher, .. } => matcher.literal(),
            RuleKind::InsertAfter { anchor, .. } => Some(anchor),
        }
    }

    /// Apply this rule to a document string.
    ///
    /// Guard check runs before any matching: a present guard signature means
    /// the rule reports [`RuleOutcome::AlreadyApplied`] without substituting,
    /// which is what makes a second run of the full sequence a no-op.
    pub fn apply(&self, doc: &str) -> RuleOutcome {
        if let Some(marker) = &self.skip_if_present {
            if doc.contains(marker.as_str()) {
                return RuleOutcome::AlreadyApplied;
            }
        }

        match &self.kind {
            RuleKind::Substitute {
                matcher,
                replacement,
                all,
            } => self.apply_substitute(doc, matcher, replacement, *all),
            RuleKind::InsertAfter {
                anchor,
                lines,
                window,
            } => apply_insert_after(doc, anchor, lines, *window),
        }
    }

    fn apply_substitute(
        &self,
        doc: &str,
        matcher: &TextMatcher,
        replacement: &str,
        all: bool,
    ) -> RuleOutcome {
        // Default guard for first-match substitutions: the replacement text
        // already appearing means a prior run inserted it. Global
        // substitutions get no such default — their replacement is usually a
        // short tail (e.g. "</option>") that legitimately occurs everywhere,
        // and zero remaining matches already makes them idempotent.
        if !all && !replacement.is_empty() && self.skip_if_present.is_none() {
            if doc.contains(replacement) {
                return RuleOutcome::AlreadyApplied;
            }
        }

        match matcher {
            TextMatcher::Literal(search) => {
                let Some((start, _)) = doc.match_indices(search.as_str()).next() else {
                    return RuleOutcome::NotFound;
                };
                if all {
                    let replacements = doc.matches(search.as_str()).count();
                    RuleOutcome::Applied {
                        content: doc.replace(search.as_str(), replacement),
                        replacements,
                    }
                } else {
                    let mut content =
                        String::with_capacity(doc.len() + replacement.len() - search.len().min(doc.len()));
                    content.push_str(&doc[..start]);
                    content.push_str(replacement);
                    content.push_str(&doc[start + search.len()..]);
                    RuleOutcome::Applied {
                        content,
                        replacements: 1,
                    }
                }
            }
            TextMatcher::Pattern(re) => {
                let replacements = re.find_iter(doc).count();
                if replacements == 0 {
                    return RuleOutcome::NotFound;
                }
                let content = if all {
                    re.replace_all(doc, replacement).into_owned()
                } else {
                    re.replace(doc, replacement).into_owned()
                };
                RuleOutcome::Applied {
                    content,
                    replacements: if all { replacements } else { 1 },
                }
            }
        }
    }
}

/// Line-oriented insertion: find the marker line, splice new lines after it.
fn apply_insert_after(doc: &str, anchor: &str, lines: &[String], window: usize) -> RuleOutcome {
    let segments: Vec<&str> = doc.split_inclusive('\n').collect();

    // Guard: a line already present anywhere in the bounded prefix window is
    // not re-inserted; if the whole set is present the rule is a no-op.
    let in_window = |needle: &str| {
        segments
            .iter()
            .take(window)
            .any(|line| line.contains(needle.trim_end()))
    };
    let missing: Vec<&String> = lines.iter().filter(|l| !in_window(l)).collect();
    if missing.is_empty() {
        return RuleOutcome::AlreadyApplied;
    }

    let Some(anchor_idx) = segments.iter().position(|line| line.contains(anchor)) else {
        return RuleOutcome::NotFound;
    };

    let mut content = String::with_capacity(doc.len() + missing.iter().map(|l| l.len() + 1).sum::<usize>());
    for (idx, segment) in segments.iter().enumerate() {
        content.push_str(segment);
        if idx == anchor_idx {
            // The anchor may be the final line of a file with no trailing
            // newline; the inserted lines still need their own lines.
            if !segment.ends_with('\n') {
                content.push('\n');
            }
            for line in &missing {
                content.push_str(line.trim_end_matches('\n'));
                content.push('\n');
            }
        }
    }

    RuleOutcome::Applied {
        content,
        replacements: missing.len(),
    }
}
