use crate::rule::{PatchRule, RuleKind, TextMatcher, DEFAULT_WINDOW};
use regex::Regex;
use serde::Deserialize;
use std::fmt;

/// One TOML patch file: metadata plus an ordered rule list.
///
/// The order of `[[rules]]` entries is the order of application — later
/// rules are allowed to anchor on text earlier rules inserted.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchSet {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Semver range checked against the target project's package.json version.
    #[serde(default)]
    pub version_range: Option<String>,
    /// When set, rule file paths resolve against the project root.
    #[serde(default)]
    pub project_relative: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    pub id: String,
    pub file: String,
    pub matcher: MatcherDef,
    pub action: ActionDef,
    #[serde(default)]
    pub guard: Option<GuardDef>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MatcherDef {
    /// Exact literal substring.
    Literal { search: String },
    /// Regular expression (Rust `regex` syntax).
    Regex { pattern: String },
    /// First line containing `anchor`; pairs with the `insert-lines` action.
    LineAnchor {
        anchor: String,
        #[serde(default = "default_window")]
        window: usize,
    },
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionDef {
    /// Replace the first match. Empty `text` deletes the match.
    Replace { text: String },
    /// Replace every match in one global pass.
    ReplaceAll { text: String },
    /// Insert lines after the anchor line (line-anchor matcher only).
    InsertLines { lines: Vec<String> },
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardDef {
    /// Skip the rule as already-applied when this marker appears anywhere
    /// in the document.
    pub skip_if_present: String,
}

impl PatchSet {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        for rule in &self.rules {
            let rule_id = || {
                if rule.id.trim().is_empty() {
                    None
                } else {
                    Some(rule.id.clone())
                }
            };

            if rule.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            }
            if rule.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: rule_id(),
                    field: "file",
                });
            }

            match &rule.matcher {
                MatcherDef::Literal { search } => {
                    if search.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: rule_id(),
                            field: "matcher.search",
                        });
                    }
                }
                MatcherDef::Regex { pattern } => {
                    if pattern.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: rule_id(),
                            field: "matcher.pattern",
                        });
                    } else if let Err(e) = Regex::new(pattern) {
                        issues.push(ValidationIssue::InvalidRegex {
                            rule_id: rule_id(),
                            message: e.to_string(),
                        });
                    }
                }
                MatcherDef::LineAnchor { anchor, window } => {
                    if anchor.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: rule_id(),
                            field: "matcher.anchor",
                        });
                    }
                    if *window == 0 {
                        issues.push(ValidationIssue::InvalidCombo {
                            rule_id: rule_id(),
                            message: "line-anchor window must be at least 1".to_string(),
                        });
                    }
                }
            }

            // Replace/replace-all text may be empty: an empty replacement is
            // how a rule deletes its match.
            match (&rule.matcher, &rule.action) {
                (MatcherDef::LineAnchor { .. }, ActionDef::InsertLines { lines }) => {
                    if lines.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: rule_id(),
                            field: "action.lines",
                        });
                    }
                }
                (MatcherDef::LineAnchor { .. }, _) => {
                    issues.push(ValidationIssue::InvalidCombo {
                        rule_id: rule_id(),
                        message: "matcher type 'line-anchor' only supports action 'insert-lines'"
                            .to_string(),
                    });
                }
                (_, ActionDef::InsertLines { .. }) => {
                    issues.push(ValidationIssue::InvalidCombo {
                        rule_id: rule_id(),
                        message: "action 'insert-lines' requires matcher type 'line-anchor'"
                            .to_string(),
                    });
                }
                _ => {}
            }

            if let Some(guard) = &rule.guard {
                if guard.skip_if_present.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        rule_id: rule_id(),
                        field: "guard.skip_if_present",
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

impl RuleDefinition {
    /// Build the runtime rule. Only fails on an invalid regex, which
    /// [`PatchSet::validate`] already rejects for loaded configs.
    pub fn compile(&self) -> Result<PatchRule, regex::Error> {
        let kind = match (&self.matcher, &self.action) {
            (MatcherDef::LineAnchor { anchor, window }, ActionDef::InsertLines { lines }) => {
                RuleKind::InsertAfter {
                    anchor: anchor.clone(),
                    lines: lines.clone(),
                    window: *window,
                }
            }
            (matcher, action) => {
                let matcher = match matcher {
                    MatcherDef::Literal { search } => TextMatcher::Literal(search.clone()),
                    MatcherDef::Regex { pattern } => TextMatcher::Pattern(Regex::new(pattern)?),
                    MatcherDef::LineAnchor { anchor, .. } => {
                        // Rejected by validate(); degrade to a literal search
                        // on the anchor so an unvalidated set still behaves.
                        TextMatcher::Literal(anchor.clone())
                    }
                };
                let (replacement, all) = match action {
                    ActionDef::Replace { text } => (text.clone(), false),
                    ActionDef::ReplaceAll { text } => (text.clone(), true),
                    ActionDef::InsertLines { lines } => (lines.join("\n"), false),
                };
                RuleKind::Substitute {
                    matcher,
                    replacement,
                    all,
                }
            }
        };

        let mut rule = PatchRule::new(&self.id, kind);
        if let Some(guard) = &self.guard {
            rule = rule.with_guard(&guard.skip_if_present);
        }
        Ok(rule)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyRuleList,
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        rule_id: Option<String>,
        message: String,
    },
    InvalidRegex {
        rule_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_id = |f: &mut fmt::Formatter<'_>, rule_id: &Option<String>, msg: &str| match rule_id
        {
            Some(id) => write!(f, "rule '{id}': {msg}"),
            None => write!(f, "{msg}"),
        };
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "patch set contains no rules"),
            ValidationIssue::MissingField { rule_id, field } => {
                with_id(f, rule_id, &format!("missing required field '{field}'"))
            }
            ValidationIssue::InvalidCombo { rule_id, message } => {
                with_id(f, rule_id, &format!("invalid configuration: {message}"))
            }
            ValidationIssue::InvalidRegex { rule_id, message } => {
                with_id(f, rule_id, &format!("invalid regex: {message}"))
            }
        }
    }
}
