//! uipatch: Idempotent text patching for web UI source trees
//!
//! A small patching system for the kind of maintenance edit that never
//! deserves an AST: adding a tab to a page component, fixing an import
//! list, rewriting a dropdown. Rules are literal or regex substitutions
//! with guard predicates; matching is purely textual by design.
//!
//! # Architecture
//!
//! A patch run is a pipeline of pure functions over an immutable string:
//! the document is read once, an ordered list of [`PatchRule`]s is folded
//! over it in memory, and the result is written back once — only if a rule
//! actually changed something. I/O lives at the boundary
//! ([`document::SourceDocument`]), intelligence lives in the rules.
//!
//! # Safety
//!
//! - Every rule carries a guard predicate making re-runs a no-op
//! - A missing matcher degrades to a reported skip, never a hard error
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement (no edits under `node_modules`, `.git`, ...)
//!
//! # Example
//!
//! ```
//! use uipatch::{PatchRule, RuleKind, RuleOutcome, TextMatcher};
//!
//! let rule = PatchRule::new(
//!     "extend-tab-union",
//!     RuleKind::Substitute {
//!         matcher: TextMatcher::Literal("useState<'create' | 'loans'>('create')".into()),
//!         replacement: "useState<'create' | 'loans' | 'nfts'>('create')".into(),
//!         all: false,
//!     },
//! );
//!
//! match rule.apply("const [tab] = useState<'create' | 'loans'>('create')") {
//!     RuleOutcome::Applied { content, .. } => assert!(content.contains("'nfts'")),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod rule;
pub mod safety;

// Re-exports
pub use config::{
    apply_patch_set, check_patch_set, load_from_path, load_from_str, matches_requirement,
    read_project_version, ApplicationError, ConfigError, PatchOutcome, PatchSet, VersionError,
};
pub use document::{DocumentError, SourceDocument};
pub use engine::{apply_to_content, check_file, patch_file, RuleReport, RuleStatus, RunReport};
pub use rule::{PatchRule, RuleKind, RuleOutcome, TextMatcher};
pub use safety::{SafetyError, WorkspaceGuard};
