pub mod applicator;
pub mod loader;
pub mod schema;
pub mod version;

pub use applicator::{apply_patch_set, check_patch_set, ApplicationError, PatchOutcome};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    ActionDef, GuardDef, MatcherDef, Metadata, PatchSet, RuleDefinition, ValidationError,
    ValidationIssue,
};
pub use version::{matches_requirement, read_project_version, VersionError};
