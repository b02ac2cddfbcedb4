//! Version filtering for patch sets using semver constraints.
//!
//! Patch sets can declare a `version_range` like ">=0.1.0, <0.3.0" in their
//! metadata; the range is checked against the target project's version as
//! declared in its `package.json`.

use semver::{Version, VersionReq};
use std::fmt;
use std::fs;
use std::path::Path;

/// Errors during version filtering
#[derive(Debug, Clone)]
pub enum VersionError {
    /// Invalid version string (e.g., "not-a-version")
    InvalidVersion { value: String, source: String },
    /// Invalid version requirement (e.g., ">=bad")
    InvalidRequirement { value: String, source: String },
    /// package.json missing, unreadable, or without a usable version field
    Manifest { path: String, reason: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid version '{}': {}", value, source)
            }
            VersionError::InvalidRequirement { value, source } => {
                write!(f, "invalid version requirement '{}': {}", value, source)
            }
            VersionError::Manifest { path, reason } => {
                write!(f, "cannot read project version from {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// Read the project version from `<project_root>/package.json`.
pub fn read_project_version(project_root: &Path) -> Result<String, VersionError> {
    let manifest_path = project_root.join("package.json");
    let manifest = |reason: String| VersionError::Manifest {
        path: manifest_path.display().to_string(),
        reason,
    };

    let contents = fs::read_to_string(&manifest_path).map_err(|e| manifest(e.to_string()))?;
    let json: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| manifest(e.to_string()))?;

    json.get("version")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| manifest("no string 'version' field".to_string()))
}

/// Check if a version matches a requirement string.
///
/// # Examples
///
/// ```
/// use uipatch::config::version::matches_requirement;
///
/// assert!(matches_requirement("0.1.0", Some(">=0.1.0")).unwrap());
/// assert!(matches_requirement("0.2.0", Some(">=0.1.0, <0.3.0")).unwrap());
/// assert!(!matches_requirement("0.0.9", Some(">=0.1.0")).unwrap());
///
/// // None requirement means "apply to all versions"
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    // No requirement, or a blank one, means "apply to all versions"
    let Some(req_str) = requirement else {
        return Ok(true);
    };
    let req_str = req_str.trim();
    if req_str.is_empty() {
        return Ok(true);
    }

    let version = Version::parse(version).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        source: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        source: e.to_string(),
    })?;

    Ok(req.matches(&version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_requirement() {
        assert!(matches_requirement("0.1.0", None).unwrap());
        assert!(matches_requirement("1.0.0", None).unwrap());
    }

    #[test]
    fn test_empty_requirement() {
        assert!(matches_requirement("0.1.0", Some("")).unwrap());
        assert!(matches_requirement("1.0.0", Some("   ")).unwrap());
    }

    #[test]
    fn test_simple_requirement() {
        assert!(matches_requirement("0.1.0", Some("=0.1.0")).unwrap());
        assert!(!matches_requirement("0.1.1", Some("=0.1.0")).unwrap());

        assert!(matches_requirement("0.2.0", Some(">=0.1.0")).unwrap());
        assert!(!matches_requirement("0.0.9", Some(">=0.1.0")).unwrap());

        assert!(matches_requirement("0.0.9", Some("<0.1.0")).unwrap());
        assert!(!matches_requirement("0.1.0", Some("<0.1.0")).unwrap());
    }

    #[test]
    fn test_compound_requirement() {
        let req = ">=0.1.0, <0.3.0";
        assert!(matches_requirement("0.1.0", Some(req)).unwrap());
        assert!(matches_requirement("0.2.5", Some(req)).unwrap());
        assert!(!matches_requirement("0.3.0", Some(req)).unwrap());
        assert!(!matches_requirement("0.0.1", Some(req)).unwrap());
    }

    #[test]
    fn test_invalid_version() {
        let result = matches_requirement("not-a-version", Some(">=0.1.0"));
        assert!(matches!(
            result,
            Err(VersionError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_invalid_requirement() {
        let result = matches_requirement("0.1.0", Some(">=bad-version"));
        assert!(matches!(
            result,
            Err(VersionError::InvalidRequirement { .. })
        ));
    }

    #[test]
    fn test_read_project_version_from_package_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("package.json"),
            r#"{ "name": "frontend", "version": "0.1.0", "private": true }"#,
        )
        .unwrap();

        let version = read_project_version(temp_dir.path()).unwrap();
        assert_eq!(version, "0.1.0");
    }

    #[test]
    fn test_read_project_version_missing_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = read_project_version(temp_dir.path());
        assert!(matches!(result, Err(VersionError::Manifest { .. })));
    }

    #[test]
    fn test_read_project_version_without_version_field() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("package.json"),
            r#"{ "name": "frontend" }"#,
        )
        .unwrap();

        let result = read_project_version(temp_dir.path());
        assert!(matches!(result, Err(VersionError::Manifest { .. })));
    }
}
