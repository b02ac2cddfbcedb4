use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directories under the project root that must never be patched: generated
/// output and vendored dependencies. Editing these is always a mistake.
const GENERATED_DIRS: &[&str] = &["node_modules", ".next", ".git", "dist", "build"];

/// Project boundary checks to prevent patching files outside the target tree.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Absolute path to the project root
    project_root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("path is outside the project: {path} (project: {project})")]
    OutsideProject { path: PathBuf, project: PathBuf },

    #[error("path is in a generated/vendored directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard rooted at the given project directory.
    ///
    /// The root is canonicalized so symlinked checkouts behave correctly.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let project_root = project_root.as_ref().canonicalize()?;

        // Only directories that actually exist can be canonicalized; missing
        // ones cannot contain a target file anyway.
        let forbidden_paths = GENERATED_DIRS
            .iter()
            .filter_map(|dir| project_root.join(dir).canonicalize().ok())
            .collect();

        Ok(Self {
            project_root,
            forbidden_paths,
        })
    }

    /// Check that a path is safe to patch.
    ///
    /// Relative paths resolve against the project root. Returns the
    /// canonicalized absolute path if it stays inside the project and outside
    /// the forbidden directories; symlink escapes are caught because the
    /// check runs on the canonical path.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        self.check_canonical(&canonical)?;

        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.project_root) {
            return Err(SafetyError::OutsideProject {
                path: canonical.to_path_buf(),
                project: self.project_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    /// Get the project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_path_inside_project() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path();
        let guard = WorkspaceGuard::new(project).unwrap();

        let file = project.join("app/farmer/page.tsx");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path(&file).is_ok());
    }

    #[test]
    fn test_validate_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path();
        let guard = WorkspaceGuard::new(project).unwrap();

        let file = project.join("page.tsx");
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path("page.tsx").is_ok());
    }

    #[test]
    fn test_validate_path_outside_project() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join("frontend");
        fs::create_dir_all(&project).unwrap();
        let guard = WorkspaceGuard::new(&project).unwrap();

        let outside = temp_dir.path().join("outside.tsx");
        fs::write(&outside, b"").unwrap();

        let result = guard.validate_path(&outside);
        assert!(matches!(result, Err(SafetyError::OutsideProject { .. })));
    }

    #[test]
    fn test_validate_path_in_node_modules() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path();
        let vendored = project.join("node_modules/some-pkg");
        fs::create_dir_all(&vendored).unwrap();
        let file = vendored.join("index.js");
        fs::write(&file, b"").unwrap();

        // Guard built after node_modules exists so it gets canonicalized.
        let guard = WorkspaceGuard::new(project).unwrap();
        let result = guard.validate_path(&file);
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_missing_file_fails_canonicalization() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();
        let result = guard.validate_path("does-not-exist.tsx");
        assert!(matches!(result, Err(SafetyError::Canonicalize(_))));
    }

    #[test]
    #[cfg(unix)]
    fn test_validate_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join("frontend");
        fs::create_dir_all(&project).unwrap();

        let outside = temp_dir.path().join("outside.tsx");
        fs::write(&outside, b"").unwrap();

        let link = project.join("escape.tsx");
        symlink(&outside, &link).unwrap();

        let guard = WorkspaceGuard::new(&project).unwrap();
        let result = guard.validate_path(&link);
        assert!(matches!(result, Err(SafetyError::OutsideProject { .. })));
    }
}
