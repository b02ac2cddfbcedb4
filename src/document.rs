use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The in-memory textual content of one file between read and write.
///
/// A document is read once at the start of a patch run and written back once
/// at the end, and only if the content actually changed. Everything in
/// between is pure string transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    path: PathBuf,
    content: String,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    /// The only hard failure in the system: nothing to patch.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SourceDocument {
    /// Read the whole file as UTF-8.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let path = path.into();
        let content = fs::read_to_string(&path).map_err(|source| DocumentError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, content })
    }

    /// Construct from already-read content (tests, read-only checks).
    pub fn from_content(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// xxh3 fingerprint of the current content, recorded in run reports.
    pub fn fingerprint(&self) -> u64 {
        xxh3_64(self.content.as_bytes())
    }

    /// Persist `new_content` back to the originating path.
    ///
    /// Returns `false` without touching storage when the content is
    /// byte-identical to what was read; otherwise writes atomically and
    /// bumps the mtime so file watchers notice the change.
    pub fn write_if_changed(&self, new_content: &str) -> Result<bool, DocumentError> {
        if new_content == self.content {
            return Ok(false);
        }

        atomic_write(&self.path, new_content.as_bytes())?;

        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&self.path, now).map_err(|source| DocumentError::Write {
            path: self.path.clone(),
            source,
        })?;

        Ok(true)
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write lands or the original file is untouched.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), DocumentError> {
    let to_write_err = |source: std::io::Error| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Tempfile in the same directory so the rename never crosses filesystems.
    let parent = path.parent().ok_or_else(|| {
        to_write_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(to_write_err)?;
    temp.write_all(content).map_err(to_write_err)?;
    temp.as_file().sync_all().map_err(to_write_err)?;
    temp.persist(path).map_err(|e| to_write_err(e.error))?;

    Ok(())
}
