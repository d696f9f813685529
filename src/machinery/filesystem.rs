//! Filesystem abstraction with exists-policies

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MachineryError {
    #[error("File already exists: {}", .0.display())]
    Exists(PathBuf),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MachineryError {
    /// Returns the path the failure refers to
    pub fn path(&self) -> &Path {
        match self {
            MachineryError::Exists(path) => path,
            MachineryError::Io { path, .. } => path,
        }
    }
}

/// What to do when a file being written already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IfExistsAction {
    #[default]
    Overwrite,
    Skip,
    Error,
}

/// Result of a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Created,
    Overwritten,
    Skipped,
}

/// A file the machinery touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub status: WriteStatus,
}

/// Writes scaffolded files
pub trait Filesystem {
    /// Reads a file, returning `None` when it does not exist
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>>;

    /// Writes `content` to `path` honoring `if_exists`
    fn write(
        &self,
        path: &Path,
        content: &str,
        if_exists: IfExistsAction,
    ) -> Result<WriteOutcome, MachineryError>;
}

/// Filesystem backed by the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(
        &self,
        path: &Path,
        content: &str,
        if_exists: IfExistsAction,
    ) -> Result<WriteOutcome, MachineryError> {
        let io_err = |source: io::Error| MachineryError::Io {
            path: path.to_path_buf(),
            source,
        };

        let existed = path.exists();
        let status = match (existed, if_exists) {
            (true, IfExistsAction::Skip) => {
                return Ok(WriteOutcome {
                    path: path.to_path_buf(),
                    status: WriteStatus::Skipped,
                });
            }
            (true, IfExistsAction::Error) => {
                return Err(MachineryError::Exists(path.to_path_buf()));
            }
            (true, IfExistsAction::Overwrite) => WriteStatus::Overwritten,
            (false, _) => WriteStatus::Created,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| MachineryError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        // Handle is dropped at the end of this block on every path
        {
            let mut file = File::create(path).map_err(io_err)?;
            file.write_all(content.as_bytes()).map_err(io_err)?;
            file.flush().map_err(io_err)?;
        }

        Ok(WriteOutcome {
            path: path.to_path_buf(),
            status,
        })
    }
}

/// Source of the working directory that relative paths resolve against
pub trait WorkingDir {
    fn current_dir(&self) -> io::Result<PathBuf>;
}

/// Working directory of the running process
#[derive(Debug, Clone, Copy, Default)]
pub struct OsWorkingDir;

impl WorkingDir for OsWorkingDir {
    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }
}

/// A fixed directory, used when the caller already knows the project root
impl WorkingDir for PathBuf {
    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("nested").join("file.yaml");

        let outcome = OsFilesystem
            .write(&path, "kind: Test\n", IfExistsAction::Overwrite)
            .unwrap();

        assert_eq!(outcome.status, WriteStatus::Created);
        assert_eq!(fs::read_to_string(&path).unwrap(), "kind: Test\n");
    }

    #[test]
    fn overwrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "old").unwrap();

        let outcome = OsFilesystem
            .write(&path, "new", IfExistsAction::Overwrite)
            .unwrap();

        assert_eq!(outcome.status, WriteStatus::Overwritten);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn skip_leaves_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "old").unwrap();

        let outcome = OsFilesystem.write(&path, "new", IfExistsAction::Skip).unwrap();

        assert_eq!(outcome.status, WriteStatus::Skipped);
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn skip_still_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");

        let outcome = OsFilesystem.write(&path, "new", IfExistsAction::Skip).unwrap();

        assert_eq!(outcome.status, WriteStatus::Created);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn error_action_fails_on_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "old").unwrap();

        let err = OsFilesystem
            .write(&path, "new", IfExistsAction::Error)
            .unwrap_err();

        assert!(matches!(err, MachineryError::Exists(_)));
        assert_eq!(err.path(), path.as_path());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn read_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let content = OsFilesystem
            .read_to_string(&dir.path().join("missing"))
            .unwrap();

        assert!(content.is_none());
    }

    #[test]
    fn fixed_working_dir() {
        let dir = PathBuf::from("/tmp/project");
        assert_eq!(dir.current_dir().unwrap(), PathBuf::from("/tmp/project"));
    }
}
