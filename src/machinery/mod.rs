//! # Machinery
//!
//! The file-writing layer shared by built-in and external plugins.
//!
//! Every scaffolded file goes through a [`Filesystem`] with an
//! [`IfExistsAction`] that decides what happens when the target is already
//! present:
//!
//! | Action | Existing file |
//! |--------|---------------|
//! | `Overwrite` | Replaced with the new content |
//! | `Skip` | Left untouched, reported as skipped |
//! | `Error` | Write fails with [`MachineryError::Exists`] |
//!
//! Parent directories are created as needed. Each write opens, fills and
//! closes its own file handle before returning.

mod filesystem;

pub use filesystem::{
    Filesystem, IfExistsAction, MachineryError, OsFilesystem, OsWorkingDir, WorkingDir,
    WriteOutcome, WriteStatus,
};
