//! Migration Error Types
//!
//! Only problems that stop a whole run (or audit) before it can do anything
//! useful are errors. Problems with individual files are recorded as
//! [`ItemOutcome::Failed`](crate::engine::ItemOutcome::Failed) instead.

use derive_more::{Display, Error};
use mediamig_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};

/// A migration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a run was refused or aborted.
///
/// Every variant is raised before the first mutation, except
/// [`Storage`](Self::Storage) which can also come from the destination folder
/// setup.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The folder to migrate or audit does not exist.
    #[display("source folder not found: {_0}")]
    SourceNotFound(#[error(not(source))] String),
    /// The folder has subfolders; only flat folders are supported.
    #[display("refusing to work on a folder with {} subfolder(s): {}", _0.len(), _0.join(", "))]
    Subfolders(#[error(not(source))] Vec<String>),
    /// The remote rejected our credentials.
    #[display("remote rejected the credentials")]
    Unauthorized,
    /// No usable credentials were configured.
    #[display("no usable credentials")]
    Credentials,
    /// Any other remote failure.
    #[display("remote storage failure")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }

    /// Wrap a storage error from listing or preparing `folder`, keeping the
    /// storage frame as a child in the error tree.
    #[track_caller]
    pub fn storage(err: StorageError, folder: &str) -> Error {
        let kind = match &*err {
            StorageErrorKind::NotFound(_) => Self::SourceNotFound(folder.to_string()),
            StorageErrorKind::Unauthorized(_) => Self::Unauthorized,
            StorageErrorKind::Credentials(_) => Self::Credentials,
            _ => Self::Storage,
        };
        err.raise(kind)
    }
}
