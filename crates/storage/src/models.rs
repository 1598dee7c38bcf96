//! Storage models.
//!
//! Snapshots of remote state as returned by listing and metadata calls.

use crate::path;
use time::OffsetDateTime;

/// Whether a listed entry is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Folder,
}

/// One item returned by a folder listing or metadata lookup.
///
/// This is an immutable snapshot: two listings of the same folder may disagree
/// if the remote changed in between, and nothing here tracks identity beyond
/// the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Leaf component only, with the case the remote reports.
    pub name: String,
    /// Fully qualified, normalized path.
    pub path: String,
    pub kind: EntryKind,
    /// File size in bytes (always `0` for folders).
    pub size: u64,
    /// Last modification time reported by the remote, if any.
    pub modified: Option<OffsetDateTime>,
}
impl RemoteEntry {
    /// Create a file entry; the name is derived from the path.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        Self {
            name: path::file_name(&path).to_string(),
            path,
            kind: EntryKind::File,
            size,
            modified: None,
        }
    }

    /// Create a folder entry; the name is derived from the path.
    pub fn folder(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: path::file_name(&path).to_string(),
            path,
            kind: EntryKind::Folder,
            size: 0,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// One bounded chunk of a folder listing.
///
/// `cursor` is `Some` while the remote has more entries to give; pass it back
/// to fetch the next page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entries: Vec<RemoteEntry>,
    pub cursor: Option<String>,
}

/// Conflict behaviour for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Keep whatever is already at the destination (reported as success).
    Add,
    /// Replace whatever is already at the destination.
    Overwrite,
}
