//! Remote path validation and manipulation.
//!
//! Remote paths are `/`-separated strings rooted at the store root, e.g.
//! `/Camera Uploads/2025/IMG_0001.DNG`. The root folder itself is the empty
//! string, which is what folder-listing APIs expect.
//!
//! Names are compared case-insensitively everywhere; use [`key`] when a path
//! or name is used for lookups.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a remote path.
///
/// Repeated and trailing slashes are collapsed, `.` components are dropped,
/// and `..` is resolved as long as it never leaves the root. Null bytes are
/// rejected outright.
///
/// # Examples
///
/// ```
/// use mediamig_storage::path::normalize;
/// assert_eq!(normalize("/Camera Uploads//2025/").unwrap(), "/Camera Uploads/2025");
/// assert_eq!(normalize("Camera Uploads/./2025").unwrap(), "/Camera Uploads/2025");
/// assert_eq!(normalize("/").unwrap(), "");
/// assert!(normalize("/../etc").is_err());
/// ```
pub fn normalize(path: &str) -> Result<String> {
    if path.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(path.replace('\0', "\\0")));
    }
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {},
            ".." => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_string()));
                }
            },
            normal => components.push(normal),
        }
    }
    Ok(components.iter().fold(String::with_capacity(path.len() + 1), |mut acc, c| {
        acc.push('/');
        acc.push_str(c);
        acc
    }))
}

/// Joins a single leaf name onto a folder path.
///
/// The name must be one component: no slashes, not `.` or `..`, not empty.
pub fn join(folder: &str, name: &str) -> Result<String> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(format!("{folder}/{name}")));
    }
    let folder = normalize(folder)?;
    Ok(format!("{folder}/{name}"))
}

/// Leaf component of a path (the whole string if it has no slash).
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit_once('/').map(|(_, name)| name).unwrap_or(trimmed)
}

/// Parent folder of a normalized path (`""` for top-level entries).
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Case-insensitive lookup key for a path or name.
pub fn key(path: &str) -> String {
    path.to_lowercase()
}
