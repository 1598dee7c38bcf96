//! Turning a folder listing into a list of things to do.
//!
//! [`destination_name`] is the one function that decides what a source file
//! should be called on the other side. The engine uses it to know where to
//! write, the auditor uses it to know what to look for; anything else would
//! make the audit meaningless.

use crate::classify::{Category, split_extension};
use crate::error::{ErrorKind, Result};
use derive_more::Display;
use mediamig_storage::{RemoteEntry, path};
use std::collections::HashSet;

/// Decisions shared by migration and audit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Policy {
    /// Convert [`Category::Other`] files (PNG, WebP, ...) to JPEG. When off,
    /// they are skipped as unsupported.
    pub convert_other: bool,
}
impl Default for Policy {
    fn default() -> Self {
        Self { convert_other: true }
    }
}

/// Why an item was not transferred.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The expected output already exists in the destination.
    #[display("already present")]
    AlreadyPresent,
    /// Nothing to do for this kind of file under the current policy.
    #[display("unsupported")]
    Unsupported,
    /// An earlier source file already maps to the same destination name.
    #[display("duplicate destination")]
    DuplicateDestination,
}

/// What to do with one source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    CopyVerbatim,
    ConvertToJpeg,
    SkipUnsupported(SkipReason),
}

/// One source file and what will happen to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanItem {
    pub source: RemoteEntry,
    pub category: Category,
    pub destination_name: String,
    pub action: Action,
}

/// Name the output of `name` gets in the destination folder.
///
/// Files that get converted keep their stem and gain a `.jpg` extension;
/// everything else keeps its name.
///
/// # Examples
///
/// ```
/// use mediamig_migrate::{Policy, destination_name};
///
/// let policy = Policy::default();
/// assert_eq!(destination_name("IMG_0001.DNG", &policy), "IMG_0001.jpg");
/// assert_eq!(destination_name("clip.MOV", &policy), "clip.MOV");
/// assert_eq!(destination_name("shot.png", &policy), "shot.jpg");
/// ```
pub fn destination_name(name: &str, policy: &Policy) -> String {
    match action_for(Category::from_name(name), policy) {
        Action::ConvertToJpeg => format!("{}.jpg", split_extension(name).0),
        Action::CopyVerbatim | Action::SkipUnsupported(_) => path::file_name(name).to_string(),
    }
}

/// Action for a category, before duplicate detection.
pub fn action_for(category: Category, policy: &Policy) -> Action {
    match category {
        Category::RawImage => Action::ConvertToJpeg,
        Category::Other if policy.convert_other => Action::ConvertToJpeg,
        Category::Other => Action::SkipUnsupported(SkipReason::Unsupported),
        Category::AlreadyJpeg | Category::Video => Action::CopyVerbatim,
    }
}

/// Refuse listings that contain folders.
///
/// Returns [`Subfolders`](ErrorKind::Subfolders) with every folder path found.
pub fn ensure_flat(entries: &[RemoteEntry]) -> Result<()> {
    let folders: Vec<String> = entries.iter().filter(|e| e.is_folder()).map(|e| e.path.clone()).collect();
    if !folders.is_empty() {
        exn::bail!(ErrorKind::Subfolders(folders));
    }
    Ok(())
}

/// Derive the plan for a flat folder listing, keeping listing order.
///
/// When two source files would produce the same destination name
/// (case-insensitively, e.g. `a.dng` and `a.png`), the first one in listing
/// order wins and the others are skipped with
/// [`DuplicateDestination`](SkipReason::DuplicateDestination).
pub fn plan(entries: &[RemoteEntry], policy: &Policy) -> Result<Vec<PlanItem>> {
    ensure_flat(entries)?;
    let mut claimed = HashSet::new();
    Ok(entries
        .iter()
        .map(|entry| {
            let category = Category::from_name(&entry.name);
            let destination_name = destination_name(&entry.name, policy);
            let mut action = action_for(category, policy);
            if !matches!(action, Action::SkipUnsupported(_)) && !claimed.insert(path::key(&destination_name)) {
                tracing::warn!(
                    source = %entry.path,
                    destination = %destination_name,
                    "Destination already claimed by another file"
                );
                action = Action::SkipUnsupported(SkipReason::DuplicateDestination);
            }
            PlanItem { source: entry.clone(), category, destination_name, action }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CONVERT_ALL: Policy = Policy { convert_other: true };
    const RAW_ONLY: Policy = Policy { convert_other: false };

    #[rstest]
    #[case("IMG_0001.DNG", CONVERT_ALL, "IMG_0001.jpg")]
    #[case("IMG_0001.nef", RAW_ONLY, "IMG_0001.jpg")]
    #[case("photo.jpeg", CONVERT_ALL, "photo.jpeg")]
    #[case("clip.mp4", CONVERT_ALL, "clip.mp4")]
    #[case("shot.PNG", CONVERT_ALL, "shot.jpg")]
    #[case("shot.PNG", RAW_ONLY, "shot.PNG")]
    #[case("archive.tar.gz", CONVERT_ALL, "archive.tar.jpg")]
    #[case("README", CONVERT_ALL, "README.jpg")]
    #[case(".hidden", CONVERT_ALL, ".hidden.jpg")]
    #[case("/Camera Uploads/IMG_2.CR2", CONVERT_ALL, "IMG_2.jpg")]
    fn test_destination_name(#[case] name: &str, #[case] policy: Policy, #[case] expected: &str) {
        assert_eq!(destination_name(name, &policy), expected);
    }

    #[test]
    fn test_destination_name_is_deterministic() {
        for name in ["a.dng", "B.JPG", "c.webp", "d", "e.mov"] {
            assert_eq!(destination_name(name, &CONVERT_ALL), destination_name(name, &CONVERT_ALL));
        }
    }

    #[test]
    fn test_plan_keeps_order_and_actions() {
        let entries = vec![
            RemoteEntry::file("/src/b.jpg", 1),
            RemoteEntry::file("/src/a.dng", 2),
            RemoteEntry::file("/src/c.mov", 3),
            RemoteEntry::file("/src/d.png", 4),
        ];
        let items = plan(&entries, &CONVERT_ALL).unwrap();
        let summary: Vec<_> = items.iter().map(|i| (i.destination_name.as_str(), i.action)).collect();
        assert_eq!(
            summary,
            vec![
                ("b.jpg", Action::CopyVerbatim),
                ("a.jpg", Action::ConvertToJpeg),
                ("c.mov", Action::CopyVerbatim),
                ("d.jpg", Action::ConvertToJpeg),
            ]
        );
    }

    #[test]
    fn test_plan_unsupported_when_not_converting_other() {
        let entries = vec![RemoteEntry::file("/src/d.png", 4)];
        let items = plan(&entries, &RAW_ONLY).unwrap();
        assert_eq!(items[0].action, Action::SkipUnsupported(SkipReason::Unsupported));
    }

    #[test]
    fn test_plan_detects_duplicate_destinations() {
        let entries = vec![
            RemoteEntry::file("/src/a.dng", 1),
            RemoteEntry::file("/src/A.png", 2),
            RemoteEntry::file("/src/a.JPG", 3),
        ];
        let items = plan(&entries, &CONVERT_ALL).unwrap();
        assert_eq!(items[0].action, Action::ConvertToJpeg);
        assert_eq!(items[1].action, Action::SkipUnsupported(SkipReason::DuplicateDestination));
        assert_eq!(items[2].action, Action::SkipUnsupported(SkipReason::DuplicateDestination));
    }

    #[test]
    fn test_plan_refuses_subfolders() {
        let entries = vec![RemoteEntry::file("/src/a.dng", 1), RemoteEntry::folder("/src/edits")];
        let err = plan(&entries, &CONVERT_ALL).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Subfolders(folders) if folders == &["/src/edits".to_string()]));
    }
}
