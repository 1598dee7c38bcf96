//! Independent reconciliation of a source folder against its destination.
//!
//! The audit never looks at what a migration run reported. It lists both
//! folders fresh, recomputes every expected output name with
//! [`destination_name`], and compares the two sets case-insensitively. It only
//! reads, so it can run at any time, even during a migration (the result is
//! then just a snapshot).

use crate::error::{ErrorKind, Result};
use crate::plan::{Action, Policy, plan};
use mediamig_storage::backend::RemoteStore;
use mediamig_storage::error::ErrorKind as StorageErrorKind;
use mediamig_storage::{BackendHandle, RemoteEntry, path};
use std::collections::HashSet;

/// A source file whose expected output is absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Missing {
    /// Source file name.
    pub source: String,
    pub expected_destination: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Files in the source folder.
    pub source_count: usize,
    /// Source files whose expected output exists.
    pub ok_count: usize,
    /// Source files that are never transferred under the current policy
    /// (unsupported, or losing a destination name clash).
    pub skipped: usize,
    pub missing: Vec<Missing>,
    /// Destination file names no source file maps to.
    pub unexpected: Vec<String>,
}
impl ReconciliationReport {
    /// Nothing missing and nothing unexpected.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Compare `source` against `destination`.
///
/// Subfolders on either side are ignored. A missing destination folder is
/// treated as empty, so every transferable source file shows up as missing;
/// a missing source folder is [`SourceNotFound`](ErrorKind::SourceNotFound).
pub async fn audit(
    store: &BackendHandle,
    source: &str,
    destination: &str,
    policy: &Policy,
) -> Result<ReconciliationReport> {
    let sources = list_files(store, source).await.map_err(|e| ErrorKind::storage(e, source))?;
    let destinations = match list_files(store, destination).await {
        Ok(entries) => entries,
        Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {
            tracing::warn!(destination, "Destination folder does not exist");
            Vec::new()
        },
        Err(e) => return Err(ErrorKind::storage(e, destination)),
    };
    let present: HashSet<String> = destinations.iter().map(|e| path::key(&e.name)).collect();

    let mut report = ReconciliationReport { source_count: sources.len(), ..Default::default() };
    let mut expected = HashSet::new();
    for item in plan(&sources, policy)? {
        let key = path::key(&item.destination_name);
        // A skipped file's name still accounts for a same-named destination entry.
        let skipped = matches!(item.action, Action::SkipUnsupported(_));
        expected.insert(key.clone());
        if skipped {
            report.skipped += 1;
        } else if present.contains(&key) {
            report.ok_count += 1;
        } else {
            report.missing.push(Missing {
                source: item.source.name,
                expected_destination: item.destination_name,
            });
        }
    }
    report.unexpected = destinations
        .into_iter()
        .filter(|e| !expected.contains(&path::key(&e.name)))
        .map(|e| e.name)
        .collect();
    tracing::info!(
        source,
        destination,
        ok = report.ok_count,
        missing = report.missing.len(),
        unexpected = report.unexpected.len(),
        "Audit finished"
    );
    Ok(report)
}

async fn list_files(store: &BackendHandle, folder: &str) -> mediamig_storage::error::Result<Vec<RemoteEntry>> {
    let mut entries = store.list_all(folder).await?;
    entries.retain(RemoteEntry::is_file);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Context, migrate_all};
    use mediamig_storage::backend::{MockBackend, MockFault, MockOp};
    use std::sync::Arc;

    fn store(files: &[&str]) -> (Arc<MockBackend>, BackendHandle) {
        let mock = Arc::new(MockBackend::with_files(files.iter().map(|path| (path.to_string(), b"x".to_vec()))));
        let store: BackendHandle = mock.clone();
        (mock, store)
    }

    #[tokio::test]
    async fn test_detects_drift() {
        let (_, store) = store(&["/src/a.dng", "/src/b.jpg", "/dst/a.jpg", "/dst/c.jpg"]);
        let report = audit(&store, "/src", "/dst", &Policy::default()).await.unwrap();
        assert_eq!(report.source_count, 2);
        assert_eq!(report.ok_count, 1);
        assert_eq!(
            report.missing,
            vec![Missing { source: "b.jpg".to_string(), expected_destination: "b.jpg".to_string() }]
        );
        assert_eq!(report.unexpected, vec!["c.jpg".to_string()]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_case_insensitive_match() {
        let (_, store) = store(&["/src/IMG_0001.DNG", "/dst/img_0001.JPG"]);
        let report = audit(&store, "/src", "/dst", &Policy::default()).await.unwrap();
        assert_eq!(report.ok_count, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_unsupported_counted_as_skipped() {
        let (_, store) = store(&["/src/a.png", "/src/notes.txt", "/src/b.jpg", "/dst/b.jpg"]);
        let report = audit(&store, "/src", "/dst", &Policy { convert_other: false }).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.ok_count, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_skipped_name_is_not_unexpected() {
        let (_, store) = store(&["/src/notes.txt", "/dst/notes.txt", "/dst/stray.txt"]);
        let report = audit(&store, "/src", "/dst", &Policy { convert_other: false }).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(report.missing.is_empty());
        assert_eq!(report.unexpected, vec!["stray.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_destination_is_empty() {
        let (_, store) = store(&["/src/a.jpg"]);
        let report = audit(&store, "/src", "/dst", &Policy::default()).await.unwrap();
        assert_eq!(report.missing.len(), 1);
        assert!(report.unexpected.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_is_error() {
        let (_, store) = store(&["/dst/a.jpg"]);
        let err = audit(&store, "/src", "/dst", &Policy::default()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_never_mutates() {
        let (mock, store) = store(&["/src/a.dng", "/src/b.jpg"]);
        audit(&store, "/src", "/dst", &Policy::default()).await.unwrap();
        assert_eq!(mock.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let (mock, store) = store(&["/src/a.jpg", "/dst/a.jpg"]);
        mock.inject(MockOp::List, "/dst", MockFault::Unauthorized).await;
        let err = audit(&store, "/src", "/dst", &Policy::default()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unauthorized));
    }

    #[tokio::test]
    async fn test_subfolders_ignored() {
        let (_, store) = store(&["/src/a.jpg", "/src/Edits/b.jpg", "/dst/a.jpg", "/dst/Old/c.jpg"]);
        let report = audit(&store, "/src", "/dst", &Policy::default()).await.unwrap();
        assert_eq!(report.source_count, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_clean_after_migration() {
        let (mock, store) = store(&["/src/a.jpg", "/src/b.mov", "/src/c.txt"]);
        let ctx = Context { policy: Policy { convert_other: false }, ..Context::default() };
        let report = migrate_all(&store, &ctx, "/src", "/src-jpg").await.unwrap();
        assert!(report.is_success());
        assert_eq!(mock.call_count(MockOp::Copy), 2);

        let report = audit(&store, "/src", "/src-jpg", &ctx.policy).await.unwrap();
        assert_eq!(report.ok_count, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.is_clean());
    }
}
