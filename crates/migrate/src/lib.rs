//! Flat-folder media migration.
//!
//! Given a folder on a [`RemoteStore`](mediamig_storage::backend::RemoteStore),
//! this crate decides what should happen to every file in it
//! ([`classify`], [`plan`]), estimates how long that takes ([`estimate`]),
//! does it ([`engine::migrate`]), and independently checks the result
//! ([`audit::audit`]).
//!
//! Only the direct children of a folder are considered. A folder with
//! subfolders is refused outright rather than migrated partially.

pub mod audit;
mod classify;
pub mod engine;
pub mod error;
mod estimate;
mod plan;

pub use crate::classify::{Category, classify};
pub use crate::estimate::{Breakdown, EstimateFactors, EstimateReport, Totals, estimate};
pub use crate::plan::{Action, PlanItem, Policy, SkipReason, action_for, destination_name, ensure_flat, plan};
use futures::TryStreamExt;
use mediamig_storage::BackendHandle;
use mediamig_storage::backend::RemoteStore;
use mediamig_storage::error::Result as StorageResult;

/// Paths of the subfolders directly inside `folder`, sorted.
pub async fn list_subfolders(store: &BackendHandle, folder: &str) -> StorageResult<Vec<String>> {
    let mut folders: Vec<String> = store
        .list_children(folder)
        .try_filter(|e| futures::future::ready(e.is_folder()))
        .map_ok(|e| e.path)
        .try_collect()
        .await?;
    folders.sort_by_key(|path| mediamig_storage::path::key(path));
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediamig_storage::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_list_subfolders() {
        let store: BackendHandle = Arc::new(MockBackend::with_files([
            ("/Camera Uploads/2025/a.jpg", b"a".to_vec()),
            ("/Camera Uploads/2024/b.jpg", b"b".to_vec()),
            ("/Camera Uploads/c.jpg", b"c".to_vec()),
        ]));
        let folders = list_subfolders(&store, "/Camera Uploads").await.unwrap();
        assert_eq!(folders, vec!["/Camera Uploads/2024".to_string(), "/Camera Uploads/2025".to_string()]);
        assert!(list_subfolders(&store, "/Camera Uploads/2025").await.unwrap().is_empty());
    }
}
