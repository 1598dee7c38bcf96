//! In-memory remote store for testing.

use crate::backend::RemoteStore;
use crate::error::{ErrorKind, Result};
use crate::models::{Page, RemoteEntry, WriteMode};
use crate::path::{self, normalize};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Remote operations that can be counted and sabotaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    List = 0,
    Stat = 1,
    EnsureFolder = 2,
    Copy = 3,
    Download = 4,
    Upload = 5,
}

/// A failure to inject into matching calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// Fail with a transient error this many times, then behave normally.
    Transient(u32),
    /// Always fail with a non-retryable backend error.
    Permanent,
    /// Always fail as if the credentials were revoked.
    Unauthorized,
    /// Sleep this long before doing the actual work.
    Stall(Duration),
}

struct MockFile {
    path: String,
    data: Vec<u8>,
    modified: OffsetDateTime,
}

#[derive(Default)]
struct State {
    /// Keyed by lower-cased path, like every case-insensitive remote.
    files: BTreeMap<String, MockFile>,
    /// Lower-cased path to display path.
    folders: BTreeMap<String, String>,
    faults: HashMap<(MockOp, String), MockFault>,
}
impl State {
    fn add_folder_chain(&mut self, path: &str) {
        let mut current = path;
        while !current.is_empty() {
            self.folders.entry(path::key(current)).or_insert_with(|| current.to_string());
            current = path::parent(current);
        }
    }

    fn add_file(&mut self, path: String, data: Vec<u8>) {
        self.add_folder_chain(path::parent(&path));
        let modified = OffsetDateTime::now_utc();
        self.files.insert(path::key(&path), MockFile { path, data, modified });
    }

    fn occupied(&self, key: &str) -> bool {
        self.files.contains_key(key) || self.folders.contains_key(key)
    }
}

/// In-memory remote store for testing.
///
/// Files and folders live in maps behind a [`RwLock`], so all trait methods
/// operate on `&self`. Lookups are case-insensitive. Listings are served in
/// pages of [`with_page_size`](Self::with_page_size) entries so cursor
/// handling gets exercised, every call is counted per [`MockOp`], and faults
/// can be injected per operation and path.
///
/// # Examples
///
/// ```
/// use mediamig_storage::backend::{MockBackend, RemoteStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("/Camera Uploads/IMG_0001.DNG", b"raw bytes".to_vec()),
/// ]);
/// assert!(backend.exists("/camera uploads/img_0001.dng").await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    page_size: usize,
    state: RwLock<State>,
    calls: [AtomicUsize; 6],
}

impl MockBackend {
    /// Create a mock backend pre-populated with files. Parent folders are
    /// created implicitly.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut state = State::default();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = normalize(&path) else {
                panic!("MockBackend::with_files: invalid path {path}");
            };
            state.add_file(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            page_size: 100,
            state: RwLock::new(state),
            calls: Default::default(),
        }
    }

    /// Add an (empty) folder.
    pub fn with_folder(mut self, folder: &str) -> Self {
        let Ok(validated) = normalize(folder) else {
            panic!("MockBackend::with_folder: invalid path {folder}");
        };
        self.state.get_mut().add_folder_chain(&validated);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Change how many entries each listing page holds (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Inject a fault for every `op` call touching `path`.
    ///
    /// Copies are matched on their source path, everything else on the path
    /// it operates on (the folder, for listings).
    pub async fn inject(&self, op: MockOp, path: &str, fault: MockFault) {
        let key = path::key(&normalize(path).unwrap_or_else(|_| path.to_string()));
        self.state.write().await.faults.insert((op, key), fault);
    }

    /// Number of times `op` has been called (including failed calls).
    pub fn call_count(&self, op: MockOp) -> usize {
        self.calls[op as usize].load(Ordering::SeqCst)
    }

    /// Number of calls that could have modified the store.
    pub fn mutation_count(&self) -> usize {
        [MockOp::EnsureFolder, MockOp::Copy, MockOp::Upload].into_iter().map(|op| self.call_count(op)).sum()
    }

    /// Contents of a file, if it exists.
    pub async fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let key = path::key(&normalize(path).ok()?);
        self.state.read().await.files.get(&key).map(|f| f.data.clone())
    }

    /// Remove a file behind the engine's back.
    pub async fn remove(&self, path: &str) -> bool {
        let Ok(validated) = normalize(path) else {
            return false;
        };
        self.state.write().await.files.remove(&path::key(&validated)).is_some()
    }

    /// Add or replace a file behind the engine's back.
    pub async fn put(&self, path: &str, data: impl Into<Vec<u8>>) {
        let Ok(validated) = normalize(path) else {
            panic!("MockBackend::put: invalid path {path}");
        };
        self.state.write().await.add_file(validated, data.into());
    }

    async fn enter(&self, op: MockOp, path: &str) -> Result<String> {
        self.calls[op as usize].fetch_add(1, Ordering::SeqCst);
        let path = normalize(path)?;
        let fault = {
            let mut state = self.state.write().await;
            match state.faults.get_mut(&(op, path::key(&path))) {
                Some(MockFault::Transient(0)) | None => None,
                Some(MockFault::Transient(remaining)) => {
                    *remaining -= 1;
                    Some(MockFault::Transient(1))
                },
                Some(fault) => Some(*fault),
            }
        };
        match fault {
            None => Ok(path),
            Some(MockFault::Transient(_)) => exn::bail!(ErrorKind::Transient(format!("injected fault: {op:?} {path}"))),
            Some(MockFault::Permanent) => exn::bail!(ErrorKind::Backend(format!("injected fault: {op:?} {path}"))),
            Some(MockFault::Unauthorized) => exn::bail!(ErrorKind::Unauthorized("injected fault".to_string())),
            Some(MockFault::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(path)
            },
        }
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, Vec<u8>); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl RemoteStore for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, folder: &str, cursor: Option<&str>) -> Result<Page> {
        let folder = self.enter(MockOp::List, folder).await?;
        let folder_key = path::key(&folder);
        let offset = match cursor {
            Some(c) => c.parse::<usize>().map_err(|_| ErrorKind::Backend(format!("bad cursor `{c}`")))?,
            None => 0,
        };
        let state = self.state.read().await;
        if !folder_key.is_empty() && !state.folders.contains_key(&folder_key) {
            exn::bail!(ErrorKind::NotFound(folder));
        }
        // Snapshot under the read lock, ordered by key for deterministic pages.
        let mut children: Vec<(String, RemoteEntry)> = state
            .folders
            .iter()
            .filter(|(key, _)| path::parent(key) == folder_key)
            .map(|(key, display)| (key.clone(), RemoteEntry::folder(display.clone())))
            .chain(state.files.iter().filter(|(key, _)| path::parent(key) == folder_key).map(|(key, file)| {
                (key.clone(), RemoteEntry::file(file.path.clone(), file.data.len() as u64).with_modified(file.modified))
            }))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        let total = children.len();
        let start = offset.min(total);
        let end = (start + self.page_size).min(total);
        let entries = children.drain(start..end).map(|(_, entry)| entry).collect();
        let cursor = (end < total).then(|| end.to_string());
        Ok(Page { entries, cursor })
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry> {
        let path = self.enter(MockOp::Stat, path).await?;
        if path.is_empty() {
            return Ok(RemoteEntry::folder(""));
        }
        let key = path::key(&path);
        let state = self.state.read().await;
        if let Some(file) = state.files.get(&key) {
            return Ok(RemoteEntry::file(file.path.clone(), file.data.len() as u64).with_modified(file.modified));
        }
        if let Some(display) = state.folders.get(&key) {
            return Ok(RemoteEntry::folder(display.clone()));
        }
        exn::bail!(ErrorKind::NotFound(path))
    }

    async fn ensure_folder(&self, path: &str) -> Result<()> {
        let path = self.enter(MockOp::EnsureFolder, path).await?;
        let mut state = self.state.write().await;
        if state.files.contains_key(&path::key(&path)) {
            exn::bail!(ErrorKind::Backend(format!("a file is in the way of folder {path}")));
        }
        state.add_folder_chain(&path);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let from = self.enter(MockOp::Copy, from).await?;
        let to = normalize(to)?;
        let mut state = self.state.write().await;
        let data = state.files.get(&path::key(&from)).map(|f| f.data.clone()).ok_or_else(|| ErrorKind::NotFound(from))?;
        if state.occupied(&path::key(&to)) {
            return Ok(());
        }
        state.add_file(to, data);
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let path = self.enter(MockOp::Download, path).await?;
        let state = self.state.read().await;
        Ok(state.files.get(&path::key(&path)).map(|f| f.data.clone()).ok_or_else(|| ErrorKind::NotFound(path))?)
    }

    async fn upload(&self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        let path = self.enter(MockOp::Upload, path).await?;
        let mut state = self.state.write().await;
        if mode == WriteMode::Add && state.occupied(&path::key(&path)) {
            return Ok(());
        }
        state.add_file(path, data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;

    fn backend() -> MockBackend {
        MockBackend::with_files([
            ("/src/IMG_1.DNG", b"raw".to_vec()),
            ("/src/IMG_2.jpg", b"jpeg".to_vec()),
            ("/src/nested/deep.png", b"png".to_vec()),
        ])
    }

    #[tokio::test]
    async fn test_list_direct_children_only() {
        let entries = backend().list_all("/src").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            vec![("IMG_1.DNG", EntryKind::File), ("IMG_2.jpg", EntryKind::File), ("nested", EntryKind::Folder)]
        );
    }

    #[tokio::test]
    async fn test_list_missing_folder() {
        let err = backend().list_all("/nope").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_root_and_empty_folder() {
        let backend = backend().with_folder("/empty");
        let root = backend.list_all("").await.unwrap();
        assert_eq!(root.len(), 2);
        assert!(backend.list_all("/empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_case_insensitive_lookup() {
        let backend = backend();
        let entry = backend.stat("/SRC/img_1.dng").await.unwrap();
        assert_eq!(entry.path, "/src/IMG_1.DNG");
        assert_eq!(entry.size, 3);
    }

    #[tokio::test]
    async fn test_copy_is_idempotent() {
        let backend = backend();
        backend.copy("/src/IMG_2.jpg", "/dst/IMG_2.jpg").await.unwrap();
        backend.upload("/dst/other.jpg", b"x", WriteMode::Overwrite).await.unwrap();
        // Existing destination is success and leaves it untouched.
        backend.copy("/src/IMG_1.DNG", "/dst/other.jpg").await.unwrap();
        assert_eq!(backend.contents("/dst/IMG_2.jpg").await.unwrap(), b"jpeg");
        assert_eq!(backend.contents("/dst/other.jpg").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let err = backend().copy("/src/missing.jpg", "/dst/missing.jpg").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_modes() {
        let backend = backend();
        backend.upload("/dst/a.jpg", b"first", WriteMode::Add).await.unwrap();
        backend.upload("/dst/a.jpg", b"second", WriteMode::Add).await.unwrap();
        assert_eq!(backend.contents("/dst/a.jpg").await.unwrap(), b"first");
        backend.upload("/dst/a.jpg", b"third", WriteMode::Overwrite).await.unwrap();
        assert_eq!(backend.contents("/dst/a.jpg").await.unwrap(), b"third");
    }

    #[tokio::test]
    async fn test_ensure_folder_is_idempotent() {
        let backend = backend();
        backend.ensure_folder("/dst").await.unwrap();
        backend.ensure_folder("/dst").await.unwrap();
        assert!(backend.stat("/dst").await.unwrap().is_folder());
        assert_eq!(backend.mutation_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_fault_wears_off() {
        let backend = backend();
        backend.inject(MockOp::Download, "/src/IMG_1.DNG", MockFault::Transient(2)).await;
        assert!(backend.download("/src/IMG_1.DNG").await.unwrap_err().is_retryable());
        assert!(backend.download("/src/IMG_1.DNG").await.unwrap_err().is_retryable());
        assert_eq!(backend.download("/src/IMG_1.DNG").await.unwrap(), b"raw");
        assert_eq!(backend.call_count(MockOp::Download), 3);
    }

    #[tokio::test]
    async fn test_permanent_fault() {
        let backend = backend();
        backend.inject(MockOp::Upload, "/dst/a.jpg", MockFault::Permanent).await;
        let err = backend.upload("/dst/a.jpg", b"x", WriteMode::Overwrite).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(backend.contents("/dst/a.jpg").await.is_none());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = backend();
        assert!(backend.download("/../etc/passwd").await.is_err());
        assert!(backend.upload("/../escape", b"bad", WriteMode::Overwrite).await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("/../escape", b"bad".to_vec())]);
    }
}
