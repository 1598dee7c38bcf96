//! Local filesystem remote store.
//!
//! Treats a directory on the local filesystem as if it were the remote root.
//! Handy for trying a migration against a synced copy of the Dropbox folder,
//! and for integration tests. Uses `tokio::fs` for async I/O.

use crate::error::ErrorKind;
use crate::models::Page;
use crate::{RemoteEntry, RemoteStore, WriteMode, error::Result, path::normalize};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem remote store.
///
/// All remote paths are relative to the configured root directory. Name
/// matching is whatever the underlying filesystem does, which on most Linux
/// systems means case-sensitive.
///
/// # Examples
///
/// ```no_run
/// use mediamig_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/home/me/Dropbox")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Directory acting as the remote root
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
            }
        } else {
            // Non-async: happens once at startup and keeps the constructor sync.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Validate a remote path and map it onto the filesystem.
    fn absolute_path(&self, path: &str) -> Result<(String, PathBuf)> {
        let validated = normalize(path)?;
        let absolute = self.root.join(validated.trim_start_matches('/'));
        Ok((validated, absolute))
    }

    fn entry(path: String, metadata: &Metadata) -> Result<Option<RemoteEntry>> {
        let entry = if metadata.is_dir() {
            RemoteEntry::folder(path)
        } else if metadata.is_file() {
            RemoteEntry::file(path, metadata.len())
        } else {
            // Most likely a broken symlink; pretend it isn't there.
            return Ok(None);
        };
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(Some(entry.with_modified(modified.into())))
    }

    fn map_io_error(e: std::io::Error, path: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::Backend(format!("permission denied: {path}")),
            std::io::ErrorKind::NotADirectory => ErrorKind::Backend(format!("not a folder: {path}")),
            _ => ErrorKind::Io(e),
        }
    }

    async fn create_parent(&self, absolute: &Path, path: &str) -> Result<()> {
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    /// Directory listings are small enough to return as a single page.
    async fn list_page(&self, folder: &str, _cursor: Option<&str>) -> Result<Page> {
        let (folder, absolute) = self.absolute_path(folder)?;
        let mut dir = fs::read_dir(&absolute).await.map_err(|e| Self::map_io_error(e, &folder))?;
        let mut entries = Vec::new();
        while let Some(child) = dir.next_entry().await.map_err(|e| Self::map_io_error(e, &folder))? {
            let Some(name) = child.file_name().to_str().map(str::to_string) else {
                tracing::warn!(folder = %folder, name = ?child.file_name(), "Skipping entry with non UTF-8 name");
                continue;
            };
            let metadata = child.metadata().await.map_err(|e| Self::map_io_error(e, &folder))?;
            if let Some(entry) = Self::entry(format!("{folder}/{name}"), &metadata)? {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Page { entries, cursor: None })
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry> {
        let (path, absolute) = self.absolute_path(path)?;
        let metadata = fs::metadata(&absolute).await.map_err(|e| Self::map_io_error(e, &path))?;
        Self::entry(path.clone(), &metadata)?.ok_or_raise(|| ErrorKind::NotFound(path))
    }

    async fn ensure_folder(&self, path: &str) -> Result<()> {
        let (path, absolute) = self.absolute_path(path)?;
        if absolute.is_file() {
            exn::bail!(ErrorKind::Backend(format!("a file is in the way of folder {path}")));
        }
        Ok(fs::create_dir_all(&absolute).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let (from, from_path) = self.absolute_path(from)?;
        let (to, to_path) = self.absolute_path(to)?;
        if !fs::try_exists(&from_path).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::NotFound(from));
        }
        if fs::try_exists(&to_path).await.map_err(ErrorKind::Io)? {
            tracing::debug!(from = %from, to = %to, "Copy destination already exists");
            return Ok(());
        }
        self.create_parent(&to_path, &to).await?;
        fs::copy(&from_path, &to_path)
            .await
            .or_raise(|| ErrorKind::Backend(format!("unable to copy {from} to {to}")))?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let (path, absolute) = self.absolute_path(path)?;
        Ok(fs::read(&absolute).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn upload(&self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        let (path, absolute) = self.absolute_path(path)?;
        if mode == WriteMode::Add && fs::try_exists(&absolute).await.map_err(ErrorKind::Io)? {
            tracing::debug!(path = %path, "Upload destination already exists");
            return Ok(());
        }
        self.create_parent(&absolute, &path).await?;
        Ok(fs::write(&absolute, data).await.map_err(|e| Self::map_io_error(e, &path))?)
    }
}
