//! Remote store trait and implementations.
//!
//! This module defines the [`RemoteStore`] trait, a unified interface over
//! folder-based object stores (Dropbox, a local directory tree, an in-memory
//! mock) plus decorators that add behaviour on top of any of them.

#[cfg(feature = "dropbox")]
mod dropbox;
mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod resilient;
mod ro;

#[cfg(feature = "dropbox")]
pub use self::dropbox::DropboxBackend;
pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockBackend, MockFault, MockOp};
pub use self::resilient::{ResilientBackend, RetryPolicy};
pub use self::ro::ReadOnlyBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{Page, RemoteEntry, WriteMode};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub(crate) type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<RemoteEntry>> + Send + 'a>>;

/// Unified interface for remote stores.
///
/// All operations are asynchronous. Paths are `/`-rooted strings (see
/// [`path`](crate::path)); the store root is `""`. Implementations normalize
/// paths themselves, so callers may pass un-normalized input.
///
/// # Idempotency
/// Mutating calls ([`ensure_folder`](Self::ensure_folder),
/// [`copy`](Self::copy), [`upload`](Self::upload) in [`WriteMode::Add`]) must
/// report success when the destination already exists. Re-running a half
/// finished migration relies on this.
///
/// # Examples
///
/// ```
/// use mediamig_storage::{backend::RemoteStore, error::Result};
///
/// async fn total_size(store: &dyn RemoteStore, folder: &str) -> Result<u64> {
///     let entries = store.list_all(folder).await?;
///     Ok(entries.iter().filter(|e| e.is_file()).map(|e| e.size).sum())
/// }
/// ```
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Fetch one page of a folder's direct children.
    ///
    /// With `cursor = None` the listing starts from the beginning of
    /// `folder`; otherwise it continues from the cursor returned by the
    /// previous page (and `folder` is only informational).
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the folder does not
    /// exist. Most callers want [`list_children`](Self::list_children)
    /// instead, which hides cursors entirely.
    async fn list_page(&self, folder: &str, cursor: Option<&str>) -> Result<Page>;

    /// Stream a folder's direct children (files and subfolders).
    ///
    /// Pages are fetched lazily, one [`list_page`](Self::list_page) call at a
    /// time. The stream ends after the first error. Calling this again
    /// re-enumerates from the network; nothing is cached.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use mediamig_storage::{backend::RemoteStore, error::Result};
    /// # async fn example(store: &dyn RemoteStore) -> Result<()> {
    /// let mut children = store.list_children("/Camera Uploads/2025");
    /// while let Some(entry) = children.try_next().await? {
    ///     println!("{}: {} bytes", entry.name, entry.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_children<'a>(&'a self, folder: &'a str) -> EntryStream<'a> {
        Box::pin(stream! {
            let mut cursor: Option<String> = None;
            loop {
                let page = match self.list_page(folder, cursor.as_deref()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                for entry in page.entries {
                    yield Ok(entry);
                }
                match page.cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        })
    }

    /// Collect [`list_children`](Self::list_children) into a [`Vec`].
    async fn list_all(&self, folder: &str) -> Result<Vec<RemoteEntry>> {
        self.list_children(folder).try_collect().await
    }

    /// Metadata for a single file or folder.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if nothing lives at `path`.
    async fn stat(&self, path: &str) -> Result<RemoteEntry>;

    /// Check whether anything exists at `path`.
    ///
    /// A [`NotFound`](ErrorKind::NotFound) from [`stat`](Self::stat) means
    /// `false`; every other error propagates.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a folder (and any missing parents). Succeeds silently if it
    /// already exists.
    async fn ensure_folder(&self, path: &str) -> Result<()>;

    /// Server-side copy of a single file. Succeeds silently if `to` already
    /// exists.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if `from` does not exist.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Read a file's complete contents.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Write a file's complete contents, creating parent folders as needed.
    async fn upload(&self, path: &str, data: &[u8], mode: WriteMode) -> Result<()>;
}
