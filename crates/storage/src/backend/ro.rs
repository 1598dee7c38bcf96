//! Read-only remote store decorator.
//!
//! Wraps another store and prevents mutating operations from executing, but
//! indicates success on return. This is what a dry run talks to: the engine
//! plans and "executes" as usual while the remote stays untouched.

use async_trait::async_trait;

use crate::{BackendHandle, RemoteEntry, RemoteStore, WriteMode, error::Result, models::Page};

/// Read-only remote store.
///
/// Wraps another store and silently drops all mutating operations, logging an
/// [`info event`](tracing::Event) for each.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RemoteStore for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_page(&self, folder: &str, cursor: Option<&str>) -> Result<Page> {
        self.inner.list_page(folder, cursor).await
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry> {
        self.inner.stat(path).await
    }

    async fn ensure_folder(&self, path: &str) -> Result<()> {
        tracing::info!(path, "Skipping folder creation during dry run");
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        tracing::info!(from, to, "Skipping copy during dry run");
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.download(path).await
    }

    async fn upload(&self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        tracing::info!(path, bytes = data.len(), ?mode, "Skipping upload during dry run");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockOp};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_pass_through_writes_dropped() {
        let mock = Arc::new(MockBackend::with_files([("/src/a.jpg", b"jpeg".to_vec())]));
        let ro = ReadOnlyBackend::new(mock.clone());

        assert_eq!(ro.list_all("/src").await.unwrap().len(), 1);
        assert_eq!(ro.download("/src/a.jpg").await.unwrap(), b"jpeg");

        ro.ensure_folder("/src-jpg").await.unwrap();
        ro.copy("/src/a.jpg", "/src-jpg/a.jpg").await.unwrap();
        ro.upload("/src-jpg/b.jpg", b"x", WriteMode::Overwrite).await.unwrap();

        assert_eq!(mock.mutation_count(), 0);
        assert_eq!(mock.call_count(MockOp::Download), 1);
        assert!(!mock.exists("/src-jpg").await.unwrap());
    }
}
