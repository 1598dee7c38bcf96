//! Retry, timeout and rate-limit decorator.
//!
//! Remote APIs fail in boring, recoverable ways: dropped connections, 5xx
//! responses, "slow down" replies. [`ResilientBackend`] wraps any store and
//! retries those with exponential backoff, bounds each call with a timeout,
//! and caps the number of calls in flight across every task sharing it.

use crate::error::{ErrorKind, Result};
use crate::models::Page;
use crate::{BackendHandle, RemoteEntry, RemoteStore, WriteMode};
use async_trait::async_trait;
use exn::ResultExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::instrument;

/// How hard to try before giving up on a single remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Time budget for each individual attempt.
    pub timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            timeout: Duration::from_secs(60),
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(10),
        }
    }
}
impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based): `base * 2^(attempt - 1)`, capped at `backoff_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

/// Store decorator adding retries, per-call timeouts and a shared limit on
/// in-flight calls.
///
/// Only errors that report [`is_retryable`](ErrorKind::is_retryable) are
/// retried; anything else (not found, unauthorized, bad input) surfaces
/// immediately. When the remote names a `Retry-After`, the delay is at least
/// that long. Listing pages are retried individually, so a continuation
/// failing halfway through a big folder does not restart the listing.
#[derive(Clone)]
pub struct ResilientBackend {
    inner: BackendHandle,
    policy: RetryPolicy,
    limiter: Arc<Semaphore>,
}
impl ResilientBackend {
    pub fn new(inner: BackendHandle, policy: RetryPolicy, max_in_flight: usize) -> Self {
        Self {
            inner,
            policy,
            limiter: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    #[instrument(level = "debug", skip(self, call))]
    async fn run<T, F, Fut>(&self, op: &'static str, path: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .or_raise(|| ErrorKind::Backend("remote rate limiter closed".to_string()))?;
                match tokio::time::timeout(self.policy.timeout, call()).await {
                    Ok(result) => result,
                    Err(_elapsed) => Err(exn::Exn::from(ErrorKind::Timeout)),
                }
            };
            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => err,
                Err(err) => {
                    if err.is_retryable() {
                        tracing::error!(op, path, attempts = attempt, "Giving up on remote call");
                    }
                    return Err(err);
                },
            };
            let delay = self.policy.backoff(attempt).max(err.retry_after().unwrap_or_default());
            let kind: &ErrorKind = &err;
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(op, path, attempt, delay_ms, error = %kind, "Retrying remote call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl RemoteStore for ResilientBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_page(&self, folder: &str, cursor: Option<&str>) -> Result<Page> {
        self.run("list_page", folder, move || self.inner.list_page(folder, cursor)).await
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry> {
        self.run("stat", path, move || self.inner.stat(path)).await
    }

    async fn ensure_folder(&self, path: &str) -> Result<()> {
        self.run("ensure_folder", path, move || self.inner.ensure_folder(path)).await
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.run("copy", from, move || self.inner.copy(from, to)).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.run("download", path, move || self.inner.download(path)).await
    }

    async fn upload(&self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        self.run("upload", path, move || self.inner.upload(path, data, mode)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockFault, MockOp};
    use rstest::rstest;
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(1),
        }
    }

    fn wrap(mock: &Arc<MockBackend>, max_in_flight: usize) -> ResilientBackend {
        ResilientBackend::new(mock.clone(), policy(), max_in_flight)
    }

    #[rstest]
    #[case(1, 100)]
    #[case(2, 200)]
    #[case(3, 400)]
    #[case(4, 800)]
    #[case(5, 1000)]
    #[case(40, 1000)]
    fn test_backoff_is_capped_exponential(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(policy().backoff(attempt), Duration::from_millis(expected_ms));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let mock = Arc::new(MockBackend::with_files([("/src/a.jpg", b"jpeg".to_vec())]));
        mock.inject(MockOp::Download, "/src/a.jpg", MockFault::Transient(2)).await;
        let backend = wrap(&mock, 4);
        assert_eq!(backend.download("/src/a.jpg").await.unwrap(), b"jpeg");
        assert_eq!(mock.call_count(MockOp::Download), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_exhausted() {
        let mock = Arc::new(MockBackend::with_files([("/src/a.jpg", b"jpeg".to_vec())]));
        mock.inject(MockOp::Copy, "/src/a.jpg", MockFault::Transient(100)).await;
        let backend = wrap(&mock, 4);
        let err = backend.copy("/src/a.jpg", "/dst/a.jpg").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Transient(_)));
        assert_eq!(mock.call_count(MockOp::Copy), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let mock = Arc::new(MockBackend::with_files([("/src/a.jpg", b"jpeg".to_vec())]));
        mock.inject(MockOp::Upload, "/dst/a.jpg", MockFault::Unauthorized).await;
        let backend = wrap(&mock, 4);
        let err = backend.upload("/dst/a.jpg", b"x", WriteMode::Overwrite).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(mock.call_count(MockOp::Upload), 1);

        let err = backend.stat("/src/missing.jpg").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert_eq!(mock.call_count(MockOp::Stat), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_calls_time_out() {
        let mock = Arc::new(MockBackend::with_files([("/src/a.jpg", b"jpeg".to_vec())]));
        mock.inject(MockOp::Stat, "/src/a.jpg", MockFault::Stall(Duration::from_secs(30))).await;
        let backend = wrap(&mock, 4);
        let err = backend.stat("/src/a.jpg").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout));
        assert_eq!(mock.call_count(MockOp::Stat), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_calls_are_limited() {
        let mock = Arc::new(MockBackend::with_files([
            ("/src/a.jpg", b"a".to_vec()),
            ("/src/b.jpg", b"b".to_vec()),
        ]));
        let stall = MockFault::Stall(Duration::from_secs(1));
        mock.inject(MockOp::Download, "/src/a.jpg", stall).await;
        mock.inject(MockOp::Download, "/src/b.jpg", stall).await;
        let backend = wrap(&mock, 1);
        let started = Instant::now();
        let (a, b) = tokio::join!(backend.download("/src/a.jpg"), backend.download("/src/b.jpg"));
        assert_eq!(a.unwrap(), b"a");
        assert_eq!(b.unwrap(), b"b");
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_are_retried_individually() {
        let mock =
            Arc::new(MockBackend::with_files((0..5).map(|i| (format!("/src/{i}.jpg"), vec![1u8]))).with_page_size(2));
        mock.inject(MockOp::List, "/src", MockFault::Transient(1)).await;
        let backend = wrap(&mock, 4);
        assert_eq!(backend.list_all("/src").await.unwrap().len(), 5);
        // 3 pages plus the one failed attempt.
        assert_eq!(mock.call_count(MockOp::List), 4);
    }
}
