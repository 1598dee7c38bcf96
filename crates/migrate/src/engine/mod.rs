//! The migration engine.
//!
//! [`migrate`] lists a flat source folder, plans every file, then works
//! through the plan with bounded concurrency, reporting progress as a stream
//! of [`MigrationEvent`]s. Re-running it against the same folders is safe:
//! outputs that already exist are skipped, never rewritten.

mod item;
mod run;

use self::item::migrate_item;
pub use self::item::{Failure, ItemOutcome, Stage, Transfer, TransferKind};
pub use self::run::{Counts, FailureRecord, MigrationReport, MigrationRun, NO_EXTENSION, RunStatus, SizeReport};
use crate::error::{ErrorKind, Result};
use crate::estimate::{EstimateFactors, EstimateReport, estimate};
use crate::plan::{PlanItem, Policy, plan};
use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt, TryStreamExt};
use mediamig_convert::Transforms;
use mediamig_storage::BackendHandle;
use mediamig_storage::backend::RemoteStore;
use mediamig_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use std::pin::pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Everything a run needs besides the store and the folders.
#[derive(Clone)]
pub struct Context {
    pub policy: Policy,
    pub factors: EstimateFactors,
    pub transforms: Transforms,
    pub jpeg_quality: u8,
    /// Items worked on at the same time. `0` is treated as `1`.
    pub concurrency: usize,
    /// Stops dispatching new items once cancelled; in-flight items finish.
    pub cancel: CancellationToken,
}
impl Default for Context {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            factors: EstimateFactors::default(),
            transforms: Transforms::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }
}

/// Progress events emitted by [`migrate`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Planned`](Self::Planned), exactly once, after the source was listed.
/// 3. [`ItemFinished`](Self::ItemFinished), once per dispatched item, in
///    completion order.
/// 4. [`Finished`](Self::Finished), exactly once.
///
/// An error terminates the stream early; it can only happen before the first
/// item is dispatched.
#[derive(Clone, Debug)]
pub enum MigrationEvent {
    Started {
        source: String,
        destination: String,
    },
    Planned {
        total: usize,
        estimate: EstimateReport,
    },
    ItemFinished {
        /// 1-based position in the plan.
        index: usize,
        /// Items finished so far, this one included.
        finished: usize,
        total: usize,
        item: PlanItem,
        outcome: ItemOutcome,
        elapsed: Duration,
        /// `None` until there is an average to extrapolate from.
        remaining: Option<Duration>,
    },
    Finished(MigrationReport),
}

/// Stream [`MigrationEvent`]s while migrating `source` into `destination`.
///
/// Refuses to do anything (not even create the destination) if `source` is
/// missing, has subfolders, or cannot be listed. A fatal item failure (the
/// remote rejecting our credentials) halts dispatch the same way
/// cancellation does, and the report comes back
/// [`Partial`](RunStatus::Partial).
pub fn migrate<'a>(
    store: &'a BackendHandle,
    ctx: &'a Context,
    source: &'a str,
    destination: &'a str,
) -> impl Stream<Item = Result<MigrationEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(MigrationEvent::Started { source: source.to_string(), destination: destination.to_string() });

        let entries = match store.list_all(source).await {
            Ok(entries) => entries,
            Err(e) => {
                yield Err(ErrorKind::storage(e, source));
                return;
            },
        };
        let (items, estimate) = match plan(&entries, &ctx.policy)
            .and_then(|items| Ok((items, estimate(&entries, &ctx.policy, &ctx.factors)?)))
        {
            Ok(planned) => planned,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let total = items.len();
        tracing::info!(source, destination, total, "Planned migration");
        yield Ok(MigrationEvent::Planned { total, estimate });

        if let Err(e) = store.ensure_folder(destination).await {
            yield Err(ErrorKind::storage(e, destination));
            return;
        }

        let halt = ctx.cancel.child_token();
        let concurrency = ctx.concurrency.max(1);
        let mut run = MigrationRun::new(source, destination, total);
        let mut pending = items.into_iter().enumerate();
        let mut dispatched = 0;
        let mut processing = FuturesUnordered::new();
        loop {
            // Pop-n-push, FIFO, until halted.
            while processing.len() < concurrency && !halt.is_cancelled() {
                let Some((index, item)) = pending.next() else {
                    break;
                };
                dispatched += 1;
                processing.push(async move {
                    let outcome = migrate_item(store, ctx, destination, &item).await;
                    (index, item, outcome)
                });
            }
            let Some((index, item, outcome)) = processing.next().await else {
                break;
            };
            run.record(index + 1, &item, &outcome);
            if outcome.is_fatal() && !halt.is_cancelled() {
                tracing::error!(source = %item.source.path, "Remote rejected the credentials; halting");
                halt.cancel();
            }
            yield Ok(MigrationEvent::ItemFinished {
                index: index + 1,
                finished: run.finished(),
                total,
                item,
                outcome,
                elapsed: run.elapsed(),
                remaining: run.remaining(),
            });
        }

        let status = if dispatched == total { RunStatus::Complete } else { RunStatus::Partial };
        if status == RunStatus::Partial {
            tracing::warn!(dispatched, total, "Run stopped before every item was dispatched");
        }
        let sizes = match (folder_size(store, source).await, folder_size(store, destination).await) {
            (Ok(original), Ok(converted)) => Some(SizeReport::new(original, converted)),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %*e, "Unable to re-list folders for the size report");
                None
            },
        };
        let report = run.finish(status, sizes);
        tracing::info!(status = %report.status, failed = report.counts.failed, "Migration finished");
        yield Ok(MigrationEvent::Finished(report));
    })
}

/// Drive [`migrate`] to the end and return its report.
pub async fn migrate_all(
    store: &BackendHandle,
    ctx: &Context,
    source: &str,
    destination: &str,
) -> Result<MigrationReport> {
    let mut events = pin!(migrate(store, ctx, source, destination));
    while let Some(event) = events.try_next().await? {
        if let MigrationEvent::Finished(report) = event {
            return Ok(report);
        }
    }
    exn::bail!(ErrorKind::Storage)
}

/// Total size of the files directly inside `folder`; a missing folder is empty.
async fn folder_size(store: &BackendHandle, folder: &str) -> StorageResult<u64> {
    match store.list_all(folder).await {
        Ok(entries) => Ok(entries.iter().filter(|e| e.is_file()).map(|e| e.size).sum()),
        Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => Ok(0),
        Err(e) => Err(e),
    }
}
