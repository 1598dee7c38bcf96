//! The per-item state machine.
//!
//! Every item starts out pending and ends in exactly one terminal state:
//! skipped, transferred or failed. Nothing in here returns an error; failures
//! are values so one bad file can never take the run down with it.

use crate::classify::Category;
use crate::engine::Context;
use crate::plan::{Action, PlanItem, SkipReason};
use derive_more::Display;
use mediamig_convert::SourceFormat;
use mediamig_convert::error::{Error as ConvertError, ErrorKind as ConvertErrorKind};
use mediamig_storage::error::Error as StorageError;
use mediamig_storage::backend::RemoteStore;
use mediamig_storage::{BackendHandle, WriteMode, path};

/// Where in the per-item pipeline a failure happened.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Looking up whether the output already exists.
    #[display("check")]
    Check,
    #[display("copy")]
    Copy,
    #[display("download")]
    Download,
    #[display("decode")]
    Decode,
    #[display("encode")]
    Encode,
    #[display("upload")]
    Upload,
}

#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{stage} failed: {message}")]
pub struct Failure {
    pub stage: Stage,
    pub message: String,
    /// The remote rejected our credentials; nothing else will work either.
    pub fatal: bool,
}
impl Failure {
    fn storage(stage: Stage, err: &StorageError) -> Self {
        Self { stage, message: (**err).to_string(), fatal: err.is_fatal() }
    }

    fn convert(err: &ConvertError) -> Self {
        let stage = match **err {
            ConvertErrorKind::Encode => Stage::Encode,
            _ => Stage::Decode,
        };
        Self { stage, message: (**err).to_string(), fatal: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Converted,
    Copied,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub kind: TransferKind,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// Terminal state of one item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped(SkipReason),
    Transferred(Transfer),
    Failed(Failure),
}
impl ItemOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed(Failure { fatal: true, .. }))
    }
}

pub(crate) async fn migrate_item(
    store: &BackendHandle,
    ctx: &Context,
    destination: &str,
    item: &PlanItem,
) -> ItemOutcome {
    let outcome = match run_item(store, ctx, destination, item).await {
        Ok(outcome) => outcome,
        Err(failure) => {
            tracing::warn!(source = %item.source.path, stage = %failure.stage, error = %failure.message, "Item failed");
            ItemOutcome::Failed(failure)
        },
    };
    tracing::debug!(source = %item.source.path, ?outcome, "Item finished");
    outcome
}

async fn run_item(
    store: &BackendHandle,
    ctx: &Context,
    destination: &str,
    item: &PlanItem,
) -> Result<ItemOutcome, Failure> {
    let format = match item.action {
        Action::SkipUnsupported(reason) => return Ok(ItemOutcome::Skipped(reason)),
        Action::CopyVerbatim => None,
        Action::ConvertToJpeg if item.category == Category::RawImage => Some(SourceFormat::Raw),
        Action::ConvertToJpeg => Some(SourceFormat::Generic),
    };
    let target = path::join(destination, &item.destination_name).map_err(|e| Failure::storage(Stage::Check, &e))?;
    if store.exists(&target).await.map_err(|e| Failure::storage(Stage::Check, &e))? {
        return Ok(ItemOutcome::Skipped(SkipReason::AlreadyPresent));
    }
    let transfer = match format {
        None => {
            store.copy(&item.source.path, &target).await.map_err(|e| Failure::storage(Stage::Copy, &e))?;
            Transfer {
                kind: TransferKind::Copied,
                bytes_read: item.source.size,
                bytes_written: item.source.size,
            }
        },
        Some(format) => {
            let data = store.download(&item.source.path).await.map_err(|e| Failure::storage(Stage::Download, &e))?;
            let bytes_read = data.len() as u64;
            let jpeg = ctx
                .transforms
                .to_jpeg_blocking(format, data, ctx.jpeg_quality)
                .await
                .map_err(|e| Failure::convert(&e))?;
            store.upload(&target, &jpeg, WriteMode::Overwrite).await.map_err(|e| Failure::storage(Stage::Upload, &e))?;
            Transfer {
                kind: TransferKind::Converted,
                bytes_read,
                bytes_written: jpeg.len() as u64,
            }
        },
    };
    Ok(ItemOutcome::Transferred(transfer))
}
