//! Assembling the remote store stack from configuration.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mediamig_config::{BackendConfig, Config};
use mediamig_storage::BackendHandle;
use mediamig_storage::backend::{DropboxBackend, LocalBackend, ReadOnlyBackend, ResilientBackend};
use std::sync::Arc;

/// The configured store wrapped in retries, then made read-only on a dry run.
pub fn open(config: &Config) -> Result<BackendHandle> {
    let inner: BackendHandle = match &config.backend {
        BackendConfig::Dropbox { page_size } => {
            let page_size = u32::try_from(*page_size).unwrap_or(u32::MAX);
            Arc::new(DropboxBackend::new("dropbox", &config.secret_set(), page_size).or_raise(|| ErrorKind::Backend)?)
        },
        BackendConfig::Local { root } => {
            let root = std::path::absolute(root).or_raise(|| ErrorKind::Backend)?;
            Arc::new(LocalBackend::new("local", root).or_raise(|| ErrorKind::Backend)?)
        },
    };
    tracing::debug!(backend = inner.name(), dry_run = config.dry_run, "Opened remote store");
    let store: BackendHandle =
        Arc::new(ResilientBackend::new(inner, config.retry_policy(), config.remote.max_in_flight));
    Ok(match config.dry_run {
        true => Arc::new(ReadOnlyBackend::new(store)),
        false => store,
    })
}
