pub mod backend;
pub mod credentials;
pub mod error;
mod models;
pub mod path;

pub use crate::backend::RemoteStore;
pub use crate::models::{EntryKind, Page, RemoteEntry, WriteMode};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn RemoteStore + Send + Sync>;
