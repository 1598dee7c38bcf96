//! Command-line Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("unable to open the remote store")]
    Backend,
    #[display("unable to list folders")]
    Listing,
    #[display("migration aborted")]
    Migration,
    #[display("audit failed")]
    Audit,
}
