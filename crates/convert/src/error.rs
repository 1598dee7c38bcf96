//! Conversion Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A conversion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// None of these are worth retrying with the same input.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input bytes could not be decoded into pixels.
    #[display("unable to decode {_0} image")]
    Decode(#[error(not(source))] &'static str),
    /// Pixels could not be encoded as JPEG.
    #[display("unable to encode JPEG")]
    Encode,
    /// The decoder for this format was compiled out.
    #[display("{_0} decoding is not enabled in this build")]
    Disabled(#[error(not(source))] &'static str),
    /// The blocking worker running a conversion panicked or was cancelled.
    #[display("conversion task failed")]
    Task,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Decode("RAW").to_string(), "unable to decode RAW image");
        assert_eq!(ErrorKind::Disabled("RAW").to_string(), "RAW decoding is not enabled in this build");
        assert_eq!(ErrorKind::Encode.to_string(), "unable to encode JPEG");
    }
}
