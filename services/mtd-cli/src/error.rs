//! CLI-specific error types

use thiserror::Error;

/// Errors raised by the CLI itself, around API calls.
///
/// API failures are not errors here: they come back as a `CallOutcome`
/// with `CallStatus::Error` and are printed like any other outcome.
#[derive(Error, Debug)]
pub enum Error {
    #[error("token file error: {0}")]
    TokenFile(String),
}

/// Result alias using CLI Error
pub type Result<T> = std::result::Result<T, Error>;
