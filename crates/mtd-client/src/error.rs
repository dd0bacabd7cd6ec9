//! Error types for the request executor
//!
//! Only caller programming errors surface as `Err`. Everything that happens
//! on the wire (transport failures, API errors, refresh failures) is data on
//! the returned `CallOutcome`.

/// Fatal errors raised before any request is sent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to serialize request body: {0}")]
    Serialization(String),
}

/// Result alias for executor operations.
pub type Result<T> = std::result::Result<T, Error>;
