//! Backend error types.

use thiserror::Error;

/// Errors raised before the backend produced any HTTP response.
///
/// A response with an error status is not a `BackendError`; it is returned as
/// a `MultiGetReply` and interpreted by the caller.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not connect to the backend.
    #[error("backend connection error: {message}")]
    Connection { message: String },

    /// The request did not complete within the client timeout.
    #[error("backend request timed out: {message}")]
    Timeout { message: String },

    /// The request failed while sending or while reading the body.
    #[error("backend request error: {message}")]
    Request { message: String },

    /// The client could not be built from its configuration.
    #[error("invalid backend configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
