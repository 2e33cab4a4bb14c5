//! Store error types.

use thiserror::Error;

/// Errors reported by a [`RecordStore`](super::RecordStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The document does not exist (or no longer exists).
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    /// Missing or rejected credentials.
    #[error("Permission denied: {0}")]
    Unauthorized(String),
    /// The request was malformed (e.g. an invalid collection name).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The store could not be reached or the connection failed.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The store answered with an unexpected failure.
    #[error("Store error ({status}): {message}")]
    Server { status: u16, message: String },
    /// A document or response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
