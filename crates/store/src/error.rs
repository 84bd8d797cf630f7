//! Store error taxonomy.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the data-access layer.
///
/// `PermissionDenied` is a hard stop, never retried. `NotFound` is benign
/// when the caller's intent is already satisfied (e.g. deleting an
/// already-removed visit). `CapacityExceeded` covers the membership caps and
/// exhausted share-code generation. `Transport` failures on writes are
/// surfaced after a single attempt, since a retry after a partial write
/// could duplicate a visit.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid document {doc_id}: {reason}")]
    InvalidDocument { doc_id: String, reason: String },
}

impl StoreError {
    pub fn denied(msg: impl Into<String>) -> Self {
        StoreError::PermissionDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        StoreError::NotFound(msg.into())
    }

    pub(crate) fn invalid_document(doc_id: &str, err: serde_json::Error) -> Self {
        StoreError::InvalidDocument {
            doc_id: doc_id.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StoreError::denied("not a member").to_string(),
            "permission denied: not a member"
        );
        assert_eq!(
            StoreError::not_found("visit gone").to_string(),
            "not found: visit gone"
        );
        assert_eq!(
            StoreError::CapacityExceeded("3 shared maps".to_string()).to_string(),
            "capacity exceeded: 3 shared maps"
        );
    }

    #[test]
    fn test_transport_conversion() {
        let err: StoreError = TransportError::Closed.into();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
