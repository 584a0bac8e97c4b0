//! Shared error types for the services crate.

use thiserror::Error;

use storage::StorageError;
use tracker_core::model::{CourseId, ProgressError};

/// Errors emitted by `CourseStore`.
///
/// Every variant is recoverable: the store keeps its last good state when an
/// operation fails.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("invalid progress: {0}")]
    Validation(String),
    #[error("course not found: {0}")]
    NotFound(CourseId),
    #[error("failed to reach the tracker backend: {0}")]
    Network(String),
    #[error("failed to sync courses: {0}")]
    Sync(String),
    #[error("load superseded by a newer update")]
    Superseded,
}

impl From<ProgressError> for StoreError {
    fn from(err: ProgressError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl StoreError {
    /// Map a backend failure for a read or a progress write.
    pub(crate) fn from_storage(err: StorageError, course_id: Option<CourseId>) -> Self {
        match (err, course_id) {
            (StorageError::NotFound, Some(id)) => Self::NotFound(id),
            (StorageError::Validation(msg), _) => Self::Validation(msg),
            (StorageError::Sync(msg), _) => Self::Sync(msg),
            (other, _) => Self::Network(other.to_string()),
        }
    }

    /// Map a failure of the curriculum refresh itself.
    pub(crate) fn sync(err: StorageError) -> Self {
        match err {
            StorageError::Sync(msg) => Self::Sync(msg),
            other => Self::Sync(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_the_requested_id() {
        let id = CourseId::random();
        let err = StoreError::from_storage(StorageError::NotFound, Some(id));
        assert!(matches!(err, StoreError::NotFound(found) if found == id));
    }

    #[test]
    fn transport_failures_become_network_errors() {
        let err = StoreError::from_storage(StorageError::HttpStatus(502), None);
        assert_eq!(
            err.to_string(),
            "failed to reach the tracker backend: unexpected response status 502"
        );
    }

    #[test]
    fn any_sync_failure_is_a_sync_error() {
        let err = StoreError::sync(StorageError::Network("connection refused".into()));
        assert!(matches!(err, StoreError::Sync(msg) if msg.contains("connection refused")));
    }
}
