use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository (storage) operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("thread belongs to another user")]
    Forbidden,
}

/// Errors raised before a relay cycle starts streaming.
///
/// Once a stream is open nothing is reported through this type: upstream
/// failures end the cycle softly and assistant persistence failures are
/// only logged.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("thread belongs to another user")]
    Forbidden,

    #[error("persistence error: {0}")]
    Persistence(RepositoryError),

    #[error("provider error: {0}")]
    Provider(#[from] LlmError),
}

impl From<RepositoryError> for RelayError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Forbidden => RelayError::Forbidden,
            other => RelayError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_repository_error_maps_to_forbidden() {
        let err: RelayError = RepositoryError::Forbidden.into();
        assert!(matches!(err, RelayError::Forbidden));
    }

    #[test]
    fn test_other_repository_errors_map_to_persistence() {
        let err: RelayError = RepositoryError::Query("disk full".into()).into();
        assert!(matches!(err, RelayError::Persistence(RepositoryError::Query(_))));
        assert_eq!(err.to_string(), "persistence error: query error: disk full");
    }
}
