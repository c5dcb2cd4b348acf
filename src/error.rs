use thiserror::Error;
use uuid::Uuid;

/// Failure reported by a backing store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;

#[derive(Debug, Error, PartialEq)]
pub enum AttendanceError {
    /// A required field was missing; nothing was written.
    #[error("missing required field: {field}")]
    Validation { field: &'static str },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// The row mutation itself failed.
    #[error("store operation failed: {0}")]
    Store(StoreError),

    /// The row mutation committed but the counter call did not.
    #[error("filled counter update for position {position_id} failed: {source}")]
    RpcFailure {
        position_id: Uuid,
        #[source]
        source: StoreError,
    },
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => AttendanceError::NotFound { entity, id },
            other => AttendanceError::Store(other),
        }
    }
}
