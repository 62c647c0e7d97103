use senser_core::error::QueryError;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DBError {
    #[error(transparent)]
    SQLError(#[from] sqlx::Error),
    #[error(transparent)]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl DBError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DBError::SQLError(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

/// Failure reported by one of the store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    DB(#[from] DBError),
    #[error("Sensor with same name already registered: {0}")]
    DuplicateName(String),
    #[error("Invalid payload in {backend}: {source}")]
    Payload {
        backend: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{backend}: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn backend<E: Display>(backend: &'static str, err: E) -> Self {
        StoreError::Backend {
            backend,
            message: err.to_string(),
        }
    }
}


#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Sensor not found")]
    SensorNotFound(i32),
    #[error("Sensor with same name already registered")]
    DuplicateName(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Store(StoreError),
}

impl ObserverError {
    /// Errors caused by the request rather than by a backend
    pub fn is_user(&self) -> bool {
        !matches!(self, ObserverError::Store(_))
    }
}

impl From<StoreError> for ObserverError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateName(name) => ObserverError::DuplicateName(name),
            other => ObserverError::Store(other),
        }
    }
}
