use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Invalid bucket size: {0}")]
    InvalidBucket(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid search query: {0}")]
    InvalidSearchQuery(String),
}
