use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Row source query failed: {0}")]
    RowSource(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid term code: {0}")]
    InvalidTerm(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Content node {0} not found")]
    NodeNotFound(i64),

    #[error("Other error: {0}")]
    Other(String),
}

impl AuditError {
    /// Wraps a backing-store error raised inside a `RowSource` implementation.
    pub fn row_source<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AuditError::RowSource(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
