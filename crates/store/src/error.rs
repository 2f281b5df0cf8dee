use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("duplicate url: {0}")]
    DuplicateUrl(String),

    #[error("not found")]
    NotFound,

    #[error("query error: {0}")]
    Query(String),
}
