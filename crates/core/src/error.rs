use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("bus error: {0}")]
    Bus(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("schema validation failed: {0}")]
    InvalidSchema(String),

    #[error("external service error: {0}")]
    External(String),

    #[error("circuit open for {0}")]
    CircuitOpen(String),

    #[error("{0}")]
    Other(String),
}
