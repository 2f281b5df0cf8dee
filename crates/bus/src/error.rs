use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("stream not found: {0}")]
    NotFound(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("provider error: {0}")]
    Provider(String),
}
