use thiserror::Error;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error: {status} — {body}")]
    Api { status: u16, body: String },
}
