use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("template error: {0}")]
    Template(String),

    #[error("rendered markdown failed validation: {0}")]
    InvalidMarkdown(String),
}
