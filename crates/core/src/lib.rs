pub mod circuit;
pub mod config;
pub mod domain;
pub mod error;
pub mod retry;

pub use circuit::CircuitBreaker;
pub use config::Config;
pub use domain::*;
pub use error::*;
pub use retry::{with_backoff, RetryPolicy};
