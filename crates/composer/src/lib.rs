pub mod handler;
pub mod http;
pub mod service;

pub use handler::ComposerHandler;
pub use http::{build_router, AppState};
pub use service::ComposerService;
