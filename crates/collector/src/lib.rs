pub mod http;
pub mod service;

pub use http::{build_router, AppState};
pub use service::{CollectionSummary, CollectorService};
