pub mod cron_time;
pub mod http;
pub mod job;

pub use cron_time::{daily_schedule, duration_until_next};
pub use http::build_router;
pub use job::DailyJob;
