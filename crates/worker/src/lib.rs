pub mod health;
pub mod metrics;
pub mod shutdown;
pub mod stage;

pub use health::{run_check, CheckResult, HealthResponse};
pub use metrics::StageMetrics;
pub use shutdown::wait_for_shutdown_signal;
pub use stage::{run_stage_loop, StageError, StageHandler, StageLoopConfig};
