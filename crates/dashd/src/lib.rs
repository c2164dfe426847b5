pub mod error;
mod handle;
pub mod ring_log;
pub mod sampler;
pub mod supervisor;

pub use error::SupervisorError;
pub use ring_log::{LogStream, RingLog, MAX_LOG_LINES};
pub use sampler::{MetricsSampler, METRICS_INTERVAL, SAMPLE_TIMEOUT};
pub use supervisor::{Supervisor, SupervisorConfig, KILL_GRACE, RUN_GRACE, STOP_GRACE};
