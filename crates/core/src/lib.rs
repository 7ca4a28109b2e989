pub mod acquisition;
pub mod config;
pub mod converter;
pub mod delivery;
pub mod generation;
pub mod metrics;
pub mod postprocess;
pub mod progress;
pub mod resolver;
pub mod retry;
pub mod task;
pub mod testing;
pub mod workspace;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use retry::{AttemptError, FallbackEngine, RetryPolicy};
pub use task::{
    FailureKind, Outcome, PhaseCallback, Request, RequestKind, Requester, TaskError,
    TaskOrchestrator, TaskPhase, TaskReport,
};
