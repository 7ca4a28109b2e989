//! Request model and the task orchestrator.
//!
//! A [`Request`] enters [`TaskOrchestrator::run`] and always comes out as a
//! [`TaskReport`] whose [`Outcome`] is one of delivered, delivered as a link
//! or failed with a [`FailureKind`]. Whatever happens in between, the
//! request's working directory is gone by the time `run` returns.

mod config;
mod error;
mod orchestrator;
mod types;

pub use config::OrchestratorSettings;
pub use error::TaskError;
pub use orchestrator::{PhaseCallback, TaskOrchestrator};
pub use types::{FailureKind, Outcome, Request, RequestKind, Requester, TaskPhase, TaskReport};
