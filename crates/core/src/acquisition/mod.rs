//! Blocking resolve, fetch and normalize.
//!
//! The [`AcquisitionWorker`] runs on a blocking thread. It is handed the
//! runtime of its orchestrator at construction and drives the async fallback
//! engine and transcoder from there with `Handle::block_on`.
//!
//! A fetch walks the format chain of the request kind. Between attempts the
//! request workspace is emptied so a failed attempt never leaves a partial
//! file next to the next one.

mod error;
mod worker;

pub use error::AcquisitionError;
pub use worker::{Acquired, AcquisitionWorker, Resolved};
