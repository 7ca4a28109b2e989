//! Ordered fallback with bounded retry.
//!
//! A fallback chain is an ordered list of attempt specs (format selectors,
//! encoder profiles, remote model ids). The [`FallbackEngine`] walks the list
//! front to back, retrying each spec on transient failures with exponential
//! backoff, and returns the first success it sees.
//!
//! ```ignore
//! let engine = FallbackEngine::new(RetryPolicy::default());
//! let formats = vec!["bestaudio[ext=m4a]".to_string(), "bestaudio".to_string()];
//! let fetched = engine
//!     .run("fetch", &formats, |format| fetch_with(format))
//!     .await?;
//! println!("won with {}", fetched.spec);
//! ```

mod engine;
mod types;

pub use engine::FallbackEngine;
pub use types::{
    truncate_tail, AttemptError, AttemptRecord, AttemptStatus, ChainFailure, ChainSuccess,
    RetryPolicy,
};
