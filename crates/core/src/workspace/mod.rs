//! Per-request working directories.
//!
//! Every request gets its own directory under the configured root, named
//! after the request id. All intermediate and final files of that request
//! live there, so nothing one request does can touch another's files, and
//! cleanup is a single recursive removal.

mod artifact;
mod request;

pub use artifact::WorkingArtifact;
pub use request::{CleanupReport, RequestWorkspace};
