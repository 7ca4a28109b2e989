//! Progress bridge between a blocking worker and the async caller.
//!
//! The worker owns a [`ProgressReporter`]: a single writer that throttles
//! events and pushes the survivors into an unbounded channel, which is safe
//! to use from a plain OS thread. The caller drives the matching
//! [`ProgressPump`], which forwards events to a [`ProgressSink`] such as an
//! editable status message.

mod bridge;
mod render;
mod sink;

pub use bridge::{progress_bridge, ProgressEvent, ProgressPump, ProgressReporter, PumpSummary};
pub use render::{format_megabytes, render_progress};
pub use sink::{ProgressSink, StatusMessageSink};
