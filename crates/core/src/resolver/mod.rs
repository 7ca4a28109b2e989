//! Content resolution: turning a locator or search phrase into asset
//! metadata, then fetching a concrete stream of that asset to disk.
//!
//! The [`Resolver`] trait is deliberately blocking. Fetches can take many
//! minutes and are driven by an external process, so they run on a worker
//! thread (see [`crate::acquisition`]) and report byte progress through a
//! callback.

mod config;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use config::ResolverConfig;
pub use error::ResolverError;
pub use traits::Resolver;
pub use types::{AssetMetadata, FetchReport, FormatSpec, ResolveTarget};
pub use ytdlp::{parse_progress_line, YtDlpResolver};
