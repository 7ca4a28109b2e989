//! Trait definitions for the resolver module.

use std::path::Path;

use super::error::ResolverError;
use super::types::{AssetMetadata, FetchReport, FormatSpec, ResolveTarget};

/// A content-resolution backend.
///
/// Both calls block the current thread; run them off the async runtime.
pub trait Resolver: Send + Sync {
    /// Returns the name of this resolver implementation.
    fn name(&self) -> &str;

    /// Looks up metadata for a locator or search query.
    fn resolve(&self, target: &ResolveTarget) -> Result<AssetMetadata, ResolverError>;

    /// Downloads `asset` in `format` into `dest_dir`.
    ///
    /// `on_progress` receives `(bytes_downloaded, total_bytes)` as the
    /// download advances.
    fn fetch(
        &self,
        asset: &AssetMetadata,
        format: &FormatSpec,
        dest_dir: &Path,
        on_progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<FetchReport, ResolverError>;

    /// Checks that the backend is usable.
    fn validate(&self) -> Result<(), ResolverError> {
        Ok(())
    }
}
