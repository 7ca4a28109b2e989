//! Mock resolver for testing.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::resolver::{AssetMetadata, FetchReport, FormatSpec, ResolveTarget, Resolver, ResolverError};

use super::fixtures;

/// Mock implementation of the Resolver trait.
///
/// Fetches write a real file of a configurable size into the destination
/// directory, so everything downstream works on disk as it would in
/// production.
///
/// # Example
///
/// ```rust,ignore
/// use courier_core::testing::MockResolver;
///
/// let resolver = MockResolver::new();
/// resolver.set_fetch_size(2500);
/// resolver.script_fetch("bestaudio[ext=m4a]", vec![ResolverError::RateLimited {
///     message: "HTTP Error 429".into(),
/// }]);
/// ```
#[derive(Debug, Clone)]
pub struct MockResolver {
    /// Asset returned by every successful resolve.
    asset: Arc<RwLock<AssetMetadata>>,
    /// Errors returned by the next resolve calls, in order.
    resolve_errors: Arc<RwLock<VecDeque<ResolverError>>>,
    /// Errors returned by the next fetches of a selector, in order.
    fetch_errors: Arc<RwLock<HashMap<String, VecDeque<ResolverError>>>>,
    /// Every fetch fails with an unavailable format.
    fail_all_fetches: Arc<RwLock<bool>>,
    /// Size of the fetched file.
    fetch_size: Arc<RwLock<usize>>,
    /// Extension of the fetched file when the format does not merge.
    output_extension: Arc<RwLock<String>>,
    /// Whether the fetch reports where it wrote the file.
    report_path: Arc<RwLock<bool>>,
    resolve_calls: Arc<RwLock<Vec<String>>>,
    fetch_calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResolver {
    /// Create a new mock resolver returning [`fixtures::asset`].
    pub fn new() -> Self {
        Self {
            asset: Arc::new(RwLock::new(fixtures::asset())),
            resolve_errors: Arc::new(RwLock::new(VecDeque::new())),
            fetch_errors: Arc::new(RwLock::new(HashMap::new())),
            fail_all_fetches: Arc::new(RwLock::new(false)),
            fetch_size: Arc::new(RwLock::new(1000)),
            output_extension: Arc::new(RwLock::new("m4a".to_string())),
            report_path: Arc::new(RwLock::new(true)),
            resolve_calls: Arc::new(RwLock::new(Vec::new())),
            fetch_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn set_asset(&self, asset: AssetMetadata) {
        *self.asset.write().unwrap() = asset;
    }

    /// Queue an error for the next resolve call.
    pub fn push_resolve_error(&self, error: ResolverError) {
        self.resolve_errors.write().unwrap().push_back(error);
    }

    /// Queue errors for the next fetches of `selector`.
    pub fn script_fetch(&self, selector: &str, errors: Vec<ResolverError>) {
        self.fetch_errors
            .write()
            .unwrap()
            .entry(selector.to_string())
            .or_default()
            .extend(errors);
    }

    pub fn fail_all_fetches(&self, fail: bool) {
        *self.fail_all_fetches.write().unwrap() = fail;
    }

    pub fn set_fetch_size(&self, bytes: usize) {
        *self.fetch_size.write().unwrap() = bytes;
    }

    pub fn set_output_extension(&self, extension: &str) {
        *self.output_extension.write().unwrap() = extension.to_string();
    }

    pub fn set_report_path(&self, report: bool) {
        *self.report_path.write().unwrap() = report;
    }

    /// Queries passed to resolve, in call order.
    pub fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.read().unwrap().clone()
    }

    /// Format selectors passed to fetch, in call order.
    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.read().unwrap().clone()
    }

    fn take_fetch_error(&self, selector: &str) -> Option<ResolverError> {
        if *self.fail_all_fetches.read().unwrap() {
            return Some(ResolverError::FormatUnavailable {
                format: selector.to_string(),
                message: "Requested format is not available".to_string(),
            });
        }
        self.fetch_errors
            .write()
            .unwrap()
            .get_mut(selector)
            .and_then(|queue| queue.pop_front())
    }
}

impl Resolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    fn resolve(&self, target: &ResolveTarget) -> Result<AssetMetadata, ResolverError> {
        self.resolve_calls.write().unwrap().push(target.as_query());
        if let Some(err) = self.resolve_errors.write().unwrap().pop_front() {
            return Err(err);
        }
        let mut asset = self.asset.read().unwrap().clone();
        asset.source = target.raw().to_string();
        Ok(asset)
    }

    fn fetch(
        &self,
        asset: &AssetMetadata,
        format: &FormatSpec,
        dest_dir: &Path,
        on_progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<FetchReport, ResolverError> {
        self.fetch_calls.write().unwrap().push(format.selector.clone());

        let id = asset.id.clone().unwrap_or_else(|| "asset".to_string());
        let extension = format
            .merge_into
            .clone()
            .unwrap_or_else(|| self.output_extension.read().unwrap().clone());
        let size = *self.fetch_size.read().unwrap();

        if let Some(err) = self.take_fetch_error(&format.selector) {
            // A half-written download, as a killed fetch leaves behind.
            std::fs::write(dest_dir.join(format!("{}.{}.part", id, extension)), b"partial")?;
            return Err(err);
        }

        let total = Some(size as u64);
        on_progress(0, total);
        on_progress(size as u64 / 2, total);
        let path = dest_dir.join(format!("{}.{}", id, extension));
        std::fs::write(&path, vec![0u8; size])?;
        on_progress(size as u64, total);

        let reported_path = if *self.report_path.read().unwrap() {
            Some(path)
        } else {
            None
        };
        Ok(FetchReport {
            reported_path,
            bytes_downloaded: size as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_writes_file_and_reports_progress() {
        let dir = TempDir::new().unwrap();
        let resolver = MockResolver::new();
        resolver.set_fetch_size(64);
        let asset = resolver
            .resolve(&ResolveTarget::Search("sanam re".to_string()))
            .unwrap();

        let mut seen = Vec::new();
        let report = resolver
            .fetch(&asset, &FormatSpec::new("bestaudio"), dir.path(), &mut |b, t| {
                seen.push((b, t))
            })
            .unwrap();

        let path = report.reported_path.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
        assert_eq!(seen.last(), Some(&(64, Some(64))));
        assert_eq!(resolver.fetch_calls(), vec!["bestaudio".to_string()]);
        assert_eq!(asset.source, "sanam re");
    }

    #[test]
    fn test_scripted_fetch_error_is_consumed() {
        let dir = TempDir::new().unwrap();
        let resolver = MockResolver::new();
        resolver.script_fetch(
            "best",
            vec![ResolverError::RateLimited {
                message: "429".to_string(),
            }],
        );
        let asset = fixtures::asset();
        let spec = FormatSpec::new("best");

        assert!(resolver.fetch(&asset, &spec, dir.path(), &mut |_, _| {}).is_err());
        assert!(resolver.fetch(&asset, &spec, dir.path(), &mut |_, _| {}).is_ok());
    }
}
