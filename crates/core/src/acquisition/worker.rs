//! The acquisition worker.

use std::cell::RefCell;
use std::future::ready;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::error::AcquisitionError;
use crate::config::FormatPreferences;
use crate::converter::{
    AudioTarget, Converter, ConverterError, EmbeddedMetadata, TranscodeJob, TranscodeProfile,
};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::resolver::{AssetMetadata, FetchReport, FormatSpec, ResolveTarget, Resolver};
use crate::retry::{
    truncate_tail, AttemptError, AttemptRecord, ChainSuccess, FallbackEngine, RetryPolicy,
};
use crate::task::{Request, RequestKind};
use crate::workspace::{RequestWorkspace, WorkingArtifact};

/// Result of the resolve step.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub asset: AssetMetadata,
    pub records: Vec<AttemptRecord>,
}

/// Result of fetch and normalize.
#[derive(Debug, Clone)]
pub struct Acquired {
    /// The only file left in the workspace.
    pub artifact: WorkingArtifact,
    /// Format selector that succeeded.
    pub format: String,
    /// Whether the transcoder ran.
    pub normalized: bool,
    pub records: Vec<AttemptRecord>,
}

/// Runs resolve, fetch and normalize on a blocking thread.
///
/// Every method blocks. Call them from `spawn_blocking` or another thread
/// outside the runtime passed to [`AcquisitionWorker::new`].
pub struct AcquisitionWorker {
    resolver: Arc<dyn Resolver>,
    converter: Arc<dyn Converter>,
    engine: FallbackEngine,
    formats: FormatPreferences,
    audio: AudioTarget,
    runtime: Handle,
}

impl AcquisitionWorker {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        converter: Arc<dyn Converter>,
        engine: FallbackEngine,
        runtime: Handle,
    ) -> Self {
        Self {
            resolver,
            converter,
            engine,
            formats: FormatPreferences::default(),
            audio: AudioTarget::default(),
            runtime,
        }
    }

    pub fn with_formats(mut self, formats: FormatPreferences) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_audio_target(mut self, audio: AudioTarget) -> Self {
        self.audio = audio;
        self
    }

    /// Resolve targets for a request, in the order they are tried.
    pub fn resolve_chain(request: &Request) -> Vec<ResolveTarget> {
        match (request.kind, request.is_locator()) {
            (RequestKind::Adult, _) => vec![ResolveTarget::Literal(request.query.clone())],
            (_, true) => vec![
                ResolveTarget::Literal(request.query.clone()),
                ResolveTarget::Search(request.query.clone()),
            ],
            (_, false) => vec![ResolveTarget::Search(request.query.clone())],
        }
    }

    /// Format chain for a request kind.
    pub fn format_chain(&self, kind: RequestKind) -> Vec<FormatSpec> {
        self.formats
            .for_kind(kind)
            .iter()
            .map(|selector| match kind {
                RequestKind::Video | RequestKind::Adult => {
                    FormatSpec::new(selector.as_str()).merged_into("mp4")
                }
                _ => FormatSpec::new(selector.as_str()),
            })
            .collect()
    }

    /// Resolves the request to asset metadata.
    pub fn resolve(&self, request: &Request) -> Result<Resolved, AcquisitionError> {
        let targets = Self::resolve_chain(request);
        let resolver = &self.resolver;

        let outcome = self.runtime.block_on(self.engine.run("resolve", &targets, |target| {
            debug!(request_id = %request.id, target = %target, "Resolving");
            ready(resolver.resolve(target).map_err(|e| e.to_attempt_error()))
        }));

        match outcome {
            Ok(success) => {
                info!(
                    request_id = %request.id,
                    target = %success.spec,
                    title = success.value.title(),
                    "Resolved asset"
                );
                Ok(Resolved {
                    asset: success.value,
                    records: success.records,
                })
            }
            Err(failure) => Err(AcquisitionError::ResolveFailed(failure)),
        }
    }

    /// Fetches the asset over the format chain and normalizes the result.
    ///
    /// Progress goes through `reporter`; the final event is always sent once
    /// the fetch chain succeeds.
    pub fn fetch_and_normalize(
        &self,
        request: &Request,
        asset: &AssetMetadata,
        workspace: &RequestWorkspace,
        reporter: &mut ProgressReporter,
    ) -> Result<Acquired, AcquisitionError> {
        let formats = self.format_chain(request.kind);
        let resolver = &self.resolver;
        let mut last_total: Option<u64> = None;

        let outcome = self.runtime.block_on(self.engine.run("fetch", &formats, |format| {
            debug!(request_id = %request.id, format = %format, "Fetching");
            let mut on_progress = |bytes: u64, total: Option<u64>| {
                if total.is_some() {
                    last_total = total;
                }
                reporter.notify(ProgressEvent::new(bytes, total));
            };
            let result = resolver.fetch(asset, format, workspace.dir(), &mut on_progress);
            if let Err(ref e) = result {
                warn!(request_id = %request.id, format = %format, error = %e, "Fetch attempt failed");
                discard_partial(workspace);
            }
            ready(result.map_err(|e| e.to_attempt_error()))
        }));

        let ChainSuccess {
            value: report,
            spec: format,
            mut records,
            ..
        } = outcome.map_err(AcquisitionError::NoMatchingStream)?;

        reporter.complete(report.bytes_downloaded, last_total);

        let source = WorkingArtifact::open(locate_fetched(workspace, &report)?)?;
        info!(
            request_id = %request.id,
            format = %format,
            file = %source.file_name(),
            bytes = source.size_bytes(),
            "Fetched asset"
        );

        let (artifact, normalized) =
            self.normalize(request, asset, source, workspace, &mut records)?;

        Ok(Acquired {
            artifact,
            format,
            normalized,
            records,
        })
    }

    /// Resolve followed by fetch and normalize.
    pub fn acquire(
        &self,
        request: &Request,
        workspace: &RequestWorkspace,
        reporter: &mut ProgressReporter,
    ) -> Result<(Resolved, Acquired), AcquisitionError> {
        let resolved = self.resolve(request)?;
        let acquired = self.fetch_and_normalize(request, &resolved.asset, workspace, reporter)?;
        Ok((resolved, acquired))
    }

    fn target_profile(&self, kind: RequestKind) -> TranscodeProfile {
        match kind {
            RequestKind::Audio => self.audio.profile(),
            _ => TranscodeProfile::Mp4,
        }
    }

    fn normalize(
        &self,
        request: &Request,
        asset: &AssetMetadata,
        source: WorkingArtifact,
        workspace: &RequestWorkspace,
        records: &mut Vec<AttemptRecord>,
    ) -> Result<(WorkingArtifact, bool), AcquisitionError> {
        let profile = self.target_profile(request.kind);
        if source.extension() == profile.extension() {
            debug!(request_id = %request.id, "Already in target encoding");
            return Ok((source, false));
        }

        let output = source.path().with_extension(profile.extension());
        let mut job = TranscodeJob::new(&request.id, source.path(), &output, profile.clone());
        if request.kind == RequestKind::Audio {
            job = job.with_metadata(EmbeddedMetadata {
                title: asset.title.clone(),
                artist: asset.uploader.clone(),
            });
        }

        let tail_chars = self.engine.policy().diagnostic_tail_chars;
        let single = FallbackEngine::new(RetryPolicy::single_attempt().with_diagnostic_tail(tail_chars));
        let last_error: RefCell<Option<ConverterError>> = RefCell::new(None);
        let converter = &self.converter;

        let outcome = self.runtime.block_on(single.run(
            "normalize",
            std::slice::from_ref(&profile),
            |_| {
                let job = job.clone();
                let last_error = &last_error;
                async move {
                    converter.transcode(job).await.map_err(|e| {
                        let attempt = AttemptError::fatal(e.to_string());
                        *last_error.borrow_mut() = Some(e);
                        attempt
                    })
                }
            },
        ));

        match outcome {
            Ok(success) => records.extend(success.records),
            Err(failure) => {
                let error = last_error.into_inner();
                if let Some(tool) = error.as_ref().and_then(|e| e.missing_tool()) {
                    return Err(AcquisitionError::NormalizationToolUnavailable {
                        tool: tool.to_string(),
                    });
                }
                let diagnostic = error
                    .as_ref()
                    .and_then(|e| e.stderr())
                    .map(|s| truncate_tail(s, tail_chars))
                    .unwrap_or_else(|| failure.diagnostic.clone());
                let reason = error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| failure.diagnostic.clone());
                return Err(AcquisitionError::NormalizationFailed { reason, diagnostic });
            }
        }

        let output_path = if output.is_file() {
            output
        } else {
            warn!(
                request_id = %request.id,
                expected = %output.display(),
                "Normalized output missing, scanning workspace"
            );
            match scan_workspace(workspace, Some(source.path()))? {
                Some(path) => path,
                None => {
                    return Err(AcquisitionError::OutputMissing {
                        expected: output.display().to_string(),
                    })
                }
            }
        };

        let artifact = WorkingArtifact::open(output_path)?;
        source.remove()?;
        info!(
            request_id = %request.id,
            profile = %profile,
            bytes = artifact.size_bytes(),
            "Normalized artifact"
        );
        Ok((artifact, true))
    }
}

/// Finds the fetched file, falling back to the newest file in the workspace.
fn locate_fetched(
    workspace: &RequestWorkspace,
    report: &FetchReport,
) -> Result<PathBuf, AcquisitionError> {
    match &report.reported_path {
        Some(path) if path.is_file() && workspace.contains(path) => return Ok(path.clone()),
        Some(path) => warn!(
            request_id = workspace.request_id(),
            reported = %path.display(),
            "Reported output missing, scanning workspace"
        ),
        None => warn!(
            request_id = workspace.request_id(),
            "No output path reported, scanning workspace"
        ),
    }

    scan_workspace(workspace, None)?.ok_or_else(|| AcquisitionError::OutputMissing {
        expected: workspace.dir().display().to_string(),
    })
}

/// Last-resort lookup: the most recently modified file of the workspace.
///
/// Only sound because every request owns its own directory.
fn scan_workspace(
    workspace: &RequestWorkspace,
    exclude: Option<&Path>,
) -> Result<Option<PathBuf>, AcquisitionError> {
    let found = workspace
        .most_recent_file()?
        .filter(|path| Some(path.as_path()) != exclude);
    if let Some(ref path) = found {
        warn!(
            request_id = workspace.request_id(),
            file = %path.display(),
            "Using most recent workspace file"
        );
    }
    Ok(found)
}

/// Removes whatever a failed fetch attempt left behind.
fn discard_partial(workspace: &RequestWorkspace) {
    let files = match workspace.files() {
        Ok(files) => files,
        Err(e) => {
            warn!(request_id = workspace.request_id(), error = %e, "Failed to list workspace");
            return;
        }
    };
    for path in files {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(file = %path.display(), error = %e, "Failed to remove partial file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryTarget;
    use crate::progress::progress_bridge;
    use crate::resolver::ResolverError;
    use crate::task::Requester;
    use crate::testing::{MockConverter, MockResolver};
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(kind: RequestKind, query: &str) -> Request {
        Request::new(
            kind,
            query,
            Requester {
                id: 7,
                display_name: "bob".to_string(),
            },
            DeliveryTarget::new(42),
        )
    }

    fn worker(
        runtime: &tokio::runtime::Runtime,
        resolver: &MockResolver,
        converter: &MockConverter,
    ) -> AcquisitionWorker {
        let engine = FallbackEngine::new(
            RetryPolicy::default().with_initial_delay(Duration::from_millis(1)),
        );
        AcquisitionWorker::new(
            Arc::new(resolver.clone()),
            Arc::new(converter.clone()),
            engine,
            runtime.handle().clone(),
        )
    }

    #[test]
    fn test_resolve_chain_for_locator_and_text() {
        let chain = AcquisitionWorker::resolve_chain(&request(RequestKind::Audio, "sanam re"));
        assert_eq!(chain, vec![ResolveTarget::Search("sanam re".to_string())]);

        let url = "https://www.youtube.com/watch?v=abc";
        let chain = AcquisitionWorker::resolve_chain(&request(RequestKind::Video, url));
        assert_eq!(
            chain,
            vec![
                ResolveTarget::Literal(url.to_string()),
                ResolveTarget::Search(url.to_string())
            ]
        );

        let chain = AcquisitionWorker::resolve_chain(&request(RequestKind::Adult, url));
        assert_eq!(chain, vec![ResolveTarget::Literal(url.to_string())]);
    }

    #[test]
    fn test_video_formats_merge_into_mp4() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let worker = worker(&runtime, &MockResolver::new(), &MockConverter::new());
        let chain = worker.format_chain(RequestKind::Video);
        assert!(chain.iter().all(|f| f.merge_into.as_deref() == Some("mp4")));
        let chain = worker.format_chain(RequestKind::Audio);
        assert_eq!(chain[0].selector, "bestaudio[ext=m4a]");
        assert!(chain[0].merge_into.is_none());
    }

    #[test]
    fn test_resolve_falls_back_to_search() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let resolver = MockResolver::new();
        resolver.push_resolve_error(ResolverError::NotFound {
            message: "unsupported url".to_string(),
        });
        let worker = worker(&runtime, &resolver, &MockConverter::new());

        let resolved = worker
            .resolve(&request(RequestKind::Audio, "https://example.com/x"))
            .unwrap();
        assert_eq!(resolved.asset.title(), "Sanam Re");
        assert_eq!(
            resolver.resolve_calls(),
            vec![
                "https://example.com/x".to_string(),
                "ytsearch1:https://example.com/x".to_string()
            ]
        );
        assert_eq!(resolved.records.len(), 2);
    }

    #[test]
    fn test_fetch_advances_format_and_discards_partial_files() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let resolver = MockResolver::new();
        let converter = MockConverter::new();
        resolver.script_fetch(
            "bestaudio[ext=m4a]",
            vec![ResolverError::FormatUnavailable {
                format: "bestaudio[ext=m4a]".to_string(),
                message: "requested format is not available".to_string(),
            }],
        );
        let worker = worker(&runtime, &resolver, &converter);
        let req = request(RequestKind::Audio, "sanam re");
        let workspace = RequestWorkspace::create(dir.path(), &req.id).unwrap();
        let (mut reporter, _pump) = progress_bridge(Duration::ZERO);

        let resolved = worker.resolve(&req).unwrap();
        let acquired = worker
            .fetch_and_normalize(&req, &resolved.asset, &workspace, &mut reporter)
            .unwrap();

        assert_eq!(acquired.format, "bestaudio[ext=webm]");
        assert!(acquired.normalized);
        assert_eq!(acquired.artifact.extension(), "mp3");
        assert_eq!(workspace.files().unwrap(), vec![acquired.artifact.path().to_path_buf()]);
        assert!(reporter.is_finished());
        workspace.cleanup();
    }

    #[test]
    fn test_mp3_fetch_skips_normalization() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let resolver = MockResolver::new();
        resolver.set_output_extension("mp3");
        let converter = MockConverter::new();
        let worker = worker(&runtime, &resolver, &converter);
        let req = request(RequestKind::Audio, "sanam re");
        let workspace = RequestWorkspace::create(dir.path(), &req.id).unwrap();
        let (mut reporter, _pump) = progress_bridge(Duration::ZERO);

        let (_, acquired) = worker.acquire(&req, &workspace, &mut reporter).unwrap();
        assert!(!acquired.normalized);
        assert!(converter.recorded_jobs().is_empty());
        workspace.cleanup();
    }

    #[test]
    fn test_unreported_output_found_by_scan() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let resolver = MockResolver::new();
        resolver.set_report_path(false);
        let worker = worker(&runtime, &resolver, &MockConverter::new());
        let req = request(RequestKind::Video, "some clip");
        let workspace = RequestWorkspace::create(dir.path(), &req.id).unwrap();
        let (mut reporter, _pump) = progress_bridge(Duration::ZERO);

        let (_, acquired) = worker.acquire(&req, &workspace, &mut reporter).unwrap();
        assert_eq!(acquired.artifact.extension(), "mp4");
        assert!(acquired.artifact.exists());
        workspace.cleanup();
    }

    #[test]
    fn test_missing_ffmpeg_is_reported_as_tool_unavailable() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let resolver = MockResolver::new();
        let converter = MockConverter::new();
        converter.set_unavailable(true);
        let worker = worker(&runtime, &resolver, &converter);
        let req = request(RequestKind::Audio, "sanam re");
        let workspace = RequestWorkspace::create(dir.path(), &req.id).unwrap();
        let (mut reporter, _pump) = progress_bridge(Duration::ZERO);

        let err = worker.acquire(&req, &workspace, &mut reporter).unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::NormalizationToolUnavailable { ref tool } if tool == "ffmpeg"
        ));
        workspace.cleanup();
    }

    #[test]
    fn test_exhausted_format_chain() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let resolver = MockResolver::new();
        resolver.fail_all_fetches(true);
        let worker = worker(&runtime, &resolver, &MockConverter::new());
        let req = request(RequestKind::Video, "some clip");
        let workspace = RequestWorkspace::create(dir.path(), &req.id).unwrap();
        let (mut reporter, _pump) = progress_bridge(Duration::ZERO);

        let err = worker.acquire(&req, &workspace, &mut reporter).unwrap_err();
        assert!(matches!(err, AcquisitionError::NoMatchingStream(_)));
        assert_eq!(err.records().len(), 3);
        assert!(workspace.files().unwrap().is_empty());
        workspace.cleanup();
    }
}
