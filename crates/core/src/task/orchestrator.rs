//! Request lifecycle.
//!
//! `Received → Resolving → Acquiring → PostProcessing → Delivering → Cleanup
//! → Terminal`. Phases only move forward. Cleanup is entered from every exit,
//! including a panic inside the request.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use super::config::OrchestratorSettings;
use super::error::TaskError;
use super::types::{Outcome, Request, RequestKind, TaskPhase, TaskReport};
use crate::acquisition::AcquisitionWorker;
use crate::config::Config;
use crate::converter::Converter;
use crate::delivery::caption::{image_caption, link_caption, media_caption};
use crate::delivery::{DeliveryGateway, MessageHandle, Payload};
use crate::generation::{generate_with_fallbacks, GenerationBackend};
use crate::metrics;
use crate::postprocess::{link_reference, Enforced, SizeEnforcer};
use crate::progress::{progress_bridge, StatusMessageSink};
use crate::resolver::Resolver;
use crate::retry::{truncate_tail, AttemptRecord, FallbackEngine};
use crate::workspace::RequestWorkspace;

/// Callback invoked with `(request_id, phase)` on every phase change.
pub type PhaseCallback = Arc<dyn Fn(&str, TaskPhase) + Send + Sync>;

/// Drives one request at a time through the pipeline.
///
/// Independent requests can run concurrently on the same orchestrator; they
/// share nothing but the workspace root, under which each gets its own
/// directory.
pub struct TaskOrchestrator {
    resolver: Arc<dyn Resolver>,
    converter: Arc<dyn Converter>,
    gateway: Arc<dyn DeliveryGateway>,
    generator: Arc<dyn GenerationBackend>,
    settings: OrchestratorSettings,
    phase_callback: Option<PhaseCallback>,
}

/// Mutable bookkeeping of one run. Lives outside the panic boundary.
struct RunState {
    request_id: String,
    phases: Vec<TaskPhase>,
    attempts: Vec<AttemptRecord>,
    workspace: Option<Arc<RequestWorkspace>>,
    callback: Option<PhaseCallback>,
}

impl RunState {
    fn enter(&mut self, phase: TaskPhase) {
        debug!(request_id = %self.request_id, phase = phase.as_str(), "Entering phase");
        self.phases.push(phase);
        if let Some(ref callback) = self.callback {
            callback(&self.request_id, phase);
        }
    }

    fn record(&mut self, records: &[AttemptRecord]) {
        self.attempts.extend_from_slice(records);
    }
}

impl TaskOrchestrator {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        converter: Arc<dyn Converter>,
        gateway: Arc<dyn DeliveryGateway>,
        generator: Arc<dyn GenerationBackend>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            resolver,
            converter,
            gateway,
            generator,
            settings,
            phase_callback: None,
        }
    }

    /// Create an orchestrator with settings taken from `config`.
    pub fn from_config(
        config: &Config,
        resolver: Arc<dyn Resolver>,
        converter: Arc<dyn Converter>,
        gateway: Arc<dyn DeliveryGateway>,
        generator: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self::new(
            resolver,
            converter,
            gateway,
            generator,
            OrchestratorSettings::from_config(config),
        )
    }

    pub fn with_phase_callback(mut self, callback: PhaseCallback) -> Self {
        self.phase_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Runs a request to completion. Never fails and never panics; every
    /// failure ends up in the report's outcome.
    pub async fn run(&self, request: Request) -> TaskReport {
        let started = Instant::now();
        let mut state = RunState {
            request_id: request.id.clone(),
            phases: Vec::new(),
            attempts: Vec::new(),
            workspace: None,
            callback: self.phase_callback.clone(),
        };

        state.enter(TaskPhase::Received);
        info!(
            request_id = %request.id,
            kind = %request.kind,
            query = %request.query,
            requester = request.requester.id,
            "Request received"
        );

        let status = self.post_status(&request).await;

        let result = AssertUnwindSafe(self.execute(&request, &mut state, status.as_ref()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TaskError::Internal(panic_message(panic))));

        state.enter(TaskPhase::Cleanup);
        let cleanup = state.workspace.take().map(|workspace| workspace.cleanup());

        let tail_chars = self.settings.delivery.diagnostic_tail_chars;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    request_id = %request.id,
                    kind = err.kind().as_str(),
                    error = %err,
                    "Request failed"
                );
                metrics::REQUEST_FAILURES
                    .with_label_values(&[err.kind().as_str()])
                    .inc();
                Outcome::Failed {
                    kind: err.kind(),
                    message: err.user_message(tail_chars),
                    diagnostic: truncate_tail(&err.diagnostic(), tail_chars),
                }
            }
        };

        self.finish_status(&request, status, &outcome).await;

        state.enter(TaskPhase::Terminal);
        let elapsed = started.elapsed();
        metrics::REQUESTS_TOTAL
            .with_label_values(&[request.kind.as_str(), outcome.label()])
            .inc();
        metrics::REQUEST_DURATION
            .with_label_values(&[request.kind.as_str()])
            .observe(elapsed.as_secs_f64());
        info!(
            request_id = %request.id,
            outcome = outcome.label(),
            attempts = state.attempts.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Request finished"
        );

        TaskReport {
            request_id: request.id,
            kind: request.kind,
            outcome,
            phases: state.phases,
            attempts: state.attempts,
            cleanup,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    async fn execute(
        &self,
        request: &Request,
        state: &mut RunState,
        status: Option<&MessageHandle>,
    ) -> Result<Outcome, TaskError> {
        request.validate()?;

        if request.kind == RequestKind::Image {
            return self.generate_image(request, state).await;
        }

        if let Err(e) = self.converter.validate().await {
            error!(request_id = %request.id, error = %e, "Transcoder unavailable");
            return Err(match e.missing_tool() {
                Some(tool) => TaskError::missing_tool(tool),
                None => TaskError::NormalizationFailure {
                    reason: e.to_string(),
                    missing_tool: None,
                    diagnostic: e.stderr().unwrap_or_default().to_string(),
                },
            });
        }

        let workspace = RequestWorkspace::create(&self.settings.workspace_root, &request.id)
            .map_err(|e| TaskError::Internal(format!("failed to create workspace: {}", e)))?;
        state.workspace = Some(Arc::clone(&workspace));

        let worker = Arc::new(
            AcquisitionWorker::new(
                Arc::clone(&self.resolver),
                Arc::clone(&self.converter),
                FallbackEngine::new(self.settings.retry.clone()),
                Handle::current(),
            )
            .with_formats(self.settings.formats.clone())
            .with_audio_target(self.settings.media.audio.clone()),
        );

        // Resolve
        state.enter(TaskPhase::Resolving);
        let resolved = {
            let worker = Arc::clone(&worker);
            let request = request.clone();
            tokio::task::spawn_blocking(move || worker.resolve(&request))
                .await
                .map_err(worker_failed)?
        };
        let resolved = resolved.map_err(|e| {
            state.record(e.records());
            TaskError::from(e)
        })?;
        state.record(&resolved.records);
        let asset = resolved.asset;

        // Fetch and normalize, with progress edits on the status message
        state.enter(TaskPhase::Acquiring);
        let (mut reporter, pump) = progress_bridge(self.settings.throttle_interval());
        let pump_task = status.map(|handle| {
            let sink = StatusMessageSink::new(
                Arc::clone(&self.gateway),
                handle.clone(),
                "Downloading",
                self.settings.progress.bar_width,
            );
            tokio::spawn(pump.run(sink))
        });

        let acquired = {
            let worker = Arc::clone(&worker);
            let request = request.clone();
            let asset = asset.clone();
            let workspace = Arc::clone(&workspace);
            tokio::task::spawn_blocking(move || {
                worker.fetch_and_normalize(&request, &asset, &workspace, &mut reporter)
            })
            .await
            .map_err(worker_failed)?
        };

        if let Some(task) = pump_task {
            match task.await {
                Ok(summary) => debug!(
                    request_id = %request.id,
                    received = summary.received,
                    delivered = summary.delivered,
                    detached = summary.detached,
                    "Progress display finished"
                ),
                Err(e) => warn!(request_id = %request.id, error = %e, "Progress display task failed"),
            }
        }

        let acquired = acquired.map_err(|e| {
            state.record(e.records());
            TaskError::from(e)
        })?;
        state.record(&acquired.records);

        // Size ceiling
        state.enter(TaskPhase::PostProcessing);
        let ceiling = self.settings.delivery.ceiling_bytes;
        let enforcer = SizeEnforcer::new(
            Arc::clone(&self.converter),
            self.settings.media.compression.clone(),
        );
        let link = link_reference(&asset, &request.query);
        let enforced = enforcer
            .enforce(&request.id, acquired.artifact, ceiling, &link)
            .await?;

        // Deliver
        state.enter(TaskPhase::Delivering);
        let requester = &request.requester.display_name;
        let (artifact, compressed) = match enforced {
            Enforced::Within(artifact) => (artifact, false),
            Enforced::Compressed { artifact, .. } => (artifact, true),
            Enforced::LinkFallback { url, final_bytes } => {
                let caption = link_caption(&asset, &url, final_bytes, ceiling, requester);
                let message = self
                    .gateway
                    .deliver(
                        &request.target,
                        Payload::Link { url: url.clone() },
                        &caption,
                        &[],
                    )
                    .await?;
                return Ok(Outcome::DeliveredAsLink { url, message });
            }
        };

        let caption = media_caption(
            request.kind.icon(),
            &asset,
            artifact.size_bytes(),
            requester,
            &self.settings.delivery.bot_name,
        );
        let payload = Payload::File {
            path: artifact.path().to_path_buf(),
            kind: request.kind.media_kind(),
            title: asset.title.clone(),
            performer: asset.uploader.clone(),
            duration_secs: asset.duration_secs.map(|d| d.round() as u64),
        };
        let message = self
            .gateway
            .deliver(&request.target, payload, &caption, &self.settings.delivery.buttons)
            .await?;

        info!(
            request_id = %request.id,
            bytes = artifact.size_bytes(),
            compressed,
            "Delivered artifact"
        );
        Ok(Outcome::Delivered {
            message,
            compressed,
        })
    }

    async fn generate_image(
        &self,
        request: &Request,
        state: &mut RunState,
    ) -> Result<Outcome, TaskError> {
        state.enter(TaskPhase::Acquiring);
        let engine = FallbackEngine::new(self.settings.retry.clone());
        let started = Instant::now();

        let success = match generate_with_fallbacks(
            &engine,
            self.generator.as_ref(),
            &request.query,
            &self.settings.generation.models,
        )
        .await
        {
            Ok(success) => success,
            Err(failure) => {
                state.record(&failure.records);
                return Err(TaskError::from_exhausted(failure));
            }
        };
        state.record(&success.records);

        let abandoned = success.abandoned_specs();
        if !abandoned.is_empty() {
            info!(
                request_id = %request.id,
                model = %success.spec,
                abandoned = ?abandoned,
                "Generated after abandoning earlier models"
            );
        }

        state.enter(TaskPhase::Delivering);
        let caption = image_caption(
            &request.query,
            self.settings.generation.label_for(&success.spec),
            started.elapsed().as_secs_f64(),
            &request.requester.display_name,
        );
        let file_name = format!("{}.{}", request.id, success.value.extension());
        let payload = Payload::Image {
            bytes: success.value.bytes,
            file_name,
        };
        let message = self.gateway.deliver(&request.target, payload, &caption, &[]).await?;

        Ok(Outcome::Delivered {
            message,
            compressed: false,
        })
    }

    /// Posts the initial status message. Best-effort.
    async fn post_status(&self, request: &Request) -> Option<MessageHandle> {
        let text = match request.kind {
            RequestKind::Image => format!("{} Generating image...", request.kind.icon()),
            _ => format!("{} Searching...", request.kind.icon()),
        };
        match self.gateway.send_status(&request.target, &text).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Failed to post status message");
                None
            }
        }
    }

    /// Removes the status message on success, turns it into the failure
    /// message otherwise. Best-effort.
    async fn finish_status(
        &self,
        request: &Request,
        status: Option<MessageHandle>,
        outcome: &Outcome,
    ) {
        let failure_text = match outcome {
            Outcome::Failed { message, .. } => Some(message.as_str()),
            _ => None,
        };

        match (failure_text, status) {
            (None, Some(handle)) => {
                if let Err(e) = self.gateway.delete_status(&handle).await {
                    debug!(request_id = %request.id, error = %e, "Failed to delete status message");
                }
            }
            (None, None) => {}
            (Some(text), Some(handle)) => {
                if let Err(e) = self.gateway.edit_status(&handle, text).await {
                    debug!(request_id = %request.id, error = %e, "Status edit failed, sending fresh message");
                    self.send_failure(request, text).await;
                }
            }
            (Some(text), None) => self.send_failure(request, text).await,
        }
    }

    async fn send_failure(&self, request: &Request, text: &str) {
        if let Err(e) = self.gateway.send_status(&request.target, text).await {
            warn!(request_id = %request.id, error = %e, "Failed to report failure to requester");
        }
    }
}

fn worker_failed(e: tokio::task::JoinError) -> TaskError {
    TaskError::Internal(format!("acquisition worker failed: {}", e))
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
