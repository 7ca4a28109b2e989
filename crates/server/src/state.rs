use std::sync::Arc;
use tokio::sync::Semaphore;

use courier_core::{Config, Request, SanitizedConfig, TaskOrchestrator};

use crate::registry::RequestRegistry;

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<TaskOrchestrator>,
    registry: Arc<RequestRegistry>,
    admission: Option<Arc<Semaphore>>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<TaskOrchestrator>,
        registry: Arc<RequestRegistry>,
    ) -> Self {
        let admission = match config.server.max_concurrent_requests {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self {
            config,
            orchestrator,
            registry,
            admission,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    /// Registers the request and runs it in the background.
    ///
    /// With an admission limit configured, the request waits in the
    /// `received` phase until a slot frees up.
    pub fn submit(&self, request: Request) {
        self.registry.register(&request);

        let orchestrator = Arc::clone(&self.orchestrator);
        let registry = Arc::clone(&self.registry);
        let admission = self.admission.clone();
        tokio::spawn(async move {
            let _permit = match admission {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };
            let report = orchestrator.run(request).await;
            registry.finish(&report);
        });
    }
}
