//! The size enforcer.

use std::sync::Arc;

use tracing::{info, warn};

use super::error::PostProcessError;
use crate::converter::{sibling_output, CompressionProfile, Converter, TranscodeJob};
use crate::metrics;
use crate::resolver::AssetMetadata;
use crate::workspace::WorkingArtifact;

/// What to deliver after the ceiling check.
#[derive(Debug, Clone, PartialEq)]
pub enum Enforced {
    /// Under the ceiling, untouched.
    Within(WorkingArtifact),
    /// Re-encoded to fit. The original file is gone.
    Compressed {
        artifact: WorkingArtifact,
        original_bytes: u64,
    },
    /// Could not be made to fit. No local file remains.
    LinkFallback { url: String, final_bytes: u64 },
}

/// Best direct reference for a link delivery.
///
/// Direct media URL first, then the asset page, then the request text.
pub fn link_reference(asset: &AssetMetadata, query: &str) -> String {
    asset
        .direct_url
        .clone()
        .or_else(|| asset.watch_url())
        .unwrap_or_else(|| query.to_string())
}

/// Applies the ceiling with a single compression pass.
pub struct SizeEnforcer {
    converter: Arc<dyn Converter>,
    profile: CompressionProfile,
}

impl SizeEnforcer {
    pub fn new(converter: Arc<dyn Converter>, profile: CompressionProfile) -> Self {
        Self { converter, profile }
    }

    /// Checks `artifact` against `ceiling_bytes`.
    ///
    /// `link_url` is used if the artifact cannot be brought under the ceiling.
    pub async fn enforce(
        &self,
        job_id: &str,
        artifact: WorkingArtifact,
        ceiling_bytes: u64,
        link_url: &str,
    ) -> Result<Enforced, PostProcessError> {
        if !artifact.exists() {
            return Err(PostProcessError::ArtifactMissing(
                artifact.path().display().to_string(),
            ));
        }

        let original_bytes = artifact.size_bytes();
        if original_bytes <= ceiling_bytes {
            return Ok(Enforced::Within(artifact));
        }

        let extension = artifact.extension();
        let profile = self.profile.profile_for(&extension);
        let output = sibling_output(artifact.path(), &self.profile.suffix, profile.extension());
        info!(
            job_id,
            bytes = original_bytes,
            ceiling = ceiling_bytes,
            profile = %profile,
            "Artifact over ceiling, compressing"
        );

        let job = TranscodeJob::new(job_id, artifact.path(), &output, profile);
        let compressed = match self.converter.transcode(job).await {
            Ok(_) => WorkingArtifact::open(&output).ok(),
            Err(e) => {
                warn!(job_id, error = %e, "Compression failed");
                None
            }
        };

        let Some(compressed) = compressed else {
            metrics::COMPRESSIONS_TOTAL.with_label_values(&["failed"]).inc();
            remove_quietly(&WorkingArtifact::open(&output).ok());
            artifact.remove()?;
            return Ok(self.link_fallback(job_id, link_url, original_bytes));
        };

        // The original goes only once the replacement exists.
        artifact.remove()?;
        let final_bytes = compressed.size_bytes();

        if final_bytes <= ceiling_bytes {
            metrics::COMPRESSIONS_TOTAL.with_label_values(&["fit"]).inc();
            info!(
                job_id,
                original_bytes,
                final_bytes,
                "Compressed artifact fits"
            );
            return Ok(Enforced::Compressed {
                artifact: compressed,
                original_bytes,
            });
        }

        metrics::COMPRESSIONS_TOTAL.with_label_values(&["oversize"]).inc();
        compressed.remove()?;
        Ok(self.link_fallback(job_id, link_url, final_bytes))
    }

    fn link_fallback(&self, job_id: &str, url: &str, final_bytes: u64) -> Enforced {
        metrics::LINK_FALLBACKS_TOTAL.inc();
        warn!(job_id, final_bytes, url, "Falling back to link delivery");
        Enforced::LinkFallback {
            url: url.to_string(),
            final_bytes,
        }
    }
}

fn remove_quietly(artifact: &Option<WorkingArtifact>) {
    if let Some(artifact) = artifact {
        if let Err(e) = artifact.remove() {
            warn!(file = %artifact.path().display(), error = %e, "Failed to remove file");
        }
    }
}
