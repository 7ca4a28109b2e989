//! The fallback engine.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::types::{
    truncate_tail, AttemptError, AttemptRecord, AttemptStatus, ChainFailure, ChainSuccess,
    RetryPolicy,
};
use crate::metrics;

/// Executes ordered attempt specs with per-spec bounded retry.
///
/// Specs run strictly in order: spec `i + 1` is only tried once spec `i` has
/// failed fatally or used up its attempts. The first success ends the chain.
#[derive(Debug, Clone)]
pub struct FallbackEngine {
    policy: RetryPolicy,
}

impl FallbackEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `attempt` over `specs` until one succeeds.
    ///
    /// `chain` names the chain in logs, metrics and attempt records.
    pub async fn run<S, T, F, Fut>(
        &self,
        chain: &str,
        specs: &[S],
        mut attempt: F,
    ) -> Result<ChainSuccess<T>, ChainFailure>
    where
        S: Display,
        F: FnMut(&S) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut records: Vec<AttemptRecord> = Vec::new();

        for (spec_index, spec) in specs.iter().enumerate() {
            let label = spec.to_string();

            for attempt_no in 1..=max_attempts {
                debug!(chain, spec = %label, attempt = attempt_no, "Starting attempt");
                let started = Instant::now();

                let result = match self.policy.attempt_timeout() {
                    Some(limit) => match tokio::time::timeout(limit, attempt(spec)).await {
                        Ok(result) => result,
                        Err(_) => Err(AttemptError::transient(format!(
                            "timed out after {}ms",
                            limit.as_millis()
                        ))),
                    },
                    None => attempt(spec).await,
                };

                let elapsed_ms = started.elapsed().as_millis() as u64;
                let status = match &result {
                    Ok(_) => AttemptStatus::Succeeded,
                    Err(AttemptError::Transient(reason)) => AttemptStatus::Transient(reason.clone()),
                    Err(AttemptError::Fatal(reason)) => AttemptStatus::Fatal(reason.clone()),
                };
                metrics::record_attempt(chain, &status);
                records.push(AttemptRecord {
                    chain: chain.to_string(),
                    spec: label.clone(),
                    spec_index,
                    attempt: attempt_no,
                    status,
                    elapsed_ms,
                });

                match result {
                    Ok(value) => {
                        if spec_index > 0 || attempt_no > 1 {
                            info!(
                                chain,
                                spec = %label,
                                spec_index,
                                attempt = attempt_no,
                                "Chain recovered after earlier failures"
                            );
                        }
                        return Ok(ChainSuccess {
                            value,
                            spec: label,
                            spec_index,
                            records,
                        });
                    }
                    Err(AttemptError::Transient(reason)) if attempt_no < max_attempts => {
                        let delay = self.policy.delay_after(attempt_no);
                        warn!(
                            chain,
                            spec = %label,
                            attempt = attempt_no,
                            delay_ms = delay.as_millis() as u64,
                            reason = %reason,
                            "Transient failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => {
                        warn!(
                            chain,
                            spec = %label,
                            attempt = attempt_no,
                            transient = err.is_transient(),
                            reason = %err.reason(),
                            "Giving up on spec"
                        );
                        break;
                    }
                }
            }
        }

        let diagnostic = if records.is_empty() {
            format!("no {} specs configured", chain)
        } else {
            let joined = records
                .iter()
                .filter_map(|r| match &r.status {
                    AttemptStatus::Transient(reason) | AttemptStatus::Fatal(reason) => {
                        Some(format!("{} #{}: {}", r.spec, r.attempt, reason))
                    }
                    AttemptStatus::Succeeded => None,
                })
                .collect::<Vec<_>>()
                .join(" | ");
            truncate_tail(&joined, self.policy.diagnostic_tail_chars)
        };

        Err(ChainFailure {
            chain: chain.to_string(),
            records,
            diagnostic,
        })
    }
}
