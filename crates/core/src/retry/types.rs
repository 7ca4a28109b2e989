//! Types shared by every fallback chain.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry bounds applied to each spec of a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per spec, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for a single backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Optional timeout for one attempt in milliseconds. Expiry counts as a
    /// transient failure.
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,

    /// Maximum number of characters kept in the aggregated diagnostic.
    #[serde(default = "default_diagnostic_tail_chars")]
    pub diagnostic_tail_chars: usize,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    3000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_diagnostic_tail_chars() -> usize {
    3000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: None,
            diagnostic_tail_chars: default_diagnostic_tail_chars(),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives every spec exactly one attempt.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_diagnostic_tail(mut self, chars: usize) -> Self {
        self.diagnostic_tail_chars = chars;
        self
    }

    /// Delay to wait after the given failed attempt (1-based) of a spec.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis((delay_ms as u64).min(self.max_delay_ms))
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

/// Classified failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Rate limiting, a backend warming up, a timeout. Worth retrying.
    Transient(String),
    /// The spec cannot succeed. Move on to the next one.
    Fatal(String),
}

impl AttemptError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient(r) | Self::Fatal(r) => r,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result of one attempt as recorded in the chain log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AttemptStatus {
    Succeeded,
    Transient(String),
    Fatal(String),
}

/// One line of the attempt log.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// Chain the attempt belongs to ("resolve", "fetch", "generate", ...).
    pub chain: String,
    /// Display form of the spec.
    pub spec: String,
    /// Position of the spec in the chain.
    pub spec_index: usize,
    /// 1-based attempt number within the spec.
    pub attempt: u32,
    pub status: AttemptStatus,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    pub fn failed(&self) -> bool {
        !matches!(self.status, AttemptStatus::Succeeded)
    }
}

/// First successful result of a chain.
#[derive(Debug)]
pub struct ChainSuccess<T> {
    pub value: T,
    pub spec: String,
    pub spec_index: usize,
    /// Every attempt made, failed ones included.
    pub records: Vec<AttemptRecord>,
}

impl<T> ChainSuccess<T> {
    /// Specs that were given up on before the winning one.
    pub fn abandoned_specs(&self) -> Vec<&str> {
        let mut specs: Vec<&str> = Vec::new();
        for record in self.records.iter().filter(|r| r.spec_index < self.spec_index) {
            if specs.last() != Some(&record.spec.as_str()) {
                specs.push(&record.spec);
            }
        }
        specs
    }
}

/// Every spec of a chain failed.
#[derive(Debug, Clone)]
pub struct ChainFailure {
    pub chain: String,
    pub records: Vec<AttemptRecord>,
    /// Bounded tail of all failure reasons, oldest first.
    pub diagnostic: String,
}

impl ChainFailure {
    /// True when the last attempt of every spec failed transiently.
    pub fn all_transient(&self) -> bool {
        let mut last_per_spec: Vec<&AttemptRecord> = Vec::new();
        for record in &self.records {
            match last_per_spec.last_mut() {
                Some(last) if last.spec_index == record.spec_index => *last = record,
                _ => last_per_spec.push(record),
            }
        }
        !last_per_spec.is_empty()
            && last_per_spec
                .iter()
                .all(|r| matches!(r.status, AttemptStatus::Transient(_)))
    }

    pub fn attempts(&self) -> usize {
        self.records.len()
    }
}

impl std::fmt::Display for ChainFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} chain exhausted after {} attempts: {}",
            self.chain,
            self.records.len(),
            self.diagnostic
        )
    }
}

impl std::error::Error for ChainFailure {}

/// Keeps the last `max_chars` characters of `text`, cutting on a char boundary.
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay_ms, 3000);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert!(policy.attempt_timeout().is_none());
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(3));
        assert_eq!(policy.delay_after(2), Duration::from_secs(6));
        assert_eq!(policy.delay_after(3), Duration::from_secs(12));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_delay_ms: 5000,
            ..Default::default()
        };
        assert_eq!(policy.delay_after(4), Duration::from_secs(5));
    }

    #[test]
    fn test_truncate_tail_keeps_end() {
        assert_eq!(truncate_tail("abcdef", 3), "def");
        assert_eq!(truncate_tail("abc", 10), "abc");
        assert_eq!(truncate_tail("héllo wörld", 5), "wörld");
    }

    fn record(spec_index: usize, status: AttemptStatus) -> AttemptRecord {
        AttemptRecord {
            chain: "test".to_string(),
            spec: format!("spec-{}", spec_index),
            spec_index,
            attempt: 1,
            status,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_all_transient_looks_at_last_attempt_per_spec() {
        let failure = ChainFailure {
            chain: "test".to_string(),
            records: vec![
                record(0, AttemptStatus::Fatal("bad".into())),
                record(1, AttemptStatus::Transient("busy".into())),
            ],
            diagnostic: String::new(),
        };
        assert!(!failure.all_transient());

        let failure = ChainFailure {
            chain: "test".to_string(),
            records: vec![
                record(0, AttemptStatus::Transient("busy".into())),
                record(0, AttemptStatus::Transient("busy".into())),
                record(1, AttemptStatus::Transient("429".into())),
            ],
            diagnostic: String::new(),
        };
        assert!(failure.all_transient());
    }
}
