//! In-memory record of requests accepted over the API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

use courier_core::{Outcome, Request, RequestKind, TaskPhase, TaskReport};

/// Finished entries kept before the oldest are evicted.
const MAX_RETAINED: usize = 500;

/// What the API knows about one request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEntry {
    pub id: String,
    pub kind: RequestKind,
    pub query: String,
    pub requester: String,
    pub phase: TaskPhase,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Attempts made across every fallback chain.
    pub attempts: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub abandoned_specs: Vec<String>,
}

impl RequestEntry {
    fn from_request(request: &Request) -> Self {
        Self {
            id: request.id.clone(),
            kind: request.kind,
            query: request.query.clone(),
            requester: request.requester.display_name.clone(),
            phase: TaskPhase::Received,
            received_at: request.received_at,
            finished_at: None,
            outcome: None,
            attempts: 0,
            abandoned_specs: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Requests by id. Updated from the orchestrator's phase callback, which is
/// synchronous, hence the std lock.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    entries: RwLock<HashMap<String, RequestEntry>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request: &Request) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= MAX_RETAINED {
            evict_oldest_finished(&mut entries);
        }
        entries.insert(request.id.clone(), RequestEntry::from_request(request));
    }

    /// Phases only move forward; a stale update is ignored.
    pub fn set_phase(&self, id: &str, phase: TaskPhase) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            if phase > entry.phase {
                entry.phase = phase;
            }
        }
    }

    pub fn finish(&self, report: &TaskReport) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(&report.request_id) {
            entry.phase = TaskPhase::Terminal;
            entry.finished_at = Some(Utc::now());
            entry.outcome = Some(report.outcome.clone());
            entry.attempts = report.attempts.len();
            entry.abandoned_specs = report.abandoned_specs();
        }
    }

    pub fn get(&self, id: &str) -> Option<RequestEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).cloned()
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<RequestEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<RequestEntry> = entries.values().cloned().collect();
        list.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        list.truncate(limit);
        list
    }

    pub fn in_flight(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|e| !e.is_finished()).count()
    }
}

fn evict_oldest_finished(entries: &mut HashMap<String, RequestEntry>) {
    let oldest = entries
        .values()
        .filter(|e| e.is_finished())
        .min_by_key(|e| e.received_at)
        .map(|e| e.id.clone());
    if let Some(id) = oldest {
        entries.remove(&id);
    }
}
