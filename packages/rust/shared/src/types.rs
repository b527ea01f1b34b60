//! Core domain types: run counters, source outcomes, and the snapshot payload.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// Counters for a single pipeline run.
///
/// Shared (via `Arc`) by the transport and every connector. Tasks may run on
/// different worker threads, so every field is synchronized.
#[derive(Debug, Default)]
pub struct RunContext {
    api_calls: AtomicU64,
    yields: Mutex<BTreeMap<String, usize>>,
    stages: Mutex<BTreeMap<String, usize>>,
    degraded: Mutex<BTreeMap<String, String>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outbound request.
    pub fn record_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn api_calls(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// Record how many identifiers a source produced.
    pub fn record_yield(&self, source: &str, count: usize) {
        let mut yields = self.yields.lock().unwrap_or_else(|e| e.into_inner());
        yields.insert(source.to_string(), count);
    }

    /// Record how many entries a metadata step resolved.
    pub fn record_stage(&self, stage: &str, count: usize) {
        let mut stages = self.stages.lock().unwrap_or_else(|e| e.into_inner());
        stages.insert(stage.to_string(), count);
    }

    /// Record why a best-effort source came back empty.
    pub fn record_degraded(&self, source: &str, reason: impl Into<String>) {
        let mut degraded = self.degraded.lock().unwrap_or_else(|e| e.into_inner());
        degraded.insert(source.to_string(), reason.into());
    }

    /// Frozen copy of the counters for embedding in the snapshot.
    pub fn snapshot(&self) -> SnapshotMeta {
        let sources = self.yields.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let stages = self.stages.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let degraded = self.degraded.lock().unwrap_or_else(|e| e.into_inner()).clone();
        SnapshotMeta {
            sources,
            stages,
            api_calls: self.api_calls(),
            degraded,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceOutcome
// ---------------------------------------------------------------------------

/// What a best-effort source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceResult {
    /// The source answered; the list may legitimately be empty.
    Collected(Vec<String>),
    /// The source failed and contributes nothing.
    Degraded { reason: String },
}

/// Result of invoking one connector behind the best-effort boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOutcome {
    pub source: String,
    pub result: SourceResult,
}

impl SourceOutcome {
    pub fn collected(source: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            source: source.into(),
            result: SourceResult::Collected(items),
        }
    }

    pub fn degraded(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            result: SourceResult::Degraded {
                reason: reason.into(),
            },
        }
    }

    /// Identifiers contributed by this source (empty when degraded).
    pub fn items(&self) -> &[String] {
        match &self.result {
            SourceResult::Collected(items) => items,
            SourceResult::Degraded { .. } => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.result, SourceResult::Degraded { .. })
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The persisted `nodes.json` document.
///
/// The first five fields are the legacy layout; everything after them is
/// optional so older readers keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "_generated")]
    pub generated: DateTime<Utc>,
    #[serde(rename = "coreCount")]
    pub core_count: usize,
    #[serde(rename = "communityCount")]
    pub community_count: usize,
    pub total: usize,
    pub nodes: Vec<String>,
    /// Qualified node type → highest integer type version.
    #[serde(rename = "nodeTypes", default, skip_serializing_if = "Option::is_none")]
    pub node_types: Option<BTreeMap<String, u32>>,
    /// Community package → latest published version.
    #[serde(
        rename = "packageVersions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub package_versions: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SnapshotMeta>,
}

/// Per-run statistics embedded in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Distinct identifiers per source name.
    pub sources: BTreeMap<String, usize>,
    /// Resolved entry count per metadata step (`node-types`, `package-versions`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stages: BTreeMap<String, usize>,
    #[serde(rename = "apiCalls")]
    pub api_calls: u64,
    /// Degradation reason per source name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub degraded: BTreeMap<String, String>,
}
