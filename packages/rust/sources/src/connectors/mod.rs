//! Source connectors — one per external knowledge source.
//!
//! Each connector implements [`Connector`] and produces candidate identifiers.
//! [`ConnectorRegistry`] holds the best-effort connectors by name so the
//! escalation rules can refer to them from configuration.

mod document;
mod node_types;
mod registry;
mod search;
mod versions;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use nodecatalog_shared::{AppConfig, Result, SourceOutcome};

use crate::transport::Transport;

pub use document::DocumentScan;
pub use node_types::NodeTypeExtractor;
pub use registry::{DirectoryEntry, RegistryListing};
pub use search::{NpmSearch, TopicSearch};
pub use versions::{VersionLookup, resolve_version};

// ---------------------------------------------------------------------------
// Connector trait
// ---------------------------------------------------------------------------

/// A pluggable source of identifiers.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable source name used in config, logs, and snapshot meta.
    fn name(&self) -> &str;

    /// Fetch and return this source's identifiers.
    async fn collect(&self, transport: &Transport) -> Result<Vec<String>>;
}

/// Run a connector without letting its failure escape.
///
/// Records the yield (and, on failure, the reason) in the transport's run
/// context. Failures come back as [`SourceOutcome`] degraded results.
pub async fn collect_best_effort(connector: &dyn Connector, transport: &Transport) -> SourceOutcome {
    let source = connector.name();
    let ctx = transport.context();

    match connector.collect(transport).await {
        Ok(items) => {
            info!(source, count = items.len(), "source collected");
            ctx.record_yield(source, items.len());
            SourceOutcome::collected(source, items)
        }
        Err(e) => {
            warn!(source, error = %e, "source failed, continuing without it");
            ctx.record_yield(source, 0);
            ctx.record_degraded(source, e.to_string());
            SourceOutcome::degraded(source, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Best-effort connectors addressable by name.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Empty registry; use [`ConnectorRegistry::register`] to add sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in third-party sources configured from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backoff = Duration::from_millis(config.http.rate_limit_backoff_ms);
        let mut registry = Self::new();
        registry.register(Arc::new(DocumentScan::new(&config.document, backoff)));
        registry.register(Arc::new(NpmSearch::new(&config.npm, backoff)?));
        registry.register(Arc::new(TopicSearch::new(&config.github_topics, backoff)));
        Ok(registry)
    }

    /// Add a connector; a later registration replaces one with the same name.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.retain(|c| c.name() != connector.name());
        self.connectors.push(connector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.iter().find(|c| c.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.name()).collect()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("connectors", &self.names())
            .finish()
    }
}
