//! Node type/version extraction from core node definition files.
//!
//! For every core node directory: list it, pick the definition file, download
//! the source, and pattern-match the type name and version out of it. Runs as
//! a bounded pool; entries that fail at any step are dropped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use nodecatalog_shared::{CatalogError, RegistryConfig, Result};

use super::registry::DirectoryEntry;
use crate::paginate::retry_rate_limited;
use crate::patterns::{NodeDefinition, parse_node_definition};
use crate::transport::Transport;

/// Derives `<prefix>.<name>` → highest type version for the core nodes.
#[derive(Debug, Clone)]
pub struct NodeTypeExtractor {
    locator: Arc<DefinitionLocator>,
    type_prefix: String,
    concurrency: usize,
}

/// Per-entry lookup shared by the pool's tasks.
#[derive(Debug)]
struct DefinitionLocator {
    listing_url: String,
    file_pattern: Regex,
    backoff: Duration,
}

impl NodeTypeExtractor {
    pub fn new(config: &RegistryConfig, backoff: Duration) -> Result<Self> {
        let file_pattern = Regex::new(&config.definition_file_pattern)
            .map_err(|e| CatalogError::config(format!("invalid definition file pattern: {e}")))?;

        Ok(Self {
            locator: Arc::new(DefinitionLocator {
                listing_url: config.listing_url.trim_end_matches('/').to_string(),
                file_pattern,
                backoff,
            }),
            type_prefix: config.type_prefix.clone(),
            concurrency: config.concurrency.max(1),
        })
    }

    /// Extract type versions for `entries` with at most `concurrency` lookups in flight.
    #[instrument(skip_all, fields(entries = entries.len(), concurrency = self.concurrency))]
    pub async fn extract(&self, transport: &Transport, entries: &[DirectoryEntry]) -> BTreeMap<String, u32> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(entries.len());

        for entry in entries.iter().filter(|e| e.is_dir()) {
            let sem = semaphore.clone();
            let locator = self.locator.clone();
            let transport = transport.clone();
            let entry = entry.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok()?;
                match locator.definition(&transport, &entry).await {
                    Ok(found) => found,
                    Err(e) => {
                        debug!(node = %entry.name, error = %e, "definition lookup failed");
                        None
                    }
                }
            }));
        }

        let mut types = BTreeMap::new();
        for handle in handles {
            match handle.await {
                Ok(Some(def)) => {
                    insert_max(&mut types, format!("{}.{}", self.type_prefix, def.name), def.version);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "definition task panicked"),
            }
        }

        info!(resolved = types.len(), "node types extracted");
        types
    }
}

impl DefinitionLocator {
    async fn definition(&self, transport: &Transport, entry: &DirectoryEntry) -> Result<Option<NodeDefinition>> {
        let listing_url = entry
            .url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.listing_url, entry.name));

        let files: Vec<DirectoryEntry> =
            retry_rate_limited(self.backoff, || transport.get_json(&listing_url)).await?;

        let Some(download_url) = files
            .iter()
            .find(|f| f.is_file() && self.file_pattern.is_match(&f.name))
            .and_then(|f| f.download_url.clone())
        else {
            return Ok(None);
        };

        let source = retry_rate_limited(self.backoff, || transport.get_text(&download_url)).await?;
        Ok(parse_node_definition(&source))
    }
}

/// Keep the highest version seen for a type.
fn insert_max(types: &mut BTreeMap<String, u32>, key: String, version: u32) {
    types
        .entry(key)
        .and_modify(|v| *v = (*v).max(version))
        .or_insert(version);
}
