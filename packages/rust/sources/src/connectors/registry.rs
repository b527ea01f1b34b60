//! Authoritative listing: the core node directories of the upstream repository.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument};

use nodecatalog_shared::{REGISTRY_SOURCE, Result};

use super::Connector;
use crate::paginate::retry_rate_limited;
use crate::transport::Transport;

/// One item of a repository contents listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    /// `dir`, `file`, `symlink`, or `submodule`.
    #[serde(rename = "type")]
    pub kind: String,
    /// API URL of this entry's own listing.
    #[serde(default)]
    pub url: Option<String>,
    /// Raw content URL (files only).
    #[serde(default)]
    pub download_url: Option<String>,
}

impl DirectoryEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }

    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// Lists the core nodes directory. Its failure is fatal to a run.
#[derive(Debug, Clone)]
pub struct RegistryListing {
    listing_url: String,
    backoff: Duration,
}

impl RegistryListing {
    pub fn new(listing_url: impl Into<String>, backoff: Duration) -> Self {
        Self {
            listing_url: listing_url.into(),
            backoff,
        }
    }

    /// Directory entries of the listing, in upstream order.
    #[instrument(skip_all, fields(url = %self.listing_url))]
    pub async fn fetch_entries(&self, transport: &Transport) -> Result<Vec<DirectoryEntry>> {
        let entries: Vec<DirectoryEntry> =
            retry_rate_limited(self.backoff, || transport.get_json(&self.listing_url)).await?;

        let total = entries.len();
        let dirs: Vec<DirectoryEntry> = entries.into_iter().filter(DirectoryEntry::is_dir).collect();

        info!(total, dirs = dirs.len(), "registry listing fetched");
        Ok(dirs)
    }
}

#[async_trait]
impl Connector for RegistryListing {
    fn name(&self) -> &str {
        REGISTRY_SOURCE
    }

    async fn collect(&self, transport: &Transport) -> Result<Vec<String>> {
        let entries = self.fetch_entries(transport).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }
}
