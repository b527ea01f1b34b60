//! Keyword and topic search connectors.
//!
//! Both issue several independent paginated queries as one concurrent batch.
//! A failing query is logged and contributes nothing; the connector only
//! fails when every query failed.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use nodecatalog_shared::{
    CatalogError, NPM_SOURCE, NpmConfig, Result, TOPICS_SOURCE, TopicsConfig,
};

use super::Connector;
use crate::paginate::{page_number, paginate, retry_rate_limited};
use crate::patterns::{CandidateFilter, dedup_in_order};
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// npm registry search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NpmSearchPage {
    #[serde(default)]
    objects: Vec<NpmSearchObject>,
}

#[derive(Debug, Deserialize)]
struct NpmSearchObject {
    #[serde(default)]
    package: Option<NpmPackage>,
}

#[derive(Debug, Deserialize)]
struct NpmPackage {
    #[serde(default)]
    name: Option<String>,
}

/// Package names from npm registry search, filtered through a [`CandidateFilter`].
#[derive(Debug, Clone)]
pub struct NpmSearch {
    search_url: String,
    queries: Vec<String>,
    page_size: usize,
    max_offset: usize,
    filter: CandidateFilter,
    backoff: Duration,
}

impl NpmSearch {
    pub fn new(config: &NpmConfig, backoff: Duration) -> Result<Self> {
        Ok(Self {
            search_url: config.search_url.clone(),
            queries: config.queries.clone(),
            page_size: config.page_size,
            max_offset: config.max_offset,
            filter: CandidateFilter::new(&config.candidate_pattern)?,
            backoff,
        })
    }

    async fn search(&self, transport: &Transport, query: &str) -> Result<Vec<String>> {
        let objects = paginate(self.page_size, self.max_offset, |offset| async move {
            let url = with_query(
                &self.search_url,
                &[
                    ("text", query.to_string()),
                    ("size", self.page_size.to_string()),
                    ("from", offset.to_string()),
                ],
            )?;
            let page: NpmSearchPage =
                retry_rate_limited(self.backoff, || transport.get_json(&url)).await?;
            Ok::<_, CatalogError>(page.objects)
        })
        .await?;

        let names = objects
            .into_iter()
            .filter_map(|o| o.package.and_then(|p| p.name))
            .filter(|name| self.filter.accepts(name));
        Ok(dedup_in_order(names))
    }
}

#[async_trait]
impl Connector for NpmSearch {
    fn name(&self) -> &str {
        NPM_SOURCE
    }

    async fn collect(&self, transport: &Transport) -> Result<Vec<String>> {
        run_batch(
            NPM_SOURCE,
            &self.queries,
            self.queries.iter().map(|q| self.search(transport, q)),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// GitHub topic search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TopicSearchPage {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    #[serde(default)]
    name: Option<String>,
}

/// Repository names tagged with the configured topics. Unfiltered: the
/// topic already scopes the results.
#[derive(Debug, Clone)]
pub struct TopicSearch {
    search_url: String,
    topics: Vec<String>,
    per_page: usize,
    max_results: usize,
    backoff: Duration,
}

impl TopicSearch {
    pub fn new(config: &TopicsConfig, backoff: Duration) -> Self {
        Self {
            search_url: config.search_url.clone(),
            topics: config.topics.clone(),
            per_page: config.per_page,
            max_results: config.max_results,
            backoff,
        }
    }

    async fn search(&self, transport: &Transport, topic: &str) -> Result<Vec<String>> {
        let repos = paginate(self.per_page, self.max_results, |offset| async move {
            let url = with_query(
                &self.search_url,
                &[
                    ("q", format!("topic:{topic}")),
                    ("per_page", self.per_page.to_string()),
                    ("page", page_number(offset, self.per_page).to_string()),
                ],
            )?;
            let page: TopicSearchPage =
                retry_rate_limited(self.backoff, || transport.get_json(&url)).await?;
            Ok::<_, CatalogError>(page.items)
        })
        .await?;

        Ok(dedup_in_order(repos.into_iter().filter_map(|r| r.name)))
    }
}

#[async_trait]
impl Connector for TopicSearch {
    fn name(&self) -> &str {
        TOPICS_SOURCE
    }

    async fn collect(&self, transport: &Transport) -> Result<Vec<String>> {
        run_batch(
            TOPICS_SOURCE,
            &self.topics,
            self.topics.iter().map(|t| self.search(transport, t)),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Await all queries together and merge the ones that succeeded.
///
/// Names are deduplicated across queries in first-seen order, so the yield
/// counts each package once.
async fn run_batch<F>(
    source: &str,
    queries: &[String],
    searches: impl Iterator<Item = F>,
) -> Result<Vec<String>>
where
    F: Future<Output = Result<Vec<String>>>,
{
    let results = join_all(searches).await;

    let mut names = Vec::new();
    let mut failures = 0;
    let mut last_error = None;
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(found) => {
                debug!(source, query = %query, count = found.len(), "query complete");
                names.extend(found);
            }
            Err(e) => {
                warn!(source, query = %query, error = %e, "query failed");
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if failures == queries.len() => Err(e),
        _ => Ok(dedup_in_order(names)),
    }
}

/// Append query parameters to a base endpoint.
fn with_query(base: &str, params: &[(&str, String)]) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| CatalogError::config(format!("invalid search URL '{base}': {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}
