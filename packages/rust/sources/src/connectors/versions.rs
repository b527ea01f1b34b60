//! Bulk latest-version lookup for community packages.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use nodecatalog_shared::{Result, VersionsConfig};

use crate::paginate::retry_rate_limited;
use crate::transport::Transport;

/// Upper bound the bulk endpoint accepts per request.
const MAX_CHUNK: usize = 200;

/// Resolves package names to their latest published version.
#[derive(Debug, Clone)]
pub struct VersionLookup {
    mget_url: String,
    chunk_size: usize,
    backoff: Duration,
}

impl VersionLookup {
    pub fn new(config: &VersionsConfig, backoff: Duration) -> Self {
        Self {
            mget_url: config.mget_url.clone(),
            chunk_size: config.chunk_size.clamp(1, MAX_CHUNK),
            backoff,
        }
    }

    /// Look up `names` in chunks; packages without a resolvable version are left out.
    ///
    /// A failed chunk is logged and skipped, the remaining chunks still run.
    #[instrument(skip_all, fields(packages = names.len()))]
    pub async fn lookup(&self, transport: &Transport, names: &[String]) -> BTreeMap<String, String> {
        let mut versions = BTreeMap::new();

        for (index, chunk) in names.chunks(self.chunk_size).enumerate() {
            match self.fetch_chunk(transport, chunk).await {
                Ok(found) => {
                    debug!(chunk = index, requested = chunk.len(), resolved = found.len(), "chunk resolved");
                    versions.extend(found);
                }
                Err(e) => {
                    warn!(chunk = index, size = chunk.len(), error = %e, "version chunk failed");
                }
            }
        }

        info!(resolved = versions.len(), "package versions resolved");
        versions
    }

    async fn fetch_chunk(&self, transport: &Transport, chunk: &[String]) -> Result<Vec<(String, String)>> {
        let body: BTreeMap<String, Value> =
            retry_rate_limited(self.backoff, || transport.post_json(&self.mget_url, chunk)).await?;

        Ok(body
            .into_iter()
            .filter_map(|(name, meta)| resolve_version(&meta).map(|v| (name, v)))
            .collect())
    }
}

/// Version from `collected.metadata.version`, else the last entry of `versions`.
pub fn resolve_version(meta: &Value) -> Option<String> {
    let collected = meta
        .pointer("/collected/metadata/version")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty());

    if let Some(version) = collected {
        return Some(version.to_string());
    }

    let last = meta.get("versions")?.as_array()?.last()?;
    last.as_str()
        .or_else(|| last.get("version").and_then(Value::as_str))
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nodecatalog_shared::RunContext;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::transport::TransportOptions;

    fn transport() -> Transport {
        let opts = TransportOptions {
            user_agent: "test".into(),
            api_base: "https://api.github.com".into(),
            token: None,
        };
        Transport::new(opts, Arc::new(RunContext::new())).unwrap()
    }

    fn lookup(server: &MockServer, chunk_size: usize) -> VersionLookup {
        let config = VersionsConfig {
            enabled: true,
            mget_url: format!("{}/v2/package/mget", server.uri()),
            chunk_size,
        };
        VersionLookup::new(&config, Duration::from_millis(1))
    }

    #[test]
    fn prefers_collected_metadata() {
        let meta = json!({
            "collected": {"metadata": {"version": "1.4.0"}},
            "versions": ["0.1.0", "9.9.9"]
        });
        assert_eq!(resolve_version(&meta), Some("1.4.0".into()));
    }

    #[test]
    fn falls_back_to_last_history_entry() {
        assert_eq!(
            resolve_version(&json!({"versions": ["0.1.0", "0.2.0"]})),
            Some("0.2.0".into())
        );
        assert_eq!(
            resolve_version(&json!({"versions": [{"version": "3.0.0"}]})),
            Some("3.0.0".into())
        );
    }

    #[test]
    fn unresolvable_is_none() {
        assert_eq!(resolve_version(&json!({"collected": {}})), None);
        assert_eq!(resolve_version(&json!({"versions": []})), None);
        assert_eq!(resolve_version(&Value::Null), None);
    }

    #[tokio::test]
    async fn chunks_requests_and_skips_unresolved() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/package/mget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "n8n-nodes-a": {"collected": {"metadata": {"version": "1.0.0"}}},
                "n8n-nodes-b": {"versions": ["0.1.0", "0.2.0"]},
                "n8n-nodes-c": {"collected": {"metadata": {}}},
            })))
            .expect(3)
            .mount(&server)
            .await;

        let names: Vec<String> = (0..5).map(|i| format!("pkg-{i}")).collect();
        let t = transport();
        let versions = lookup(&server, 2).lookup(&t, &names).await;

        assert_eq!(versions.len(), 2);
        assert_eq!(versions["n8n-nodes-a"], "1.0.0");
        assert_eq!(versions["n8n-nodes-b"], "0.2.0");
        assert_eq!(t.context().api_calls(), 3);

        let requests = server.received_requests().await.unwrap();
        let sizes: Vec<usize> = requests
            .iter()
            .map(|r| serde_json::from_slice::<Vec<String>>(&r.body).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn failed_chunk_is_skipped() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "late": {"collected": {"metadata": {"version": "2.0.0"}}}
            })))
            .mount(&server)
            .await;

        let names: Vec<String> = vec!["early".into(), "late".into()];
        let versions = lookup(&server, 1).lookup(&transport(), &names).await;

        assert_eq!(versions.len(), 1);
        assert_eq!(versions["late"], "2.0.0");
    }

    #[test]
    fn chunk_size_is_capped() {
        let config = VersionsConfig {
            chunk_size: 10_000,
            ..VersionsConfig::default()
        };
        assert_eq!(VersionLookup::new(&config, Duration::ZERO).chunk_size, MAX_CHUNK);
    }
}
