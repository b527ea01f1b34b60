//! End-to-end `run` pipeline: listing → escalation → reconcile → metadata.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use nodecatalog_shared::{
    AppConfig, REGISTRY_SOURCE, Result, RunContext, SnapshotMeta, SourceOutcome, read_token,
};
use nodecatalog_sources::{
    ConnectorRegistry, NodeTypeExtractor, RegistryListing, Transport, TransportOptions,
    VersionLookup,
};

use crate::escalation::EscalationPolicy;
use crate::reconciler::{Catalogue, reconcile};

/// `meta.stages` key for the node type extraction count.
pub const NODE_TYPES_STAGE: &str = "node-types";
/// `meta.stages` key for the package version lookup count.
pub const PACKAGE_VERSIONS_STAGE: &str = "package-versions";

/// Configuration for one pipeline run.
#[derive(Clone)]
pub struct PipelineConfig {
    pub app: AppConfig,
    /// Bearer token for the authoritative host, read once at startup.
    pub token: Option<String>,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("app", &self.app)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl From<&AppConfig> for PipelineConfig {
    /// Snapshot `app` and read the token from the configured env var.
    fn from(app: &AppConfig) -> Self {
        Self {
            app: app.clone(),
            token: read_token(&app.http),
        }
    }
}

/// Everything a run produced, ready for the assembler.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub catalogue: Catalogue,
    /// `None` when extraction was disabled.
    pub node_types: Option<BTreeMap<String, u32>>,
    /// `None` when version lookup was disabled.
    pub package_versions: Option<BTreeMap<String, String>>,
    pub meta: SnapshotMeta,
    /// Fallback sources the escalation step triggered.
    pub escalated: Vec<String>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn stage(&self, name: &str);
    /// Called once per source after it resolved or degraded.
    fn source_done(&self, outcome: &SourceOutcome);
    /// Called when the pipeline completes.
    fn done(&self, output: &RunOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _name: &str) {}
    fn source_done(&self, _outcome: &SourceOutcome) {}
    fn done(&self, _output: &RunOutput) {}
}

/// Run the pipeline with the built-in third-party connectors.
pub async fn run(config: &PipelineConfig, progress: &dyn ProgressReporter) -> Result<RunOutput> {
    let registry = ConnectorRegistry::from_config(&config.app)?;
    run_with_registry(config, &registry, progress).await
}

/// Run the pipeline against an explicit set of connectors.
///
/// 1. Validate escalation rules
/// 2. Authoritative listing (fatal on failure)
/// 3. Primary sources, then triggered fallbacks
/// 4. Reconcile
/// 5. Node types and package versions, concurrently
#[instrument(skip_all, fields(sources = ?registry.names()))]
pub async fn run_with_registry(
    config: &PipelineConfig,
    registry: &ConnectorRegistry,
    progress: &dyn ProgressReporter,
) -> Result<RunOutput> {
    let start = Instant::now();
    let app = &config.app;
    let backoff = Duration::from_millis(app.http.rate_limit_backoff_ms);

    let ctx = Arc::new(RunContext::new());
    let transport = Transport::new(
        TransportOptions {
            user_agent: app.http.user_agent.clone(),
            api_base: app.http.api_base.clone(),
            token: config.token.clone(),
        },
        ctx.clone(),
    )?;

    let policy = EscalationPolicy::new(app.escalation.clone());
    policy.validate(registry)?;
    // Built up front so a bad pattern fails before any request.
    let extractor = if app.registry.extract_node_types {
        Some(NodeTypeExtractor::new(&app.registry, backoff)?)
    } else {
        None
    };
    let lookup = app
        .versions
        .enabled
        .then(|| VersionLookup::new(&app.versions, backoff));

    info!(authenticated = config.token.is_some(), "starting catalogue run");

    // --- Stage 1: authoritative listing ---
    progress.stage("Listing core nodes");
    let listing = RegistryListing::new(&app.registry.listing_url, backoff);
    let entries = listing.fetch_entries(&transport).await?;
    let core: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
    ctx.record_yield(REGISTRY_SOURCE, core.len());
    progress.source_done(&SourceOutcome::collected(REGISTRY_SOURCE, core.clone()));

    // --- Stage 2: third-party sources ---
    progress.stage("Collecting community sources");
    let report = policy.run(registry, &transport).await?;
    for outcome in &report.outcomes {
        progress.source_done(outcome);
    }

    // --- Stage 3: reconcile ---
    let catalogue = reconcile(&core, &report.outcomes);
    info!(
        core = catalogue.core_count,
        community = catalogue.community.len(),
        total = catalogue.nodes.len(),
        "catalogue reconciled"
    );

    // --- Stage 4: metadata ---
    if extractor.is_some() || lookup.is_some() {
        progress.stage("Resolving node types and package versions");
    }
    let (node_types, package_versions) = tokio::join!(
        async {
            match &extractor {
                Some(extractor) => {
                    let types = extractor.extract(&transport, &entries).await;
                    ctx.record_stage(NODE_TYPES_STAGE, types.len());
                    Some(types)
                }
                None => None,
            }
        },
        async {
            match &lookup {
                Some(lookup) => {
                    let versions = lookup.lookup(&transport, &catalogue.community).await;
                    ctx.record_stage(PACKAGE_VERSIONS_STAGE, versions.len());
                    Some(versions)
                }
                None => None,
            }
        },
    );

    let output = RunOutput {
        catalogue,
        node_types,
        package_versions,
        meta: ctx.snapshot(),
        escalated: report.escalated,
        elapsed: start.elapsed(),
    };

    info!(
        total = output.catalogue.nodes.len(),
        api_calls = output.meta.api_calls,
        elapsed_ms = output.elapsed.as_millis() as u64,
        "run complete"
    );
    progress.done(&output);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use nodecatalog_shared::{CatalogError, EscalationRule, NPM_SOURCE, TOPICS_SOURCE};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::assembler::build_snapshot;

    fn config(server: &MockServer) -> PipelineConfig {
        let base = server.uri();
        let mut app = AppConfig::default();
        app.http.api_base = base.clone();
        app.http.rate_limit_backoff_ms = 1;
        app.registry.listing_url = format!("{base}/nodes");
        app.document.url = format!("{base}/readme");
        app.npm.search_url = format!("{base}/-/v1/search");
        app.npm.queries = vec!["n8n-nodes".into()];
        app.github_topics.search_url = format!("{base}/search/repositories");
        app.github_topics.topics = vec!["n8n-nodes".into()];
        app.versions.mget_url = format!("{base}/v2/package/mget");

        PipelineConfig { app, token: Some("secret".into()) }
    }

    async fn mount_upstream(server: &MockServer) {
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Slack", "type": "dir"},
                {"name": "Cron", "type": "dir"},
                {"name": "index.ts", "type": "file"},
            ])))
            .mount(server)
            .await;

        for (dir, source) in [
            ("Slack", "description = { name: 'slack', version: [1, 2, 2.1] }"),
            ("Cron", "description = { name: 'cron', version: 1 }"),
        ] {
            Mock::given(method("GET"))
                .and(path(format!("/nodes/{dir}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {"name": format!("{dir}.node.ts"), "type": "file", "download_url": format!("{base}/raw/{dir}")}
                ])))
                .mount(server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("/raw/{dir}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(source))
                .mount(server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path("/readme"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("- [a](x) n8n-nodes-puppeteer\n- n8n-nodes-zeta, again n8n-nodes-puppeteer\n"),
            )
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/-/v1/search"))
            .and(query_param("text", "n8n-nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objects": [
                    {"package": {"name": "n8n-nodes-alpha"}},
                    {"package": {"name": "n8n-nodes-zeta"}},
                    {"package": {"name": "unrelated-lib"}},
                ]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v2/package/mget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "n8n-nodes-alpha": {"collected": {"metadata": {"version": "1.2.0"}}},
                "n8n-nodes-puppeteer": {"versions": ["0.9.0", "1.0.0"]},
            })))
            .mount(server)
            .await;
    }

    #[derive(Default)]
    struct Recording {
        stages: Mutex<Vec<String>>,
        sources: Mutex<Vec<(String, usize, bool)>>,
    }

    impl ProgressReporter for Recording {
        fn stage(&self, name: &str) {
            self.stages.lock().unwrap().push(name.to_string());
        }
        fn source_done(&self, outcome: &SourceOutcome) {
            self.sources.lock().unwrap().push((
                outcome.source.clone(),
                outcome.items().len(),
                outcome.is_degraded(),
            ));
        }
        fn done(&self, _output: &RunOutput) {}
    }

    #[tokio::test]
    async fn full_run_reconciles_all_sources() {
        let server = MockServer::start().await;
        mount_upstream(&server).await;

        let progress = Recording::default();
        let output = run(&config(&server), &progress).await.unwrap();

        assert_eq!(output.catalogue.core_count, 2);
        assert_eq!(
            output.catalogue.community,
            vec!["n8n-nodes-alpha", "n8n-nodes-puppeteer", "n8n-nodes-zeta"]
        );
        assert_eq!(
            output.catalogue.nodes,
            vec!["Cron", "Slack", "n8n-nodes-alpha", "n8n-nodes-puppeteer", "n8n-nodes-zeta"]
        );
        assert_eq!(output.escalated, vec![NPM_SOURCE.to_string(), TOPICS_SOURCE.to_string()]);

        let types = output.node_types.as_ref().unwrap();
        assert_eq!(types["n8n-nodes-base.slack"], 2);
        assert_eq!(types["n8n-nodes-base.cron"], 1);

        let versions = output.package_versions.as_ref().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions["n8n-nodes-puppeteer"], "1.0.0");

        // listing, 2 x (dir + raw), readme, npm, topics, mget
        assert_eq!(output.meta.api_calls, 9);
        assert_eq!(output.meta.sources[REGISTRY_SOURCE], 2);
        assert_eq!(output.meta.sources[NPM_SOURCE], 2);
        assert_eq!(output.meta.sources[TOPICS_SOURCE], 0);
        assert_eq!(output.meta.stages[NODE_TYPES_STAGE], 2);
        assert_eq!(output.meta.stages[PACKAGE_VERSIONS_STAGE], 2);
        assert_eq!(output.meta.sources.len(), 4);
        assert!(output.meta.degraded[TOPICS_SOURCE].contains("500"));

        let sources = progress.sources.lock().unwrap();
        assert_eq!(sources.len(), 4);
        assert!(sources.contains(&(TOPICS_SOURCE.to_string(), 0, true)));
    }

    #[tokio::test]
    async fn repeated_runs_differ_only_in_timestamp() {
        let server = MockServer::start().await;
        mount_upstream(&server).await;
        let config = config(&server);

        let first = run(&config, &SilentProgress).await.unwrap();
        let second = run(&config, &SilentProgress).await.unwrap();

        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let a = build_snapshot(&first, at);
        let mut b = build_snapshot(&second, later);

        assert_ne!(a, b);
        b.generated = at;
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/readme"))
            .respond_with(ResponseTemplate::new(200).set_body_string("n8n-nodes-x"))
            .expect(0)
            .mount(&server)
            .await;

        let err = run(&config(&server), &SilentProgress).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn disabled_metadata_makes_no_requests() {
        let server = MockServer::start().await;
        mount_upstream(&server).await;

        let mut config = config(&server);
        config.app.registry.extract_node_types = false;
        config.app.versions.enabled = false;
        // Primary alone satisfies the threshold, so no fallbacks either.
        config.app.escalation = vec![
            EscalationRule::primary(nodecatalog_shared::DOCUMENT_SOURCE),
            EscalationRule::fallback(NPM_SOURCE, 2),
        ];

        let output = run(&config, &SilentProgress).await.unwrap();

        assert!(output.node_types.is_none());
        assert!(output.package_versions.is_none());
        assert!(output.escalated.is_empty());
        assert_eq!(output.meta.api_calls, 2);
        assert!(output.meta.stages.is_empty());
    }

    #[test]
    fn unset_token_env_means_anonymous() {
        let mut app = AppConfig::default();
        app.http.token_env = "NODECATALOG_TEST_TOKEN_NEVER_SET".into();
        let config = PipelineConfig::from(&app);
        assert!(config.token.is_none());
        assert_eq!(config.app.output.path, "data/nodes.json");
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = PipelineConfig {
            app: AppConfig::default(),
            token: Some("ghp_supersecret".into()),
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("ghp_supersecret"));
        assert!(printed.contains("<redacted>"));
    }

    #[tokio::test]
    async fn unknown_escalation_source_fails_before_requests() {
        let server = MockServer::start().await;
        let mut config = config(&server);
        config.app.escalation.push(EscalationRule::fallback("bogus", 10));

        let err = run(&config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, CatalogError::Config { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
