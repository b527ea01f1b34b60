//! Application configuration for nodecatalog.
//!
//! User config lives at `~/.nodecatalog/nodecatalog.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "nodecatalog.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".nodecatalog";

/// Source name of the authoritative directory listing.
pub const REGISTRY_SOURCE: &str = "registry";
/// Source name of the community README scan.
pub const DOCUMENT_SOURCE: &str = "awesome-readme";
/// Source name of the npm keyword search.
pub const NPM_SOURCE: &str = "npm-search";
/// Source name of the GitHub topic search.
pub const TOPICS_SOURCE: &str = "github-topics";

// ---------------------------------------------------------------------------
// Config structs (matching nodecatalog.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Authoritative registry listing and node definition parsing.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Community README scan.
    #[serde(default)]
    pub document: DocumentConfig,

    /// npm keyword search.
    #[serde(default)]
    pub npm: NpmConfig,

    /// GitHub topic search.
    #[serde(default)]
    pub github_topics: TopicsConfig,

    /// Bulk package version lookup.
    #[serde(default)]
    pub versions: VersionsConfig,

    /// Snapshot output.
    #[serde(default)]
    pub output: OutputConfig,

    /// Primary/fallback source rules, evaluated in order.
    #[serde(default = "default_escalation")]
    pub escalation: Vec<EscalationRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            registry: RegistryConfig::default(),
            document: DocumentConfig::default(),
            npm: NpmConfig::default(),
            github_topics: TopicsConfig::default(),
            versions: VersionsConfig::default(),
            output: OutputConfig::default(),
            escalation: default_escalation(),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Client identification sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Name of the env var holding the registry bearer token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Base URL of the authoritative API; only requests to this host carry credentials.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Fixed wait before retrying a throttled (429) request.
    #[serde(default = "default_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            token_env: default_token_env(),
            api_base: default_api_base(),
            rate_limit_backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_user_agent() -> String {
    "n8n-knowledge-bot".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_backoff_ms() -> u64 {
    60_000
}

/// `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Contents listing of the core nodes directory.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Whether to derive per-node type versions from definition files.
    #[serde(default = "default_true")]
    pub extract_node_types: bool,

    /// File name pattern identifying a node definition file.
    #[serde(default = "default_definition_pattern")]
    pub definition_file_pattern: String,

    /// Prefix used to qualify extracted node type names.
    #[serde(default = "default_type_prefix")]
    pub type_prefix: String,

    /// Maximum definition lookups in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            extract_node_types: true,
            definition_file_pattern: default_definition_pattern(),
            type_prefix: default_type_prefix(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_listing_url() -> String {
    "https://api.github.com/repos/n8n-io/n8n/contents/packages/nodes-base/nodes".into()
}
fn default_definition_pattern() -> String {
    r"^[A-Za-z0-9_]+\.node\.(ts|js)$".into()
}
fn default_type_prefix() -> String {
    "n8n-nodes-base".into()
}
fn default_concurrency() -> usize {
    10
}
fn default_true() -> bool {
    true
}

/// `[document]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Raw URL of the community-curated list.
    #[serde(default = "default_document_url")]
    pub url: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            url: default_document_url(),
        }
    }
}

fn default_document_url() -> String {
    "https://raw.githubusercontent.com/restyler/awesome-n8n/main/README.md".into()
}

/// `[npm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmConfig {
    /// Registry search endpoint.
    #[serde(default = "default_npm_search_url")]
    pub search_url: String,

    /// Search texts; each one is paginated independently.
    #[serde(default = "default_npm_queries")]
    pub queries: Vec<String>,

    /// Results per page (`size`).
    #[serde(default = "default_npm_page_size")]
    pub page_size: usize,

    /// Offset ceiling (`from`).
    #[serde(default = "default_npm_max_offset")]
    pub max_offset: usize,

    /// Regex a package name must match to count as a candidate.
    #[serde(default = "default_candidate_pattern")]
    pub candidate_pattern: String,
}

impl Default for NpmConfig {
    fn default() -> Self {
        Self {
            search_url: default_npm_search_url(),
            queries: default_npm_queries(),
            page_size: default_npm_page_size(),
            max_offset: default_npm_max_offset(),
            candidate_pattern: default_candidate_pattern(),
        }
    }
}

fn default_npm_search_url() -> String {
    "https://registry.npmjs.org/-/v1/search".into()
}
fn default_npm_queries() -> Vec<String> {
    vec![
        "keywords:n8n-community-node-package".into(),
        "keywords:n8n-community-node".into(),
        "n8n-nodes".into(),
    ]
}
fn default_npm_page_size() -> usize {
    250
}
fn default_npm_max_offset() -> usize {
    5_000
}
fn default_candidate_pattern() -> String {
    r"(?i)(^|[@/_.-])n8n([_./-]|$)".into()
}

/// `[github_topics]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Repository search endpoint.
    #[serde(default = "default_topics_search_url")]
    pub search_url: String,

    /// Topics to query; each one is paginated independently.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Results per page (`per_page`).
    #[serde(default = "default_topics_per_page")]
    pub per_page: usize,

    /// The search API never returns more than this many results.
    #[serde(default = "default_topics_max_results")]
    pub max_results: usize,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            search_url: default_topics_search_url(),
            topics: default_topics(),
            per_page: default_topics_per_page(),
            max_results: default_topics_max_results(),
        }
    }
}

fn default_topics_search_url() -> String {
    "https://api.github.com/search/repositories".into()
}
fn default_topics() -> Vec<String> {
    vec!["n8n-community-node-package".into(), "n8n-nodes".into()]
}
fn default_topics_per_page() -> usize {
    100
}
fn default_topics_max_results() -> usize {
    1_000
}

/// `[versions]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionsConfig {
    /// Whether to resolve latest versions for candidate packages.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bulk metadata endpoint (POST, JSON array of names).
    #[serde(default = "default_mget_url")]
    pub mget_url: String,

    /// Names per request; the endpoint rejects more than 250.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mget_url: default_mget_url(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_mget_url() -> String {
    "https://api.npms.io/v2/package/mget".into()
}
fn default_chunk_size() -> usize {
    200
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Snapshot file path.
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> String {
    "data/nodes.json".into()
}

/// Whether a source always runs or only backs up the primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Primary,
    Fallback,
}

/// `[[escalation]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    /// Connector name (e.g. `npm-search`).
    pub source: String,
    pub role: SourceRole,
    /// A fallback runs only when the primary yield is below this value.
    #[serde(default)]
    pub threshold: usize,
}

impl EscalationRule {
    pub fn primary(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            role: SourceRole::Primary,
            threshold: 0,
        }
    }

    pub fn fallback(source: impl Into<String>, threshold: usize) -> Self {
        Self {
            source: source.into(),
            role: SourceRole::Fallback,
            threshold,
        }
    }
}

fn default_escalation() -> Vec<EscalationRule> {
    vec![
        EscalationRule::primary(DOCUMENT_SOURCE),
        EscalationRule::fallback(NPM_SOURCE, 150),
        EscalationRule::fallback(TOPICS_SOURCE, 150),
    ]
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.nodecatalog/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CatalogError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.nodecatalog/nodecatalog.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CatalogError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CatalogError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| CatalogError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CatalogError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the registry bearer token from the configured env var.
///
/// An unset or empty variable yields `None`; the registry is then queried
/// anonymously with lower rate limits.
pub fn read_token(config: &HttpConfig) -> Option<String> {
    match std::env::var(&config.token_env) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}
