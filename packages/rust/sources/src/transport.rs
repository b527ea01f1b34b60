//! Counted HTTP transport with per-destination header policy.
//!
//! Every connector talks to the outside world through [`Transport`]. Requests
//! to the authoritative API host carry the bearer token and the GitHub JSON
//! media type; every other destination only sees the user agent.

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use nodecatalog_shared::{CatalogError, Result, RunContext};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Media type requested from the authoritative API.
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Settings needed to build a [`Transport`].
#[derive(Clone)]
pub struct TransportOptions {
    /// Client identification sent with every request.
    pub user_agent: String,
    /// Base URL of the authoritative API.
    pub api_base: String,
    /// Optional bearer credential for the authoritative API.
    pub token: Option<String>,
}

/// Shared HTTP client that counts every outbound call in the run's [`RunContext`].
#[derive(Clone)]
pub struct Transport {
    client: Client,
    api_base: Url,
    token: Option<String>,
    ctx: Arc<RunContext>,
}

impl Transport {
    /// Build a transport bound to one run's counters.
    pub fn new(opts: TransportOptions, ctx: Arc<RunContext>) -> Result<Self> {
        let api_base = Url::parse(&opts.api_base)
            .map_err(|e| CatalogError::config(format!("invalid api_base '{}': {e}", opts.api_base)))?;

        let client = Client::builder()
            .user_agent(opts.user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| CatalogError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base,
            token: opts.token,
            ctx,
        })
    }

    /// Counters of the run this transport belongs to.
    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// GET a URL and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(Method::GET, url, |b| b).await?;
        decode_json(response, url).await
    }

    /// GET a URL and return its body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.send(Method::GET, url, |b| b).await?;
        response
            .text()
            .await
            .map_err(|e| CatalogError::Network(format!("{url}: failed to read body: {e}")))
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, url, |b| b.json(body)).await?;
        decode_json(response, url).await
    }

    /// Whether `url` points at the authoritative API (same host and port).
    fn is_authoritative(&self, url: &Url) -> bool {
        url.host_str() == self.api_base.host_str()
            && url.port_or_known_default() == self.api_base.port_or_known_default()
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response> {
        // Counted up front so failed and throttled attempts show up too.
        self.ctx.record_call();

        let parsed = Url::parse(url)
            .map_err(|e| CatalogError::validation(format!("invalid URL '{url}': {e}")))?;

        let mut builder = self.client.request(method.clone(), parsed.clone());
        if self.is_authoritative(&parsed) {
            builder = builder.header(ACCEPT, GITHUB_JSON);
            if let Some(token) = &self.token {
                builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }

        debug!(%method, url, "sending request");

        let response = body(builder)
            .send()
            .await
            .map_err(|e| CatalogError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                url,
            ));
        }

        Ok(response)
    }
}

impl std::fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOptions")
            .field("user_agent", &self.user_agent)
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("api_base", &self.api_base.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_calls", &self.ctx.api_calls())
            .finish()
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| CatalogError::parse(format!("{url}: unexpected response body: {e}")))
}
