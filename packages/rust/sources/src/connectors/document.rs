//! Community README scan.
//!
//! The list is curated by hand and its layout changes without notice, so the
//! document is never parsed structurally; package names are pattern-matched
//! out of the raw text. Few or zero matches is a valid outcome.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use nodecatalog_shared::{DOCUMENT_SOURCE, DocumentConfig, Result};

use super::Connector;
use crate::paginate::retry_rate_limited;
use crate::patterns::extract_package_mentions;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct DocumentScan {
    url: String,
    backoff: Duration,
}

impl DocumentScan {
    pub fn new(config: &DocumentConfig, backoff: Duration) -> Self {
        Self {
            url: config.url.clone(),
            backoff,
        }
    }
}

#[async_trait]
impl Connector for DocumentScan {
    fn name(&self) -> &str {
        DOCUMENT_SOURCE
    }

    #[instrument(skip_all, fields(url = %self.url))]
    async fn collect(&self, transport: &Transport) -> Result<Vec<String>> {
        let text = retry_rate_limited(self.backoff, || transport.get_text(&self.url)).await?;
        let names = extract_package_mentions(&text);
        debug!(bytes = text.len(), matches = names.len(), "document scanned");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nodecatalog_shared::RunContext;
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

    fn scan(server: &MockServer) -> DocumentScan {
        let config = DocumentConfig {
            url: format!("{}/README.md", server.uri()),
        };
        DocumentScan::new(&config, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn scans_fixture_document() {
        let server = MockServer::start().await;
        let readme = std::fs::read_to_string("../../../fixtures/readme/awesome.md")
            .expect("read readme fixture");

        Mock::given(method("GET"))
            .and(path("/README.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string(readme))
            .mount(&server)
            .await;

        let names = scan(&server).collect(&transport()).await.unwrap();
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "n8n-nodes-puppeteer");
    }

    #[tokio::test]
    async fn empty_document_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Moved\n"))
            .mount(&server)
            .await;

        let names = scan(&server).collect(&transport()).await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn missing_document_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = scan(&server).collect(&transport()).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
