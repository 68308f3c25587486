use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::config::DumpConfig;
use crate::error::PageError;
use crate::parse::{parse_page, Page};
use crate::{Error, Result};

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
/// How much of an error body is kept in `PageError::Endpoint`.
const ERROR_BODY_EXCERPT: usize = 512;

/// Submits one fully substituted query and returns its page of bindings.
#[async_trait]
pub trait QueryEndpoint: Send + Sync {
    async fn submit_page(&self, query: &str) -> core::result::Result<Page, PageError>;
}

/// `QueryEndpoint` speaking the SPARQL 1.1 protocol over HTTP.
#[derive(Clone)]
pub struct HttpEndpoint {
    // Client uses Arc so we can clone cheaply
    client: Client,
    url: String,
    auth_header: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for HttpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEndpoint")
            .field("url", &self.url)
            .field("auth_header", &self.auth_header.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            auth_header: None,
            timeout,
        })
    }

    pub fn from_config(config: &DumpConfig) -> Result<Self> {
        let url = config
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("no SPARQL endpoint configured (set SPARQL_ENDPOINT)".into()))?;
        let mut endpoint = Self::new(url, config.timeout)?;
        endpoint.auth_header = config.auth_header.clone();
        Ok(endpoint)
    }

    pub fn with_auth_header(mut self, value: impl Into<String>) -> Self {
        self.auth_header = Some(value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> PageError {
        if err.is_timeout() {
            PageError::Timeout(self.timeout)
        } else {
            PageError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl QueryEndpoint for HttpEndpoint {
    async fn submit_page(&self, query: &str) -> core::result::Result<Page, PageError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(header::ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", query)]);
        if let Some(auth) = &self.auth_header {
            request = request.header(header::AUTHORIZATION, auth);
        }

        let res = request.send().await.map_err(|e| self.classify(e))?;
        let status = res.status();
        let body = res.text().await.map_err(|e| self.classify(e))?;
        debug!(status = status.as_u16(), bytes = body.len(), "Received page response");

        if !status.is_success() {
            let message: String = body.trim().chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(PageError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }
        parse_page(&body)
    }
}
