use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect, Client};
use tracing::debug;

use crate::config::Config;
use crate::constants::{PAGE_ACCEPT, PAGE_ACCEPT_LANGUAGE};
use crate::error::{Result, ScrapeError};

/// Which of the two fetch roles a request plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRole {
    /// An HTML document from the site.
    Page,
    /// A binary asset from the CDN.
    Asset,
}

/// A response as received, before any status policy is applied.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub body: Bytes,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            body: body.into(),
        }
    }
}

/// Single GET with a bounded timeout and redirects left unfollowed.
///
/// Implementations only report transport failures as errors; every status
/// code comes back as a [`RawResponse`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, role: RequestRole) -> Result<RawResponse>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
    page_headers: HeaderMap,
}

impl ReqwestClient {
    /// Build a client from the configured timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized or the user
    /// agent is not a valid header value.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ScrapeError::Connection {
                url: config.site_root.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let mut page_headers = HeaderMap::new();
        page_headers.insert(ACCEPT, HeaderValue::from_static(PAGE_ACCEPT));
        page_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(PAGE_ACCEPT_LANGUAGE));

        Ok(Self {
            client,
            page_headers,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, role: RequestRole) -> Result<RawResponse> {
        let request = match role {
            RequestRole::Page => self.client.get(url).headers(self.page_headers.clone()),
            RequestRole::Asset => self.client.get(url),
        };

        let response = request.send().await.map_err(|e| connection_error(url, &e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| connection_error(url, &e))?;

        debug!(url = %url, status = status.as_u16(), len = body.len(), "Received response");

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

fn connection_error(url: &str, error: &reqwest::Error) -> ScrapeError {
    let message = if error.is_timeout() {
        format!("timed out: {error}")
    } else if error.is_connect() {
        format!("could not connect: {error}")
    } else {
        error.to_string()
    };
    ScrapeError::Connection {
        url: url.to_string(),
        message,
    }
}
