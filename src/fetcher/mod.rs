//! The two fetch roles: HTML pages from the site and binary assets from the CDN.
//!
//! Status policy lives here rather than in the client so that any
//! [`HttpClient`] gets the same treatment: 200 is success, a 404 on a page is
//! [`Resolved::NotFound`], everything else (redirects included) is a fault.

mod client;

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

pub use client::{HttpClient, RawResponse, ReqwestClient, RequestRole};
use crate::error::{Resolved, Result, ScrapeError};

/// A fetched HTML document and the URL it was requested from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPage {
    pub url: String,
    pub body: String,
}

#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
}

impl Fetcher {
    #[must_use]
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Fetch an HTML page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Connection`] on transport failure and
    /// [`ScrapeError::Http`] for any status other than 200 or 404.
    #[instrument(skip(self))]
    pub async fn fetch_page(&self, url: &str) -> Result<Resolved<HtmlPage>> {
        let response = self.client.get(url, RequestRole::Page).await?;
        match response.status {
            200 => {
                debug!(len = response.body.len(), "Fetched page");
                Ok(Resolved::Found(HtmlPage {
                    url: url.to_string(),
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                }))
            }
            404 => {
                info!("Page does not exist");
                Ok(Resolved::NotFound)
            }
            _ => Err(http_fault(url, response)),
        }
    }

    /// Fetch a CDN asset.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Connection`] on transport failure and
    /// [`ScrapeError::Http`] for any status other than 200, 404 included.
    #[instrument(skip(self))]
    pub async fn fetch_asset(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url, RequestRole::Asset).await?;
        if response.status != 200 {
            return Err(http_fault(url, response));
        }
        debug!(len = response.body.len(), "Fetched asset");
        Ok(response.body)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

fn http_fault(url: &str, response: RawResponse) -> ScrapeError {
    warn!(url = %url, status = response.status, reason = %response.reason, "Unexpected status");
    ScrapeError::Http {
        url: url.to_string(),
        status: response.status,
        reason: response.reason,
    }
}
