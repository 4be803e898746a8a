//! Fault taxonomy shared by every stage of the pipeline.
//!
//! "Does not exist" is deliberately absent: a missing page is a normal outcome
//! and is reported through [`Resolved::NotFound`] instead.

use thiserror::Error;

use crate::media::ExportFormat;

/// Result alias for pipeline operations.
pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;

/// Outcome of resolving a link that was fetched without faulting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    /// The resource exists and was fully built.
    Found(T),
    /// The site answered 404 for the page.
    NotFound,
}

impl<T> Resolved<T> {
    /// Convert into an `Option`, discarding the not-found distinction.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// DNS, connect, TLS or timeout failure reaching the site or the CDN.
    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// Any status other than 200 or a page-level 404.
    #[error("{url} answered {status} {reason}")]
    Http {
        url: String,
        status: u16,
        reason: String,
    },

    /// The input is not a post link, a profile link or a username. No page
    /// was fetched.
    #[error("{input} is not a usable link: {reason}")]
    InvalidLink { input: String, reason: String },

    /// A required element was missing or a page could not be interpreted.
    #[error("could not parse {url}: {reason}")]
    Parsing { url: String, reason: String },

    /// A built entity failed its completeness check.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Decoding, cropping, encoding or transcoding a media asset failed.
    #[error("media processing failed: {0}")]
    Media(String),

    /// The requested export format has no encoder available.
    #[error("export format {0} is not supported by the image codec")]
    UnsupportedFormat(ExportFormat),
}

impl ScrapeError {
    pub fn parsing(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parsing {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_link(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLink {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn media(message: impl std::fmt::Display) -> Self {
        Self::Media(message.to_string())
    }

    /// Only network-level failures are worth retrying, and only by the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    #[must_use]
    pub const fn is_parsing(&self) -> bool {
        matches!(self, Self::Parsing { .. })
    }

    /// Short label used in structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Http { .. } => "http",
            Self::InvalidLink { .. } => "invalid_link",
            Self::Parsing { .. } => "parsing",
            Self::Validation(_) => "validation",
            Self::Media(_) => "media",
            Self::UnsupportedFormat(_) => "unsupported_format",
        }
    }
}
