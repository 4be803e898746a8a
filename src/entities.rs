//! Posts and profiles as handed to callers.
//!
//! A [`PostDraft`] is filled in step by step while a link is resolved and only
//! becomes a [`Post`] through [`PostDraft::validate`].

use serde::Serialize;
use tracing::error;

use crate::error::{Result, ScrapeError};
use crate::extract::{PostFields, ProfileFields};
use crate::links::{profile_url, ResourceKind};
use crate::media::MediaAsset;

/// A fully resolved post.
#[derive(Debug, Clone)]
pub struct Post {
    pub url: String,
    pub post_type: ResourceKind,
    /// Untransformed CDN asset location.
    pub content_url: String,
    pub author: String,
    pub icon_url: Option<String>,
    pub likes: String,
    pub comments: String,
    pub media: MediaAsset,
}

impl Post {
    /// Link to the author's profile under `site_root`.
    #[must_use]
    pub fn author_url(&self, site_root: &str) -> String {
        profile_url(site_root, &self.author)
    }
}

/// A post under construction.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub url: Option<String>,
    pub post_type: Option<ResourceKind>,
    pub content_url: Option<String>,
    pub author: Option<String>,
    pub icon_url: Option<String>,
    pub likes: Option<String>,
    pub comments: Option<String>,
    pub media: Option<MediaAsset>,
}

impl PostDraft {
    /// Start a draft for the shared link `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    /// Take over everything read off the page.
    pub fn apply_fields(&mut self, fields: PostFields) {
        self.url = Some(fields.url);
        self.post_type = Some(fields.kind);
        self.content_url = Some(fields.content_url);
        self.author = Some(fields.author);
        self.icon_url = fields.icon_url;
        self.likes = Some(fields.likes);
        self.comments = Some(fields.comments);
    }

    pub fn attach_media(&mut self, media: MediaAsset) {
        self.media = Some(media);
    }

    /// Check that every required field is present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Validation`] naming the first offending field.
    pub fn validate(self) -> Result<Post> {
        let post = Post {
            url: required("url", self.url)?,
            post_type: self
                .post_type
                .filter(|kind| kind.is_concrete_post())
                .ok_or_else(|| invalid("post_type", "missing or not a picture, video or gif"))?,
            content_url: required("content_url", self.content_url)?,
            author: required("author", self.author)?,
            icon_url: self.icon_url,
            likes: required("likes", self.likes)?,
            comments: required("comments", self.comments)?,
            media: self
                .media
                .filter(|media| !media.is_empty())
                .ok_or_else(|| invalid("media", "missing or empty"))?,
        };
        Ok(post)
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| invalid(field, "missing or empty"))
}

fn invalid(field: &str, problem: &str) -> ScrapeError {
    error!(field, problem, "Post failed validation");
    ScrapeError::Validation(format!("{field} is {problem}"))
}

/// A user page. Absent fields stay `None`; placeholders are a presentation
/// concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub username: String,
    pub url: String,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    pub subscribers: Option<String>,
    pub subscriptions: Option<String>,
    pub features: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn from_fields(fields: ProfileFields, site_root: &str) -> Self {
        Self {
            url: profile_url(site_root, &fields.username),
            username: fields.username,
            icon_url: fields.icon_url,
            description: fields.description,
            subscribers: fields.subscribers,
            subscriptions: fields.subscriptions,
            features: fields.features,
        }
    }
}
