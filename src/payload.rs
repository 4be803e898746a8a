//! Chat-ready captions and attachments.
//!
//! This is the presentation boundary: absent profile fields get their
//! placeholder text here and nowhere else.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::constants::{
    DEFAULT_AVATAR_URL, NO_DESCRIPTION, NO_FEATURES, NO_SUBSCRIBERS, NO_SUBSCRIPTIONS,
};
use crate::entities::{Post, Profile};
use crate::links::patterns::ASSET_NAME_PATTERN;
use crate::links::{username_from_input, ResourceKind};
use crate::media::{ExportFormat, MediaAsset};

/// Characters with a meaning in chat markdown.
const MARKDOWN_SPECIAL: &[char] = &['\\', '*', '_', '~', '|', '>', '`'];

/// Escape chat-markdown special characters so names render literally.
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A named file to upload alongside a caption.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Bytes,
}

impl Attachment {
    /// Attachment for a post's media. Pictures take the export format's
    /// extension, videos `mp4` and gifs `gif`.
    #[must_use]
    pub fn for_post(post: &Post, format: ExportFormat) -> Self {
        let extension = match post.post_type {
            ResourceKind::Video => "mp4",
            ResourceKind::Gif => "gif",
            _ => format.extension(),
        };
        let stem = asset_digest(&post.content_url)
            .unwrap_or_else(|| format!("ifunny_{}", post.post_type));
        Self {
            file_name: format!("{stem}.{extension}"),
            bytes: post.media.bytes().clone(),
        }
    }

    /// Attachment for a profile picture, `<username>_pfp.<ext>`. Accepts the
    /// same input as the profile lookup: a bare name, `@name` or a profile link.
    #[must_use]
    pub fn for_icon(username_or_url: &str, icon: &MediaAsset, format: ExportFormat) -> Self {
        let username = username_from_input(username_or_url)
            .unwrap_or_else(|| file_safe(username_or_url.trim()));
        Self {
            file_name: format!("{username}_pfp.{}", format.extension()),
            bytes: icon.bytes().clone(),
        }
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Hex digest naming a CDN asset, if its file name carries one.
#[must_use]
pub fn asset_digest(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    ASSET_NAME_PATTERN
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Caption for a resolved post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostCaption {
    pub title: String,
    pub url: String,
    pub description: String,
    pub icon_url: String,
    pub content_url: String,
}

impl PostCaption {
    #[must_use]
    pub fn new(post: &Post) -> Self {
        Self {
            title: format!("Post by {}", escape_markdown(&post.author)),
            url: post.url.clone(),
            description: format!("{} likes.\t{} comments.", post.likes, post.comments),
            icon_url: post
                .icon_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
            content_url: post.content_url.clone(),
        }
    }
}

impl fmt::Display for PostCaption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} <{}>", self.title, self.url)?;
        write!(f, "{}", self.description)
    }
}

/// A post's caption and file, ready to send.
#[derive(Debug, Clone, Serialize)]
pub struct PostPayload {
    pub caption: PostCaption,
    pub attachment: Attachment,
}

impl PostPayload {
    #[must_use]
    pub fn new(post: &Post, format: ExportFormat) -> Self {
        Self {
            caption: PostCaption::new(post),
            attachment: Attachment::for_post(post, format),
        }
    }
}

/// Caption for a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCaption {
    pub author: String,
    pub url: String,
    pub description: String,
    pub thumbnail_url: String,
    pub footer: String,
}

impl ProfileCaption {
    #[must_use]
    pub fn new(profile: &Profile) -> Self {
        let or = |value: &Option<String>, placeholder: &str| {
            value.clone().unwrap_or_else(|| placeholder.to_string())
        };
        Self {
            author: escape_markdown(&profile.username),
            url: profile.url.clone(),
            description: or(&profile.description, NO_DESCRIPTION),
            thumbnail_url: or(&profile.icon_url, DEFAULT_AVATAR_URL),
            footer: format!(
                "{} subscribers, {} subscriptions, {} features",
                or(&profile.subscribers, NO_SUBSCRIBERS),
                or(&profile.subscriptions, NO_SUBSCRIPTIONS),
                or(&profile.features, NO_FEATURES),
            ),
        }
    }
}

impl fmt::Display for ProfileCaption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} <{}>", self.author, self.url)?;
        writeln!(f, "{}", self.description)?;
        write!(f, "{}", self.footer)
    }
}
