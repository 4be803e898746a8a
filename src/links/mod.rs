//! Recognizing site links in free text.
//!
//! [`classify`] finds every link in a message, [`kind_of`] re-derives the kind
//! of a single URL (used once a page reveals its canonical URL) and
//! [`username_from_url`] pulls the name out of a profile link.

mod normalize;
pub(crate) mod patterns;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

pub use normalize::strip_cdn_transforms;
use patterns::{LINK_PATTERN, USERNAME_PATTERN, USER_PATTERN};

/// What a link (or a page's canonical URL) points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Picture,
    Video,
    Gif,
    /// A post whose media kind is only known after inspecting the page.
    Meme,
    User,
}

impl ResourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Picture => "picture",
            Self::Video => "video",
            Self::Gif => "gif",
            Self::Meme => "meme",
            Self::User => "user",
        }
    }

    /// Whether a successfully built post may carry this kind.
    #[must_use]
    pub const fn is_concrete_post(self) -> bool {
        matches!(self, Self::Picture | Self::Video | Self::Gif)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "picture" => Ok(Self::Picture),
            "video" => Ok(Self::Video),
            "gif" => Ok(Self::Gif),
            "meme" => Ok(Self::Meme),
            "user" => Ok(Self::User),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

/// A recognized link together with the kind its path declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceLink {
    pub url: String,
    pub kind: ResourceKind,
}

impl fmt::Display for ResourceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.kind)
    }
}

/// Find every site link in `text`, left to right.
#[must_use]
pub fn classify(text: &str) -> Vec<ResourceLink> {
    LINK_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let url = caps.get(0)?.as_str();
            let kind = caps.get(1)?.as_str().parse().ok()?;
            Some(ResourceLink {
                url: url.to_string(),
                kind,
            })
        })
        .collect()
}

/// Derive the kind of a single URL from its first path segment.
#[must_use]
pub fn kind_of(url: &str) -> Option<ResourceKind> {
    let parsed = Url::parse(url).ok()?;
    if !is_site_host(parsed.host_str()?) {
        return None;
    }
    let mut segments = parsed.path_segments()?;
    let kind: ResourceKind = segments.next()?.parse().ok()?;
    // a bare `/picture/` is not a link to anything
    segments.next().filter(|slug| !slug.is_empty())?;
    Some(kind)
}

/// Extract the username from a well-formed profile link.
#[must_use]
pub fn username_from_url(url: &str) -> Option<String> {
    USER_PATTERN
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Accept either a profile link or a bare username.
#[must_use]
pub fn username_from_input(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return username_from_url(trimmed);
    }
    let bare = trimmed.trim_start_matches('@');
    USERNAME_PATTERN
        .is_match(bare)
        .then(|| bare.to_string())
}

/// Profile page URL for `username` under `site_root`.
#[must_use]
pub fn profile_url(site_root: &str, username: &str) -> String {
    format!("{}/user/{username}", site_root.trim_end_matches('/'))
}

fn is_site_host(host: &str) -> bool {
    host == "ifunny.co"
        || host.strip_suffix(".ifunny.co").is_some_and(|locale| {
            locale.len() == 2 && locale.chars().all(|c| c.is_ascii_lowercase())
        })
}
