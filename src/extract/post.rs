use std::sync::LazyLock;

use scraper::Html;
use tracing::debug;

use super::{Rule, Source};
use crate::error::{Result, ScrapeError};
use crate::fetcher::HtmlPage;
use crate::links::patterns::PREVIEW_DIGEST_PATTERN;
use crate::links::{kind_of, strip_cdn_transforms, ResourceKind};

static CANONICAL: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("meta[property='og:url']", Source::Attr("content")));

static PICTURE: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("meta[property='og:image']", Source::Attr("content")));
static VIDEO: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("meta[property='og:video:url']", Source::Attr("content")));
// points at a still preview frame, see `gif_video_url`
static GIF_PREVIEW: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("link[rel=preload][as=image]", Source::Attr("href")));

static AUTHOR: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("meta[name='author']", Source::Attr("content")));
static ICON: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("div > a > img.MmRx.xY6H.gsQw.YDCg", Source::Attr("data-src")));
static LIKES: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("div > button:nth-child(3) > span > span", Source::Text));
static COMMENTS: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("div > button:nth-child(4) > span > span", Source::Text));

/// Everything read off a post page, before the asset is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    /// The page's canonical URL.
    pub url: String,
    pub kind: ResourceKind,
    pub content_url: String,
    pub author: String,
    pub icon_url: Option<String>,
    pub likes: String,
    pub comments: String,
}

/// Extract the fields of a post page.
///
/// `link_kind` is the kind the shared link declared; the page's canonical URL
/// decides the kind that is actually used.
///
/// # Errors
///
/// Returns [`ScrapeError::Parsing`] when the canonical URL is missing or does
/// not resolve to a picture, video or gif, when the content URL or any of
/// author, likes and comments is missing, or when a gif preview carries no
/// digest.
pub fn extract_post(page: &HtmlPage, link_kind: ResourceKind, cdn_host: &str) -> Result<PostFields> {
    let document = Html::parse_document(&page.body);

    let canonical = CANONICAL
        .first(&document)
        .ok_or_else(|| missing(&page.url, "canonical URL", &CANONICAL))?;
    let kind = kind_of(&canonical).ok_or_else(|| {
        ScrapeError::parsing(&page.url, format!("canonical URL {canonical} is not a site link"))
    })?;
    if kind != link_kind {
        debug!(url = %page.url, %link_kind, %kind, "Canonical URL changed the post kind");
    }

    let content_url = match kind {
        ResourceKind::Picture => {
            let raw = PICTURE.first(&document).ok_or_else(|| missing(&page.url, "picture", &PICTURE))?;
            strip_cdn_transforms(&raw, cdn_host)
        }
        ResourceKind::Video => {
            let raw = VIDEO.first(&document).ok_or_else(|| missing(&page.url, "video", &VIDEO))?;
            strip_cdn_transforms(&raw, cdn_host)
        }
        ResourceKind::Gif => {
            let preview = GIF_PREVIEW
                .first(&document)
                .ok_or_else(|| missing(&page.url, "gif preview", &GIF_PREVIEW))?;
            gif_video_url(&preview, cdn_host).ok_or_else(|| {
                ScrapeError::parsing(&page.url, format!("no digest in gif preview {preview}"))
            })?
        }
        ResourceKind::Meme | ResourceKind::User => {
            return Err(ScrapeError::parsing(
                &page.url,
                format!("canonical URL {canonical} still resolves to {kind}"),
            ));
        }
    };

    let author: String = AUTHOR
        .first(&document)
        .ok_or_else(|| missing(&page.url, "author", &AUTHOR))?
        .split_whitespace()
        .collect();
    let icon_url = ICON
        .first(&document)
        .map(|icon| strip_cdn_transforms(&icon, cdn_host));
    if icon_url.is_none() {
        debug!(url = %page.url, %author, "Author has no picture");
    }
    let likes = LIKES.first(&document).ok_or_else(|| missing(&page.url, "likes", &LIKES))?;
    let comments = COMMENTS
        .first(&document)
        .ok_or_else(|| missing(&page.url, "comments", &COMMENTS))?;

    Ok(PostFields {
        url: canonical,
        kind,
        content_url,
        author,
        icon_url,
        likes,
        comments,
    })
}

fn missing(url: &str, what: &str, rule: &Rule) -> ScrapeError {
    ScrapeError::parsing(url, format!("no {what} found at `{}`", rule.css))
}

/// Rewrite a gif's preview frame URL (`.../<hex>_<digit>.jpg`) to the video
/// asset carrying the animation.
#[must_use]
pub fn gif_video_url(preview_url: &str, cdn_host: &str) -> Option<String> {
    let digest = PREVIEW_DIGEST_PATTERN.captures(preview_url)?.get(1)?.as_str();
    Some(format!("https://{cdn_host}/images/{digest}_1.mp4"))
}
