use std::sync::LazyLock;

use scraper::Html;
use tracing::debug;

use super::{Rule, Source};
use crate::error::{Result, ScrapeError};
use crate::fetcher::HtmlPage;
use crate::links::strip_cdn_transforms;

static USERNAME: LazyLock<Rule> = LazyLock::new(|| Rule::new("div.pkOr > div.zWwJ", Source::Text));
static ICON: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("div.Du6F > span.uHyU > span.rL50 > img", Source::Attr("src")));
static DESCRIPTION: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("div.pkOr > div.aSGm", Source::Text));
static SUBSCRIBERS: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("div.pkOr > div.brxh > a:nth-child(1)", Source::Text));
static SUBSCRIPTIONS: LazyLock<Rule> =
    LazyLock::new(|| Rule::new("div.pkOr > div.brxh > a:nth-child(2)", Source::Text));
static FEATURES: LazyLock<Rule> = LazyLock::new(|| Rule::new("div.pkOr > div.x6q6", Source::Text));

/// Everything read off a profile page. Only the username is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub username: String,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    pub subscribers: Option<String>,
    pub subscriptions: Option<String>,
    pub features: Option<String>,
}

/// Extract the fields of a profile page.
///
/// # Errors
///
/// Returns [`ScrapeError::Parsing`] when the page has no username.
pub fn extract_profile(page: &HtmlPage, cdn_host: &str) -> Result<ProfileFields> {
    let document = Html::parse_document(&page.body);

    let username = USERNAME.first(&document).ok_or_else(|| {
        ScrapeError::parsing(&page.url, format!("no username found at `{}`", USERNAME.css))
    })?;

    let fields = ProfileFields {
        icon_url: ICON
            .first(&document)
            .map(|icon| strip_cdn_transforms(&icon, cdn_host)),
        description: DESCRIPTION.first(&document),
        subscribers: count(&SUBSCRIBERS, &document),
        subscriptions: count(&SUBSCRIPTIONS, &document),
        features: count(&FEATURES, &document),
        username,
    };
    debug!(
        username = %fields.username,
        has_icon = fields.icon_url.is_some(),
        has_description = fields.description.is_some(),
        "Extracted profile"
    );
    Ok(fields)
}

/// "1.2K subscribers" -> "1.2K"
fn count(rule: &Rule, document: &Html) -> Option<String> {
    rule.first(document)?
        .split_whitespace()
        .next()
        .map(str::to_string)
}
