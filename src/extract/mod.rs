//! Field extraction from fetched pages.
//!
//! Each field is described by a [`Rule`]: a CSS selector plus the attribute to
//! read (or the element text). Posts and profiles have their own rule tables;
//! whether a missing field is fatal is decided by the caller of the rule, not
//! the rule itself.

mod post;
mod profile;

use scraper::{ElementRef, Html, Selector};

pub use post::{extract_post, gif_video_url, PostFields};
pub use profile::{extract_profile, ProfileFields};

/// Where a field's value comes from inside a matched element.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Source {
    Attr(&'static str),
    Text,
}

/// One (selector, source) pair.
pub(crate) struct Rule {
    pub(crate) css: &'static str,
    selector: Selector,
    source: Source,
}

impl Rule {
    /// Panics on an invalid selector; only called from static initializers
    /// with literal selectors.
    pub(crate) fn new(css: &'static str, source: Source) -> Self {
        let selector = Selector::parse(css).expect("static selector must parse");
        Self {
            css,
            selector,
            source,
        }
    }

    /// Value of the first match, trimmed. Empty values count as missing.
    pub(crate) fn first(&self, document: &Html) -> Option<String> {
        self.nth(document, 0)
    }

    /// Value of the `index`-th match, trimmed. Empty values count as missing.
    pub(crate) fn nth(&self, document: &Html, index: usize) -> Option<String> {
        document
            .select(&self.selector)
            .nth(index)
            .and_then(|element| self.read(element))
    }

    fn read(&self, element: ElementRef<'_>) -> Option<String> {
        let value = match self.source {
            Source::Attr(name) => element.value().attr(name)?.to_string(),
            Source::Text => element.text().collect::<String>(),
        };
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
