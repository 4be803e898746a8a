//! Resolving links into posts and profiles.
//!
//! Every resolution runs the same sequence: fetch the page, extract fields,
//! fetch the asset, process it, validate. A 404 on the page ends the run with
//! [`Resolved::NotFound`]; any fault ends it with an error, after the fault
//! observer (and, for parsing faults, the debug sink) has seen it. Nothing is
//! retried here.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::entities::{Post, PostDraft, Profile};
use crate::error::{Resolved, Result, ScrapeError};
use crate::extract::{extract_post, extract_profile};
use crate::fetcher::{Fetcher, HtmlPage, HttpClient, ReqwestClient};
use crate::links::{classify, kind_of, profile_url, username_from_input, ResourceKind, ResourceLink};
use crate::media::{CropMethod, ExportFormat, FrameExtractor, MediaAsset, MediaProcessor};
use crate::observer::{DebugSink, FaultObserver, FileSnapshotSink, NoopSink, PageSnapshot, TracingObserver};

/// What a single link in a message resolved to.
#[derive(Debug, Clone)]
pub enum Resolution {
    Post(Box<Post>),
    Profile(Profile),
    NotFound,
}

/// Result of one link found in a message.
#[derive(Debug)]
pub struct LinkOutcome {
    pub link: ResourceLink,
    pub result: Result<Resolution>,
}

pub struct Scraper {
    fetcher: Fetcher,
    config: Arc<Config>,
    media: MediaProcessor,
    debug_sink: Arc<dyn DebugSink>,
    observer: Arc<dyn FaultObserver>,
}

impl Scraper {
    /// Build a scraper on top of `client`. Snapshots of unparseable pages go
    /// to `config.snapshot_dir` when it is set and are dropped otherwise.
    #[must_use]
    pub fn new(client: Arc<dyn HttpClient>, config: Config) -> Self {
        let debug_sink: Arc<dyn DebugSink> = match &config.snapshot_dir {
            Some(dir) => Arc::new(FileSnapshotSink::new(dir.clone())),
            None => Arc::new(NoopSink),
        };
        Self {
            fetcher: Fetcher::new(client),
            media: MediaProcessor::from_config(&config),
            config: Arc::new(config),
            debug_sink,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Build a scraper that talks to the network with reqwest.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = ReqwestClient::new(&config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    #[must_use]
    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = sink;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FaultObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Split gif videos with `frames` rather than the configured ffmpeg.
    #[must_use]
    pub fn with_frame_extractor(mut self, frames: Arc<dyn FrameExtractor>) -> Self {
        self.media = self.media.with_frame_extractor(frames, self.config.gif_fps);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a post link.
    ///
    /// # Errors
    ///
    /// Returns the fault that ended the resolution; see [`ScrapeError`].
    #[instrument(skip(self), fields(kind))]
    pub async fn resolve_post(
        &self,
        url: &str,
        crop: CropMethod,
        format: ExportFormat,
    ) -> Result<Resolved<Post>> {
        let result = self.build_post(url, crop, format).await;
        self.report(url, result)
    }

    /// Resolve a profile from a username or a profile link.
    ///
    /// # Errors
    ///
    /// Returns the fault that ended the resolution; see [`ScrapeError`].
    #[instrument(skip(self))]
    pub async fn resolve_profile(&self, username_or_url: &str) -> Result<Resolved<Profile>> {
        let result = self.build_profile(username_or_url).await;
        self.report(username_or_url, result)
    }

    /// Fetch a user's profile picture, re-encoded to the configured export
    /// format without cropping. `Found(None)` means the user has no picture.
    ///
    /// # Errors
    ///
    /// Returns the fault that ended the resolution; see [`ScrapeError`].
    #[instrument(skip(self))]
    pub async fn resolve_icon(&self, username: &str) -> Result<Resolved<Option<MediaAsset>>> {
        let result = self.build_icon(username).await;
        self.report(username, result)
    }

    /// Resolve every link in `text` concurrently. One link's fault never
    /// affects the others.
    pub async fn resolve_message(
        &self,
        text: &str,
        crop: CropMethod,
        format: ExportFormat,
    ) -> Vec<LinkOutcome> {
        let links = classify(text);
        debug!(count = links.len(), "Classified message");

        join_all(links.into_iter().map(|link| async move {
            let result = self.resolve_link(&link, crop, format).await;
            LinkOutcome { link, result }
        }))
        .await
    }

    async fn resolve_link(
        &self,
        link: &ResourceLink,
        crop: CropMethod,
        format: ExportFormat,
    ) -> Result<Resolution> {
        let resolution = if link.kind == ResourceKind::User {
            match self.resolve_profile(&link.url).await? {
                Resolved::Found(profile) => Resolution::Profile(profile),
                Resolved::NotFound => Resolution::NotFound,
            }
        } else {
            match self.resolve_post(&link.url, crop, format).await? {
                Resolved::Found(post) => Resolution::Post(Box::new(post)),
                Resolved::NotFound => Resolution::NotFound,
            }
        };
        Ok(resolution)
    }

    async fn build_post(
        &self,
        url: &str,
        crop: CropMethod,
        format: ExportFormat,
    ) -> Result<Resolved<Post>> {
        if !format.is_supported() {
            return Err(ScrapeError::UnsupportedFormat(format));
        }
        let link_kind = kind_of(url)
            .filter(|kind| *kind != ResourceKind::User)
            .ok_or_else(|| ScrapeError::invalid_link(url, "not a post link"))?;
        tracing::Span::current().record("kind", link_kind.as_str());

        let mut draft = PostDraft::new(url);

        let Resolved::Found(page) = self.fetcher.fetch_page(url).await? else {
            info!(url = %url, state = "not_found", "Post does not exist");
            return Ok(Resolved::NotFound);
        };
        debug!(url = %url, state = "fetched", "Fetched post page");

        let fields = self.parse(&page, |page| {
            extract_post(page, link_kind, &self.config.cdn_host)
        })?;
        let kind = fields.kind;
        let content_url = fields.content_url.clone();
        draft.apply_fields(fields);
        debug!(url = %url, state = "extracted", %kind, content_url = %content_url, "Extracted post");

        let bytes = self.fetcher.fetch_asset(&content_url).await?;
        let asset = MediaAsset::new(bytes, content_url);
        debug!(url = %url, state = "asset_fetched", len = asset.len(), "Fetched post media");

        let processed = self.media.process(asset, kind, crop, format).await?;
        debug!(url = %url, state = "processed", len = processed.len(), "Processed post media");
        draft.attach_media(processed);

        let post = draft.validate()?;
        info!(url = %post.url, state = "validated", kind = %post.post_type, author = %post.author, "Resolved post");
        Ok(Resolved::Found(post))
    }

    async fn build_profile(&self, username_or_url: &str) -> Result<Resolved<Profile>> {
        let username = username_from_input(username_or_url)
            .ok_or_else(|| {
            ScrapeError::invalid_link(username_or_url, "not a username or profile link")
        })?;
        let url = profile_url(&self.config.site_root, &username);

        let Resolved::Found(page) = self.fetcher.fetch_page(&url).await? else {
            info!(url = %url, state = "not_found", "User does not exist");
            return Ok(Resolved::NotFound);
        };
        debug!(url = %url, state = "fetched", "Fetched profile page");

        let fields = self.parse(&page, |page| extract_profile(page, &self.config.cdn_host))?;
        let profile = Profile::from_fields(fields, &self.config.site_root);
        info!(url = %profile.url, state = "validated", username = %profile.username, "Resolved profile");
        Ok(Resolved::Found(profile))
    }

    async fn build_icon(&self, username: &str) -> Result<Resolved<Option<MediaAsset>>> {
        let format = self.config.export_format;
        if !format.is_supported() {
            return Err(ScrapeError::UnsupportedFormat(format));
        }
        let Resolved::Found(profile) = self.build_profile(username).await? else {
            return Ok(Resolved::NotFound);
        };
        let Some(icon_url) = profile.icon_url else {
            info!(username = %profile.username, "User has no profile picture");
            return Ok(Resolved::Found(None));
        };

        let bytes = self.fetcher.fetch_asset(&icon_url).await?;
        let asset = MediaAsset::new(bytes, icon_url);
        let icon = self
            .media
            .process(asset, ResourceKind::Picture, CropMethod::NoCrop, format)
            .await?;
        Ok(Resolved::Found(Some(icon)))
    }

    /// Run `extract` over `page`, handing the page to the debug sink if it
    /// cannot be parsed.
    fn parse<T>(&self, page: &HtmlPage, extract: impl FnOnce(&HtmlPage) -> Result<T>) -> Result<T> {
        extract(page).inspect_err(|e| {
            if let ScrapeError::Parsing { reason, .. } = e {
                self.debug_sink
                    .capture(PageSnapshot::new(&page.url, reason, &page.body));
            }
        })
    }

    fn report<T>(&self, subject: &str, result: Result<T>) -> Result<T> {
        result.inspect_err(|e| self.observer.on_fault(subject, e))
    }
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("config", &self.config)
            .field("media", &self.media)
            .finish_non_exhaustive()
    }
}
