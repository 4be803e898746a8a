//! End-to-end resolution tests against an in-memory site.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use funny_embed::config::Config;
use funny_embed::error::{Resolved, Result, ScrapeError};
use funny_embed::fetcher::{HttpClient, RawResponse, RequestRole};
use funny_embed::links::ResourceKind;
use funny_embed::media::{region_hash, CropMethod, ExportFormat, FrameExtractor};
use funny_embed::observer::{DebugSink, FaultObserver, PageSnapshot};
use funny_embed::{Resolution, Scraper};

/// Serves canned responses; anything not registered is a 404.
#[derive(Default)]
struct FakeSite {
    routes: HashMap<String, RawResponse>,
    requests: Mutex<Vec<(String, RequestRole)>>,
}

impl FakeSite {
    fn page(mut self, url: &str, html: &str) -> Self {
        self.routes
            .insert(url.to_string(), RawResponse::new(200, html.to_string()));
        self
    }

    fn asset(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.routes.insert(url.to_string(), RawResponse::new(200, bytes));
        self
    }

    fn status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(url.to_string(), RawResponse::new(status, ""));
        self
    }
}

#[async_trait]
impl HttpClient for FakeSite {
    async fn get(&self, url: &str, role: RequestRole) -> Result<RawResponse> {
        self.requests.lock().unwrap().push((url.to_string(), role));
        if url.contains("unreachable") {
            return Err(ScrapeError::Connection {
                url: url.to_string(),
                message: "dns error".to_string(),
            });
        }
        Ok(self
            .routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| RawResponse::new(404, "")))
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<PageSnapshot>>);

impl DebugSink for RecordingSink {
    fn capture(&self, snapshot: PageSnapshot) {
        self.0.lock().unwrap().push(snapshot);
    }
}

#[derive(Default)]
struct RecordingObserver(Mutex<Vec<(String, &'static str)>>);

impl FaultObserver for RecordingObserver {
    fn on_fault(&self, url: &str, error: &ScrapeError) {
        self.0.lock().unwrap().push((url.to_string(), error.kind()));
    }
}

const PICTURE_URL: &str = "https://ifunny.co/picture/deep-web-intel-2mBos8df8";
const PICTURE_ASSET: &str = "https://img.ifunny.co/images/0a1b2c3d_1.jpg";
const VIDEO_URL: &str = "https://ifunny.co/video/qN0jEBRCA";
const VIDEO_ASSET: &str = "https://img.ifunny.co/videos/77aa_1.mp4";
const GIF_URL: &str = "https://ifunny.co/gif/dancing-cat-Xk3pQ";
const GIF_ASSET: &str = "https://img.ifunny.co/images/c0ffee42_1.mp4";

/// Hands back solid frames and remembers the rate it was asked for.
#[derive(Default)]
struct FakeFrames {
    requested_fps: Mutex<Vec<u32>>,
}

#[async_trait]
impl FrameExtractor for FakeFrames {
    async fn extract_frames(&self, _video: &[u8], fps: u32) -> Result<Vec<RgbaImage>> {
        self.requested_fps.lock().unwrap().push(fps);
        Ok((0..3u8)
            .map(|i| RgbaImage::from_pixel(32, 24, Rgba([i * 80, 0, 255 - i * 80, 255])))
            .collect())
    }
}

fn post_page(canonical: &str, content_meta: &str) -> String {
    format!(
        r#"<html><head>
            <meta property="og:url" content="{canonical}">
            {content_meta}
            <meta name="author" content="someone">
        </head><body>
            <div><a href="/user/someone"><img class="MmRx xY6H gsQw YDCg" data-src="https://img.ifunny.co/user_photos/ff00_1.jpg"></a></div>
            <div>
              <button>share</button>
              <button>save</button>
              <button><span><span>1.2K</span></span></button>
              <button><span><span>34</span></span></button>
            </div>
        </body></html>"#
    )
}

fn picture_page() -> String {
    post_page(
        PICTURE_URL,
        r#"<meta property="og:image" content="https://imageproxy.ifunny.co/crop:x-20,resize:640x/images/0a1b2c3d_1.jpg">"#,
    )
}

fn profile_page(with_icon: bool) -> String {
    let icon = if with_icon {
        r#"<div class="Du6F"><span class="uHyU"><span class="rL50"><img src="https://img.ifunny.co/user_photos/ff00_1.jpg"></span></span></div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>{icon}
            <div class="pkOr">
              <div class="zWwJ">someone</div>
              <div class="brxh"><a>12 subscribers</a><a>3 subscriptions</a></div>
            </div>
        </body></html>"#
    )
}

fn picture(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 128, 255])
    }))
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn scraper(site: FakeSite, config: Config) -> (Scraper, Arc<FakeSite>, Arc<RecordingSink>, Arc<RecordingObserver>) {
    let site = Arc::new(site);
    let sink = Arc::new(RecordingSink::default());
    let observer = Arc::new(RecordingObserver::default());
    let scraper = Scraper::new(site.clone(), config)
        .with_debug_sink(sink.clone())
        .with_observer(observer.clone());
    (scraper, site, sink, observer)
}

#[tokio::test]
async fn test_picture_without_watermark_is_not_cropped() {
    let original = picture(240, 180);
    let site = FakeSite::default()
        .page(PICTURE_URL, &picture_page())
        .asset(PICTURE_ASSET, png_bytes(&original));
    let (scraper, site, sink, _) = scraper(site, Config::for_testing());

    let post = scraper
        .resolve_post(PICTURE_URL, CropMethod::Auto, ExportFormat::Png)
        .await
        .unwrap()
        .found()
        .expect("post should exist");

    assert_eq!(post.post_type, ResourceKind::Picture);
    assert_eq!(post.url, PICTURE_URL);
    assert_eq!(post.content_url, PICTURE_ASSET);
    assert_eq!(post.author, "someone");
    assert_eq!(post.likes, "1.2K");
    assert_eq!(post.comments, "34");
    assert_eq!(post.media.extension(), Some("png"));

    let decoded = image::load_from_memory(post.media.bytes()).unwrap();
    assert_eq!(decoded.to_rgba8(), original.to_rgba8());

    // the CDN asset was requested without the proxy transforms
    let requests = site.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1], (PICTURE_ASSET.to_string(), RequestRole::Asset));
    assert!(sink.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_watermarked_picture_loses_bottom_band() {
    let original = picture(240, 180);
    let config = Config {
        watermark_hash: region_hash(&original).unwrap(),
        ..Config::for_testing()
    };
    let site = FakeSite::default()
        .page(PICTURE_URL, &picture_page())
        .asset(PICTURE_ASSET, png_bytes(&original));
    let (scraper, _, _, _) = scraper(site, config);

    let post = scraper
        .resolve_post(PICTURE_URL, CropMethod::Auto, ExportFormat::Png)
        .await
        .unwrap()
        .found()
        .unwrap();

    let decoded = image::load_from_memory(post.media.bytes()).unwrap();
    assert_eq!(decoded.height(), 160);
    assert_eq!(decoded.width(), 240);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let (scraper, _, sink, observer) = scraper(FakeSite::default(), Config::for_testing());

    let profile = scraper
        .resolve_profile("https://ifunny.co/user/nobody_here")
        .await
        .unwrap();

    assert!(profile.is_not_found());
    assert!(sink.0.lock().unwrap().is_empty());
    assert!(observer.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_canonical_snapshots_page_once() {
    let body = "<html><head><title>iFunny</title></head><body>nothing here</body></html>";
    let site = FakeSite::default().page(PICTURE_URL, body);
    let (scraper, _, sink, observer) = scraper(site, Config::for_testing());

    let err = scraper
        .resolve_post(PICTURE_URL, CropMethod::Auto, ExportFormat::Png)
        .await
        .unwrap_err();

    assert!(err.is_parsing());
    let snapshots = sink.0.lock().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].body, body);
    assert_eq!(snapshots[0].url, PICTURE_URL);
    assert_eq!(
        observer.0.lock().unwrap().as_slice(),
        &[(PICTURE_URL.to_string(), "parsing")]
    );
}

#[tokio::test]
async fn test_video_passes_through_unchanged() {
    let video = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00isomiso2mp41".to_vec();
    let site = FakeSite::default()
        .page(
            VIDEO_URL,
            &post_page(
                VIDEO_URL,
                &format!(r#"<meta property="og:video:url" content="{VIDEO_ASSET}">"#),
            ),
        )
        .asset(VIDEO_ASSET, video.clone());
    let (scraper, _, _, _) = scraper(site, Config::for_testing());

    let post = scraper
        .resolve_post(VIDEO_URL, CropMethod::Force, ExportFormat::Png)
        .await
        .unwrap()
        .found()
        .unwrap();

    assert_eq!(post.post_type, ResourceKind::Video);
    assert_eq!(post.media.bytes().as_ref(), video.as_slice());
    assert_eq!(post.media.extension(), Some("mp4"));
}

#[tokio::test]
async fn test_meme_link_takes_canonical_kind() {
    let meme_url = "https://ifunny.co/meme/some-meme-abc";
    let original = picture(120, 90);
    let site = FakeSite::default()
        .page(meme_url, &picture_page())
        .asset(PICTURE_ASSET, png_bytes(&original));
    let (scraper, _, _, _) = scraper(site, Config::for_testing());

    let post = scraper
        .resolve_post(meme_url, CropMethod::NoCrop, ExportFormat::Png)
        .await
        .unwrap()
        .found()
        .unwrap();

    assert_eq!(post.post_type, ResourceKind::Picture);
    assert_eq!(post.url, PICTURE_URL);
}

#[tokio::test]
async fn test_asset_404_is_http_fault() {
    let site = FakeSite::default().page(PICTURE_URL, &picture_page());
    let (scraper, _, sink, _) = scraper(site, Config::for_testing());

    let err = scraper
        .resolve_post(PICTURE_URL, CropMethod::Auto, ExportFormat::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::Http { status: 404, .. }));
    assert!(sink.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_redirected_page_is_http_fault() {
    let site = FakeSite::default().status(PICTURE_URL, 302);
    let (scraper, _, _, observer) = scraper(site, Config::for_testing());

    let err = scraper
        .resolve_post(PICTURE_URL, CropMethod::Auto, ExportFormat::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::Http { status: 302, .. }));
    assert_eq!(observer.0.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_message_links_are_isolated() {
    let original = picture(120, 90);
    let site = FakeSite::default()
        .page(PICTURE_URL, &picture_page())
        .asset(PICTURE_ASSET, png_bytes(&original))
        .status(VIDEO_URL, 500);
    let (scraper, _, _, _) = scraper(site, Config::for_testing());

    let text = format!(
        "look {PICTURE_URL} and {VIDEO_URL} and https://ifunny.co/user/ghost"
    );
    let outcomes = scraper
        .resolve_message(&text, CropMethod::Auto, ExportFormat::Png)
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[0].result, Ok(Resolution::Post(_))));
    assert!(matches!(
        outcomes[1].result,
        Err(ScrapeError::Http { status: 500, .. })
    ));
    assert!(matches!(outcomes[2].result, Ok(Resolution::NotFound)));
}

#[tokio::test]
async fn test_connection_fault_is_retryable() {
    let config = Config {
        site_root: "https://unreachable.example".to_string(),
        ..Config::for_testing()
    };
    let (scraper, _, _, observer) = scraper(FakeSite::default(), config);

    let err = scraper.resolve_profile("someone").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(
        observer.0.lock().unwrap().as_slice(),
        &[("someone".to_string(), "connection")]
    );
}

#[tokio::test]
async fn test_profile_fields_and_absent_defaults() {
    let site = FakeSite::default().page("https://ifunny.co/user/someone", &profile_page(false));
    let (scraper, _, _, _) = scraper(site, Config::for_testing());

    let Resolved::Found(profile) = scraper.resolve_profile("@someone").await.unwrap() else {
        panic!("profile should exist");
    };

    assert_eq!(profile.username, "someone");
    assert_eq!(profile.url, "https://ifunny.co/user/someone");
    assert_eq!(profile.subscribers.as_deref(), Some("12"));
    assert_eq!(profile.subscriptions.as_deref(), Some("3"));
    assert_eq!(profile.features, None);
    assert_eq!(profile.description, None);
    assert_eq!(profile.icon_url, None);
}

#[tokio::test]
async fn test_icon_is_reencoded_without_crop() {
    let icon = picture(64, 64);
    let site = FakeSite::default()
        .page("https://ifunny.co/user/someone", &profile_page(true))
        .asset("https://img.ifunny.co/user_photos/ff00_1.jpg", png_bytes(&icon));
    let config = Config {
        export_format: ExportFormat::Bmp,
        ..Config::for_testing()
    };
    let (scraper, _, _, _) = scraper(site, config);

    let asset = scraper
        .resolve_icon("someone")
        .await
        .unwrap()
        .found()
        .flatten()
        .expect("icon should exist");

    assert_eq!(asset.extension(), Some("bmp"));
    let decoded = image::load_from_memory(asset.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 64));
}

#[tokio::test]
async fn test_user_without_icon_has_none() {
    let site = FakeSite::default().page("https://ifunny.co/user/someone", &profile_page(false));
    let (scraper, _, _, _) = scraper(site, Config::for_testing());

    let icon = scraper.resolve_icon("someone").await.unwrap();
    assert!(matches!(icon, Resolved::Found(None)));
}

#[tokio::test]
async fn test_gif_post_is_transcoded_to_looping_animation() {
    let video = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00isomiso2mp41".to_vec();
    let site = FakeSite::default()
        .page(
            GIF_URL,
            &post_page(
                GIF_URL,
                r#"<link rel="preload" as="image" href="https://imageproxy.ifunny.co/crop:x-20,resize:320x/images/c0ffee42_1.jpg">"#,
            ),
        )
        .asset(GIF_ASSET, video);
    let frames = Arc::new(FakeFrames::default());
    let (scraper, site, _, _) = scraper(site, Config::for_testing());
    let scraper = scraper.with_frame_extractor(frames.clone());

    let post = scraper
        .resolve_post(GIF_URL, CropMethod::Auto, ExportFormat::Png)
        .await
        .unwrap()
        .found()
        .expect("gif post should exist");

    assert_eq!(post.post_type, ResourceKind::Gif);
    assert_eq!(post.content_url, GIF_ASSET);
    assert_eq!(
        site.requests.lock().unwrap()[1],
        (GIF_ASSET.to_string(), RequestRole::Asset)
    );
    assert_eq!(frames.requested_fps.lock().unwrap().as_slice(), &[30]);

    let gif = post.media.bytes();
    assert!(gif.starts_with(b"GIF89a"));
    let marker = b"NETSCAPE2.0";
    assert!(gif.windows(marker.len()).any(|w| w == marker));
    assert_eq!(post.media.extension(), Some("gif"));
}

#[tokio::test]
async fn test_foreign_link_is_rejected_before_fetching() {
    let (scraper, site, sink, observer) = scraper(FakeSite::default(), Config::for_testing());

    let err = scraper
        .resolve_post("https://example.com/picture/abc", CropMethod::Auto, ExportFormat::Png)
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidLink { .. }));

    let err = scraper.resolve_profile("not a user!").await.unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidLink { .. }));

    assert!(site.requests.lock().unwrap().is_empty());
    assert!(sink.0.lock().unwrap().is_empty());
    assert_eq!(
        observer.0.lock().unwrap().as_slice(),
        &[
            ("https://example.com/picture/abc".to_string(), "invalid_link"),
            ("not a user!".to_string(), "invalid_link"),
        ]
    );
}
