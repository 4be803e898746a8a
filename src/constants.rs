//! Shared constants used across the application.

/// User agent string sent with page requests.
///
/// The site serves a stripped-down page to unknown clients, so this mirrors a
/// regular desktop browser.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Accept header sent with page requests.
pub const PAGE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Accept-Language header sent with page requests.
pub const PAGE_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Canonical root of the site.
pub const DEFAULT_SITE_ROOT: &str = "https://ifunny.co";

/// Host serving untransformed media assets.
pub const DEFAULT_CDN_HOST: &str = "img.ifunny.co";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Frame rate of animations re-encoded from video.
pub const DEFAULT_GIF_FPS: u32 = 30;

/// Upper bound on a single ffmpeg frame extraction.
pub const TRANSCODE_TIMEOUT_SECS: u64 = 120;

/// Height of the branding band at the bottom of served pictures.
pub const WATERMARK_BAND_HEIGHT: u32 = 20;

/// Width of the bottom-right region sampled for watermark detection.
pub const WATERMARK_SAMPLE_WIDTH: u32 = 100;

/// Height of the bottom-right region sampled for watermark detection.
pub const WATERMARK_SAMPLE_HEIGHT: u32 = 20;

/// Placeholder for the SHA-256 of the RGBA8 pixels of the watermark sample
/// region. It matches no real picture, so `Auto` never crops until
/// `WATERMARK_HASH` is set.
///
/// Generate the real value with `funny-embed watermark-hash <sample.png>`
/// against a known watermarked picture.
pub const DEFAULT_WATERMARK_HASH: &str =
    "7b1f0c6e2d9a4e8f3c5b6a7d8e9f0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b";

/// Avatar shown for users that never set a profile picture.
pub const DEFAULT_AVATAR_URL: &str =
    "https://play-lh.googleusercontent.com/Wr4GnjKU360bQEFoVimXfi-OlA6To9DkdrQBQ37CMdx1Kx5gRE07MgTDh1o7lAPV1ws";

/// Placeholder shown when a profile has no description.
pub const NO_DESCRIPTION: &str = "No description.";

/// Placeholder shown when a profile has no subscriber count.
pub const NO_SUBSCRIBERS: &str = "No subscribers.";

/// Placeholder shown when a profile has no subscription count.
pub const NO_SUBSCRIPTIONS: &str = "No subscriptions.";

/// Placeholder shown when a profile has no feature count.
pub const NO_FEATURES: &str = "No features.";
