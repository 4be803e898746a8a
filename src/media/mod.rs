//! Post-processing of downloaded media.
//!
//! Pictures are optionally cropped and re-encoded to the configured export
//! format, Gif posts (served as mp4) are re-encoded into looping animations and
//! videos pass through untouched. Every step yields a new [`MediaAsset`]; the
//! previous buffer is dropped.

mod animation;
mod picture;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};

pub use animation::{encode_animation, FfmpegFrames, FrameExtractor, GifTranscoder};
pub use picture::{crop_convert, encode, region_hash, should_crop, WatermarkDetector};
use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::links::ResourceKind;
use crate::sniff::{sniff, Signature};

/// Downloaded bytes together with where they came from and what they look like.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    bytes: Bytes,
    origin_url: String,
    signature: Option<&'static Signature>,
}

impl MediaAsset {
    /// Wrap freshly downloaded bytes, sniffing their signature.
    pub fn new(bytes: impl Into<Bytes>, origin_url: impl Into<String>) -> Self {
        let bytes = bytes.into();
        let signature = sniff(&bytes);
        Self {
            bytes,
            origin_url: origin_url.into(),
            signature,
        }
    }

    /// A new asset from the same origin holding `bytes`.
    #[must_use]
    pub fn replaced(&self, bytes: impl Into<Bytes>) -> Self {
        Self::new(bytes, self.origin_url.clone())
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    #[must_use]
    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }

    #[must_use]
    pub fn signature(&self) -> Option<&'static Signature> {
        self.signature
    }

    /// Extension of the sniffed signature, when one was found and has one.
    #[must_use]
    pub fn extension(&self) -> Option<&'static str> {
        self.signature
            .map(|sig| sig.extension)
            .filter(|ext| !ext.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Image formats pictures can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpeg,
    Bmp,
    Gif,
    Tiff,
    Webp,
}

impl ExportFormat {
    pub const ALL: [Self; 6] = [
        Self::Png,
        Self::Jpeg,
        Self::Bmp,
        Self::Gif,
        Self::Tiff,
        Self::Webp,
    ];

    #[must_use]
    pub const fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Bmp => image::ImageFormat::Bmp,
            Self::Gif => image::ImageFormat::Gif,
            Self::Tiff => image::ImageFormat::Tiff,
            Self::Webp => image::ImageFormat::WebP,
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Webp => "webp",
        }
    }

    /// Whether the image codec was built with an encoder for this format.
    #[must_use]
    pub fn is_supported(self) -> bool {
        self.image_format().writing_enabled()
    }

    /// Formats that can currently be encoded.
    #[must_use]
    pub fn supported() -> Vec<Self> {
        Self::ALL.into_iter().filter(|f| f.is_supported()).collect()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Bmp => "bmp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Webp => "webp",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "bmp" => Ok(Self::Bmp),
            "gif" => Ok(Self::Gif),
            "tiff" | "tif" => Ok(Self::Tiff),
            "webp" => Ok(Self::Webp),
            other => Err(format!(
                "must be one of png, jpeg, bmp, gif, tiff, webp, got '{other}'"
            )),
        }
    }
}

/// Whether to remove the watermark band from a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CropMethod {
    /// Crop only when the bottom-right sample matches the reference watermark.
    Auto,
    /// Always crop.
    Force,
    /// Never crop; used for profile pictures.
    NoCrop,
}

impl fmt::Display for CropMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Force => "force",
            Self::NoCrop => "none",
        })
    }
}

impl FromStr for CropMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "force" => Ok(Self::Force),
            "none" | "nocrop" | "no-crop" | "off" => Ok(Self::NoCrop),
            other => Err(format!("must be 'auto', 'force' or 'none', got '{other}'")),
        }
    }
}

/// Applies the per-kind media transformation.
#[derive(Debug, Clone)]
pub struct MediaProcessor {
    detector: WatermarkDetector,
    transcoder: GifTranscoder,
}

impl MediaProcessor {
    #[must_use]
    pub fn new(detector: WatermarkDetector, transcoder: GifTranscoder) -> Self {
        Self {
            detector,
            transcoder,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            WatermarkDetector::new(&config.watermark_hash),
            GifTranscoder::ffmpeg(&config.ffmpeg_path, config.gif_fps),
        )
    }

    /// Take gif frames from `frames` instead of the current extractor.
    #[must_use]
    pub fn with_frame_extractor(mut self, frames: Arc<dyn FrameExtractor>, fps: u32) -> Self {
        self.transcoder = GifTranscoder::new(frames, fps);
        self
    }

    /// Transform `asset` according to the concrete `kind` of the post it
    /// belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::UnsupportedFormat`] when a picture must be
    /// encoded to a format without an encoder, and [`ScrapeError::Media`] when
    /// decoding, cropping, encoding or transcoding fails or `kind` is not a
    /// concrete media kind.
    pub async fn process(
        &self,
        asset: MediaAsset,
        kind: ResourceKind,
        crop: CropMethod,
        format: ExportFormat,
    ) -> Result<MediaAsset> {
        match kind {
            ResourceKind::Picture => {
                if !format.is_supported() {
                    return Err(ScrapeError::UnsupportedFormat(format));
                }
                let detector = self.detector.clone();
                let input = asset.bytes().clone();
                let output = tokio::task::spawn_blocking(move || {
                    crop_convert(&input, crop, format, &detector)
                })
                .await
                .map_err(ScrapeError::media)??;
                debug!(
                    origin = %asset.origin_url(),
                    before = asset.len(),
                    after = output.len(),
                    %format,
                    "Re-encoded picture"
                );
                Ok(asset.replaced(output))
            }
            ResourceKind::Gif => {
                let output = self.transcoder.transcode(asset.bytes()).await?;
                info!(
                    origin = %asset.origin_url(),
                    before = asset.len(),
                    after = output.len(),
                    "Re-encoded video as animation"
                );
                Ok(asset.replaced(output))
            }
            ResourceKind::Video => Ok(asset),
            ResourceKind::Meme | ResourceKind::User => Err(ScrapeError::Media(format!(
                "no media transformation for {kind} assets"
            ))),
        }
    }
}
