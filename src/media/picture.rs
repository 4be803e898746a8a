use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CropMethod, ExportFormat};
use crate::constants::{WATERMARK_BAND_HEIGHT, WATERMARK_SAMPLE_HEIGHT, WATERMARK_SAMPLE_WIDTH};
use crate::error::{Result, ScrapeError};

/// Recognizes the site's watermark by hashing the bottom-right sample region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkDetector {
    reference: String,
}

impl WatermarkDetector {
    /// `reference` is the hex SHA-256 of the watermark sample region.
    #[must_use]
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.trim().to_lowercase(),
        }
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    #[must_use]
    pub fn is_watermarked(&self, image: &DynamicImage) -> bool {
        region_hash(image).is_some_and(|hash| hash == self.reference)
    }
}

/// Hex SHA-256 over the RGBA8 pixels of the bottom-right sample region, or
/// `None` when the image is smaller than the region.
#[must_use]
pub fn region_hash(image: &DynamicImage) -> Option<String> {
    let (width, height) = (image.width(), image.height());
    if width < WATERMARK_SAMPLE_WIDTH || height < WATERMARK_SAMPLE_HEIGHT {
        return None;
    }
    let region = image
        .crop_imm(
            width - WATERMARK_SAMPLE_WIDTH,
            height - WATERMARK_SAMPLE_HEIGHT,
            WATERMARK_SAMPLE_WIDTH,
            WATERMARK_SAMPLE_HEIGHT,
        )
        .to_rgba8();
    Some(hex::encode(Sha256::digest(region.as_raw())))
}

/// The crop decision, given the sample hash (if the image was large enough to
/// sample) and the reference hash.
#[must_use]
pub fn should_crop(method: CropMethod, region_hash: Option<&str>, reference: &str) -> bool {
    match method {
        CropMethod::Auto => region_hash == Some(reference),
        CropMethod::Force => true,
        CropMethod::NoCrop => false,
    }
}

fn crop_band(image: &DynamicImage) -> Result<DynamicImage> {
    let (width, height) = (image.width(), image.height());
    if height <= WATERMARK_BAND_HEIGHT {
        return Err(ScrapeError::Media(format!(
            "image is {width}x{height}, too small to remove a {WATERMARK_BAND_HEIGHT}px band"
        )));
    }
    Ok(image.crop_imm(0, 0, width, height - WATERMARK_BAND_HEIGHT))
}

/// Encode `image` as `format`.
///
/// # Errors
///
/// Returns an error if the format has no encoder or encoding fails.
pub fn encode(image: &DynamicImage, format: ExportFormat) -> Result<Vec<u8>> {
    if !format.is_supported() {
        return Err(ScrapeError::UnsupportedFormat(format));
    }

    let mut cursor = Cursor::new(Vec::new());
    let written = match format {
        // no alpha channel in JPEG
        ExportFormat::Jpeg => {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut cursor, ImageFormat::Jpeg)
        }
        ExportFormat::Png => image.write_to(&mut cursor, ImageFormat::Png),
        other => DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut cursor, other.image_format()),
    };
    written.map_err(|e| ScrapeError::Media(format!("failed to encode {format}: {e}")))?;

    Ok(cursor.into_inner())
}

/// Decode a picture, remove the watermark band when `method` says so and
/// re-encode it as `format`.
///
/// # Errors
///
/// Returns an error if the bytes are not a decodable image, the band cannot be
/// removed, or encoding fails.
pub fn crop_convert(
    bytes: &[u8],
    method: CropMethod,
    format: ExportFormat,
    detector: &WatermarkDetector,
) -> Result<Vec<u8>> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ScrapeError::Media(format!("failed to decode image: {e}")))?;

    let sample = match method {
        CropMethod::Auto => region_hash(&image),
        CropMethod::Force | CropMethod::NoCrop => None,
    };
    let crop = should_crop(method, sample.as_deref(), detector.reference());
    debug!(
        %method,
        width = image.width(),
        height = image.height(),
        crop,
        "Crop decision"
    );

    if crop {
        encode(&crop_band(&image)?, format)
    } else {
        encode(&image, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        }))
    }

    fn png(image: &DynamicImage) -> Vec<u8> {
        encode(image, ExportFormat::Png).unwrap()
    }

    fn decoded_height(bytes: &[u8]) -> u32 {
        image::load_from_memory(bytes).unwrap().height()
    }

    const OTHER: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    #[test]
    fn test_should_crop_decision_table() {
        assert!(should_crop(CropMethod::Auto, Some("abc"), "abc"));
        assert!(!should_crop(CropMethod::Auto, Some("abd"), "abc"));
        assert!(!should_crop(CropMethod::Auto, None, "abc"));
        assert!(should_crop(CropMethod::Force, Some("abd"), "abc"));
        assert!(should_crop(CropMethod::Force, None, "abc"));
        assert!(!should_crop(CropMethod::NoCrop, Some("abc"), "abc"));
    }

    #[test]
    fn test_region_hash_requires_full_sample() {
        assert!(region_hash(&gradient(99, 40)).is_none());
        assert!(region_hash(&gradient(120, 19)).is_none());
        assert_eq!(region_hash(&gradient(100, 20)).map(|h| h.len()), Some(64));
    }

    #[test]
    fn test_region_hash_ignores_pixels_outside_sample() {
        let mut a = gradient(300, 200).to_rgba8();
        let b = a.clone();
        a.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        assert_eq!(
            region_hash(&DynamicImage::ImageRgba8(a)),
            region_hash(&DynamicImage::ImageRgba8(b))
        );
    }

    #[test]
    fn test_auto_crops_when_sample_matches_reference() {
        let image = gradient(240, 160);
        let detector = WatermarkDetector::new(&region_hash(&image).unwrap());
        assert!(detector.is_watermarked(&image));

        let out = crop_convert(&png(&image), CropMethod::Auto, ExportFormat::Png, &detector).unwrap();
        assert_eq!(decoded_height(&out), 140);
    }

    #[test]
    fn test_auto_keeps_unmatched_picture() {
        let image = gradient(240, 160);
        let detector = WatermarkDetector::new(OTHER);

        let out = crop_convert(&png(&image), CropMethod::Auto, ExportFormat::Png, &detector).unwrap();
        assert_eq!(decoded_height(&out), 160);
    }

    #[test]
    fn test_auto_on_small_picture_never_crops() {
        let image = gradient(50, 50);
        let detector = WatermarkDetector::new(OTHER);

        let out = crop_convert(&png(&image), CropMethod::Auto, ExportFormat::Png, &detector).unwrap();
        assert_eq!(decoded_height(&out), 50);
    }

    #[test]
    fn test_force_crops_regardless_of_hash() {
        let image = gradient(120, 64);
        let detector = WatermarkDetector::new(OTHER);

        let out = crop_convert(&png(&image), CropMethod::Force, ExportFormat::Png, &detector).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 44));
    }

    #[test]
    fn test_force_on_tiny_picture_fails() {
        let image = gradient(40, 20);
        let detector = WatermarkDetector::new(OTHER);

        let result = crop_convert(&png(&image), CropMethod::Force, ExportFormat::Png, &detector);
        assert!(matches!(result, Err(ScrapeError::Media(_))));
    }

    #[test]
    fn test_no_crop_reencode_is_length_stable() {
        let input = png(&gradient(180, 90));
        let detector = WatermarkDetector::new(OTHER);

        let first = crop_convert(&input, CropMethod::NoCrop, ExportFormat::Png, &detector).unwrap();
        let second = crop_convert(&input, CropMethod::NoCrop, ExportFormat::Png, &detector).unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_supported_format_round_trips() {
        let image = gradient(64, 48);
        for format in ExportFormat::supported() {
            let bytes = encode(&image, format).unwrap();
            let decoded = image::load_from_memory(&bytes)
                .unwrap_or_else(|e| panic!("{format} did not decode: {e}"));
            assert_eq!((decoded.width(), decoded.height()), (64, 48), "{format}");
        }
    }

    #[test]
    fn test_jpeg_export_is_sniffed_as_jpeg() {
        let bytes = encode(&gradient(32, 32), ExportFormat::Jpeg).unwrap();
        let sig = crate::sniff::sniff(&bytes).map(|s| s.extension);
        assert_eq!(sig, Some("jpg"));
    }

    #[test]
    fn test_garbage_is_a_media_fault() {
        let detector = WatermarkDetector::new(OTHER);
        let result = crop_convert(b"not an image", CropMethod::NoCrop, ExportFormat::Png, &detector);
        assert!(matches!(result, Err(ScrapeError::Media(_))));
    }
}
