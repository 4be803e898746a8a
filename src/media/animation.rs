use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::constants::TRANSCODE_TIMEOUT_SECS;
use crate::error::{Result, ScrapeError};

/// Splits a video into still frames sampled at a fixed rate.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract_frames(&self, video: &[u8], fps: u32) -> Result<Vec<RgbaImage>>;
}

/// Extracts frames by running an ffmpeg binary in a scratch directory.
#[derive(Debug, Clone)]
pub struct FfmpegFrames {
    ffmpeg_path: PathBuf,
}

impl FfmpegFrames {
    #[must_use]
    pub fn new(ffmpeg_path: impl AsRef<Path>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.as_ref().to_path_buf(),
        }
    }

    async fn split_frames(&self, input: &Path, out_dir: &Path, fps: u32) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-vf")
            .arg(format!("fps={fps}"))
            .arg("-f")
            .arg("image2")
            .arg(out_dir.join("frame_%05d.png"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(
            Duration::from_secs(TRANSCODE_TIMEOUT_SECS),
            cmd.output(),
        )
        .await
        .map_err(|_| ScrapeError::Media("ffmpeg timed out".to_string()))?
        .map_err(|e| {
            ScrapeError::Media(format!(
                "failed to run {}: {e}",
                self.ffmpeg_path.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "ffmpeg failed");
            return Err(ScrapeError::Media(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrames {
    #[instrument(skip(self, video), fields(len = video.len()))]
    async fn extract_frames(&self, video: &[u8], fps: u32) -> Result<Vec<RgbaImage>> {
        let workdir = tempfile::tempdir().map_err(|e| {
            ScrapeError::Media(format!("failed to create transcode directory: {e}"))
        })?;
        let input = workdir.path().join("input.mp4");
        tokio::fs::write(&input, video)
            .await
            .map_err(|e| ScrapeError::Media(format!("failed to stage video: {e}")))?;

        self.split_frames(&input, workdir.path(), fps).await?;

        let frames = tokio::task::spawn_blocking(move || {
            let frames = load_frames(workdir.path());
            // the directory must outlive the reads
            drop(workdir);
            frames
        })
        .await
        .map_err(ScrapeError::media)??;
        debug!(frames = frames.len(), "Loaded video frames");
        Ok(frames)
    }
}

/// Turns mp4 bytes into a looping GIF: frames come from a [`FrameExtractor`]
/// and are encoded with the image codec.
#[derive(Clone)]
pub struct GifTranscoder {
    frames: Arc<dyn FrameExtractor>,
    fps: u32,
}

impl GifTranscoder {
    #[must_use]
    pub fn new(frames: Arc<dyn FrameExtractor>, fps: u32) -> Self {
        Self {
            frames,
            fps: fps.max(1),
        }
    }

    /// A transcoder backed by the ffmpeg binary at `ffmpeg_path`.
    #[must_use]
    pub fn ffmpeg(ffmpeg_path: impl AsRef<Path>, fps: u32) -> Self {
        Self::new(Arc::new(FfmpegFrames::new(ffmpeg_path)), fps)
    }

    /// Re-encode a video as an infinitely looping animation.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Media`] if frame extraction fails, yields no
    /// frames, or the frames cannot be encoded.
    #[instrument(skip(self, video), fields(len = video.len(), fps = self.fps))]
    pub async fn transcode(&self, video: &[u8]) -> Result<Vec<u8>> {
        let frames = self.frames.extract_frames(video, self.fps).await?;
        let fps = self.fps;
        tokio::task::spawn_blocking(move || encode_animation(frames, fps))
            .await
            .map_err(ScrapeError::media)?
    }
}

impl std::fmt::Debug for GifTranscoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifTranscoder")
            .field("fps", &self.fps)
            .finish_non_exhaustive()
    }
}

fn load_frames(dir: &Path) -> Result<Vec<RgbaImage>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ScrapeError::Media(format!("failed to list frames: {e}")))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("frame_") && name.ends_with(".png"))
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            image::open(path)
                .map(|frame| frame.to_rgba8())
                .map_err(|e| ScrapeError::Media(format!("failed to read {}: {e}", path.display())))
        })
        .collect()
}

/// Encode `frames` as a GIF that loops forever at `fps`.
///
/// # Errors
///
/// Returns [`ScrapeError::Media`] when there are no frames or encoding fails.
pub fn encode_animation(frames: Vec<RgbaImage>, fps: u32) -> Result<Vec<u8>> {
    if frames.is_empty() {
        return Err(ScrapeError::Media("video produced no frames".to_string()));
    }

    let delay = Delay::from_numer_denom_ms(1000, fps.max(1));
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ScrapeError::Media(format!("failed to set loop count: {e}")))?;
        encoder
            .encode_frames(frames.into_iter().map(|frame| Frame::from_parts(frame, 0, 0, delay)))
            .map_err(|e| ScrapeError::Media(format!("failed to encode animation: {e}")))?;
    }
    Ok(out)
}
