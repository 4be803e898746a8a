use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    BROWSER_USER_AGENT, DEFAULT_CDN_HOST, DEFAULT_GIF_FPS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SITE_ROOT, DEFAULT_WATERMARK_HASH,
};
use crate::media::{CropMethod, ExportFormat};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Site
    pub site_root: String,
    pub cdn_host: String,

    // HTTP
    pub request_timeout: Duration,
    pub user_agent: String,

    // Media
    pub export_format: ExportFormat,
    pub crop_method: CropMethod,
    pub watermark_hash: String,
    pub ffmpeg_path: PathBuf,
    pub gif_fps: u32,

    // Diagnostics
    pub snapshot_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Site
            site_root: env_or_default("SITE_ROOT", DEFAULT_SITE_ROOT)
                .trim_end_matches('/')
                .to_string(),
            cdn_host: env_or_default("CDN_HOST", DEFAULT_CDN_HOST),

            // HTTP
            request_timeout: Duration::from_secs(parse_env_u64(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            user_agent: env_or_default("USER_AGENT", BROWSER_USER_AGENT),

            // Media
            export_format: parse_export_format(&env_or_default("EXPORT_FORMAT", "png"))?,
            crop_method: parse_crop_method(&env_or_default("CROP_METHOD", "auto"))?,
            watermark_hash: env_or_default("WATERMARK_HASH", DEFAULT_WATERMARK_HASH).to_lowercase(),
            ffmpeg_path: PathBuf::from(env_or_default("FFMPEG_PATH", "ffmpeg")),
            gif_fps: parse_env_u32("GIF_FPS", DEFAULT_GIF_FPS)?,

            // Diagnostics
            snapshot_dir: optional_env("SNAPSHOT_DIR").map(PathBuf::from),
        })
    }

    /// Configuration with defaults and no environment lookups.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            site_root: DEFAULT_SITE_ROOT.to_string(),
            cdn_host: DEFAULT_CDN_HOST.to_string(),
            request_timeout: Duration::from_secs(5),
            user_agent: BROWSER_USER_AGENT.to_string(),
            export_format: ExportFormat::Png,
            crop_method: CropMethod::Auto,
            watermark_hash: DEFAULT_WATERMARK_HASH.to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            gif_fps: DEFAULT_GIF_FPS,
            snapshot_dir: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.gif_fps == 0 || self.gif_fps > 100 {
            return Err(ConfigError::InvalidValue {
                name: "GIF_FPS".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }
        if !self.export_format.is_supported() {
            return Err(ConfigError::InvalidValue {
                name: "EXPORT_FORMAT".to_string(),
                message: format!("{} has no encoder available", self.export_format),
            });
        }
        if self.watermark_hash.len() != 64 || hex::decode(&self.watermark_hash).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "WATERMARK_HASH".to_string(),
                message: "must be a 64 character hex SHA-256 digest".to_string(),
            });
        }
        if !self.site_root.starts_with("https://") && !self.site_root.starts_with("http://") {
            return Err(ConfigError::InvalidValue {
                name: "SITE_ROOT".to_string(),
                message: "must be an absolute http(s) URL".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the watermark reference is still the built-in placeholder, in
    /// which case `Auto` never crops.
    #[must_use]
    pub fn uses_placeholder_watermark(&self) -> bool {
        self.watermark_hash.eq_ignore_ascii_case(DEFAULT_WATERMARK_HASH)
    }
}
fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_export_format(value: &str) -> Result<ExportFormat, ConfigError> {
    value.parse().map_err(|message| ConfigError::InvalidValue {
        name: "EXPORT_FORMAT".to_string(),
        message,
    })
}

fn parse_crop_method(value: &str) -> Result<CropMethod, ConfigError> {
    value.parse().map_err(|message| ConfigError::InvalidValue {
        name: "CROP_METHOD".to_string(),
        message,
    })
}
