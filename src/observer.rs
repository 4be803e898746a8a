//! Hooks on the fault path.
//!
//! [`DebugSink`] receives the raw page behind every parsing fault so it can be
//! inspected offline; [`FaultObserver`] sees every fault. Both are handed to
//! the scraper explicitly and neither may block or fail the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::ScrapeError;

/// A page that could not be interpreted, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub reason: String,
    pub body: String,
    pub captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    #[must_use]
    pub fn new(url: &str, reason: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.to_string(),
            body: body.to_string(),
            captured_at: Utc::now(),
        }
    }
}

/// Receives pages that produced a parsing fault. Must return promptly.
pub trait DebugSink: Send + Sync {
    fn capture(&self, snapshot: PageSnapshot);
}

/// Notified of every fault a resolution ends with.
pub trait FaultObserver: Send + Sync {
    fn on_fault(&self, url: &str, error: &ScrapeError);
}

/// Discards snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn capture(&self, snapshot: PageSnapshot) {
        debug!(url = %snapshot.url, "Discarding page snapshot");
    }
}

/// Writes each snapshot as a JSON file in a directory, on a background task.
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    dir: Arc<PathBuf>,
}

impl FileSnapshotSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
        }
    }

    /// Write `snapshot` and return the path of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written.
    pub async fn write(&self, snapshot: &PageSnapshot) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(self.dir.as_path()).await?;
        let path = self.dir.join(snapshot_file_name(snapshot));
        let json = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

impl DebugSink for FileSnapshotSink {
    fn capture(&self, snapshot: PageSnapshot) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(url = %snapshot.url, "No runtime to write page snapshot on");
            return;
        };
        let sink = self.clone();
        runtime.spawn(async move {
            match sink.write(&snapshot).await {
                Ok(path) => debug!(path = %path.display(), "Saved page snapshot"),
                Err(e) => warn!(url = %snapshot.url, "Failed to save page snapshot: {e}"),
            }
        });
    }
}

/// `20240101T120000123Z_ifunny.co_picture_abc.json`
fn snapshot_file_name(snapshot: &PageSnapshot) -> String {
    let stem: String = snapshot
        .url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .take(80)
        .collect();
    format!(
        "{}_{}.json",
        snapshot.captured_at.format("%Y%m%dT%H%M%S%3fZ"),
        stem.trim_end_matches('_')
    )
}

/// Logs faults, keeping parsing and validation faults apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FaultObserver for TracingObserver {
    fn on_fault(&self, url: &str, err: &ScrapeError) {
        match err {
            ScrapeError::Parsing { reason, .. } => {
                warn!(url = %url, kind = err.kind(), reason = %reason, "Page could not be parsed");
            }
            ScrapeError::Validation(message) => {
                error!(url = %url, kind = err.kind(), "Built entity is incomplete: {message}");
            }
            other => {
                warn!(
                    url = %url,
                    kind = other.kind(),
                    retryable = other.is_retryable(),
                    "Resolution failed: {other}"
                );
            }
        }
    }
}
