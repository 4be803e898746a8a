//! iFunny link resolver library.
//!
//! Turns shared post and profile links into structured posts and profiles,
//! with the post media downloaded, de-watermarked and re-encoded, plus the
//! chat-ready captions and attachments built from them.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod constants;
pub mod entities;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod links;
pub mod media;
pub mod observer;
pub mod payload;
pub mod pipeline;
pub mod sniff;

pub use config::Config;
pub use entities::{Post, Profile};
pub use error::{Resolved, ScrapeError};
pub use pipeline::{LinkOutcome, Resolution, Scraper};
