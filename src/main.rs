use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use funny_embed::config::Config;
use funny_embed::media::{region_hash, CropMethod, ExportFormat};
use funny_embed::payload::{Attachment, PostPayload, ProfileCaption};
use funny_embed::{Resolution, Resolved, Scraper};

#[derive(Debug, Parser)]
#[command(name = "funny-embed", version, about = "Resolve iFunny links into captions and media")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve every post and profile link found in the text.
    Resolve {
        #[arg(required = true)]
        text: Vec<String>,
        /// Watermark crop policy: auto, force or none.
        #[arg(long)]
        crop: Option<CropMethod>,
        /// Export format for pictures.
        #[arg(long)]
        format: Option<ExportFormat>,
        /// Directory attachments are written to.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Show a user's profile.
    Profile { user: String },
    /// Download a user's profile picture.
    Icon {
        username: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print the watermark sample-region hash of a local image.
    WatermarkHash { image: PathBuf },
    /// List export formats and whether each can be encoded.
    Formats,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    if config.uses_placeholder_watermark() {
        warn!("WATERMARK_HASH is not set, automatic watermark cropping is disabled");
    }

    match cli.command {
        Command::Formats => {
            for format in ExportFormat::ALL {
                let state = if format.is_supported() { "yes" } else { "no" };
                println!("{format}\t{state}");
            }
            Ok(())
        }
        Command::WatermarkHash { image } => {
            let decoded = image::open(&image)
                .with_context(|| format!("Failed to read image: {}", image.display()))?;
            let hash = region_hash(&decoded).with_context(|| {
                format!(
                    "{} is smaller than the watermark sample region",
                    image.display()
                )
            })?;
            println!("{hash}");
            Ok(())
        }
        Command::Resolve {
            text,
            crop,
            format,
            out,
        } => {
            let crop = crop.unwrap_or(config.crop_method);
            let format = format.unwrap_or(config.export_format);
            let scraper = Scraper::from_config(config).context("Failed to build scraper")?;
            cancellable(resolve(&scraper, &text.join(" "), crop, format, &out), shutdown_signal()).await
        }
        Command::Profile { user } => {
            let scraper = Scraper::from_config(config).context("Failed to build scraper")?;
            cancellable(profile(&scraper, &user), shutdown_signal()).await
        }
        Command::Icon { username, out } => {
            let scraper = Scraper::from_config(config).context("Failed to build scraper")?;
            cancellable(icon(&scraper, &username, &out), shutdown_signal()).await
        }
    }
}

async fn resolve(
    scraper: &Scraper,
    text: &str,
    crop: CropMethod,
    format: ExportFormat,
    out: &Path,
) -> Result<()> {
    let outcomes = scraper.resolve_message(text, crop, format).await;
    if outcomes.is_empty() {
        warn!("No iFunny links found");
        return Ok(());
    }

    let mut failures = 0usize;
    for outcome in outcomes {
        match outcome.result {
            Ok(Resolution::Post(post)) => {
                let payload = PostPayload::new(&post, format);
                let path = write_attachment(out, &payload.attachment).await?;
                println!("{}\n-> {}\n", payload.caption, path.display());
            }
            Ok(Resolution::Profile(profile)) => {
                println!("{}\n", ProfileCaption::new(&profile));
            }
            Ok(Resolution::NotFound) => {
                println!("{} does not exist\n", outcome.link.url);
            }
            Err(e) => {
                failures += 1;
                println!("{} failed: {e}\n", outcome.link.url);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} link(s) could not be resolved");
    }
    Ok(())
}

async fn profile(scraper: &Scraper, user: &str) -> Result<()> {
    match scraper.resolve_profile(user).await? {
        Resolved::Found(profile) => println!("{}", ProfileCaption::new(&profile)),
        Resolved::NotFound => println!("Could not find user '{user}'"),
    }
    Ok(())
}

async fn icon(scraper: &Scraper, username: &str, out: &Path) -> Result<()> {
    match scraper.resolve_icon(username).await? {
        Resolved::Found(Some(icon)) => {
            let attachment = Attachment::for_icon(username, &icon, scraper.config().export_format);
            let path = write_attachment(out, &attachment).await?;
            println!("{}", path.display());
        }
        Resolved::Found(None) => println!("{username} has no profile picture"),
        Resolved::NotFound => println!("Could not find user '{username}'"),
    }
    Ok(())
}

async fn write_attachment(dir: &Path, attachment: &Attachment) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = dir.join(&attachment.file_name);
    tokio::fs::write(&path, &attachment.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), len = attachment.bytes.len(), "Wrote attachment");
    Ok(path)
}

/// Run `work` until it finishes or `shutdown` resolves; in-flight requests
/// are dropped on shutdown.
async fn cancellable(
    work: impl Future<Output = Result<()>>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::select! {
        result = work => result,
        () = shutdown => {
            info!("Shutting down, abandoning in-flight work");
            Ok(())
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,funny_embed=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // stdout carries captions, logs go to stderr
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
