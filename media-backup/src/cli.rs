//! CLI glue for media-backup: argument parsing, wiring and user-visible output.
//!
//! The upload protocol lives in [`media_backup_core`]; this module only builds a transport
//! from config, attaches a credential, progress logging and Ctrl-C cancellation, and maps
//! the outcome to an exit status. Call [`run`] with a constructed [`Cli`] for programmatic use.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use media_backup_core::backup::backup_files;
use media_backup_core::config::UploadConfig;
use media_backup_core::contract::{Privacy, VideoMetadata};
use media_backup_core::progress::TracingProgress;
use media_backup_core::publish::publish_video;
use media_backup_core::retry::RetryPolicy;
use media_backup_core::transport::{MediaApiTransport, ObjectStorageTransport};
use media_backup_core::uploader::ChunkUploader;
use tokio_util::sync::CancellationToken;

use crate::load_config::{load_config, load_credential};

/// Back up media files to object storage, or publish a video, with resumable uploads.
#[derive(Parser)]
#[clap(
    name = "media-backup",
    version,
    about = "Back up media files to cloud object storage and publish videos using resumable chunked uploads"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload files to the configured bucket, one resumable session per file
    Backup {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Bucket name; overrides `object_storage.bucket` from the config
        #[clap(long)]
        bucket: Option<String>,
        /// Files to upload
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload a video through the media API and print its watch URL
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        description: String,
        /// Repeatable
        #[clap(long = "tag")]
        tags: Vec<String>,
        /// private, unlisted or public; defaults to `media.privacy` from the config
        #[clap(long)]
        privacy: Option<Privacy>,
        file: PathBuf,
    },
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Backup {
            config,
            bucket,
            files,
        } => {
            let config = load_config(config)?;
            run_backup(&config, bucket, &files).await
        }
        Commands::Publish {
            config,
            title,
            description,
            tags,
            privacy,
            file,
        } => {
            let config = load_config(config)?;
            let metadata = VideoMetadata {
                title,
                description,
                tags,
                privacy: privacy.unwrap_or(config.media.privacy),
                category_id: config.media.category_id.clone(),
            };
            run_publish(&config, metadata, file).await
        }
    }
}

async fn run_backup(config: &UploadConfig, bucket: Option<String>, files: &[PathBuf]) -> Result<()> {
    let Some(bucket) = bucket.or_else(|| config.object_storage.bucket.clone()) else {
        bail!("no bucket given: pass --bucket or set object_storage.bucket in the config");
    };
    tracing::info!(command = "backup", bucket = %bucket, files = files.len(), "Starting backup");

    let mut credential = load_credential()?;
    let transport = ObjectStorageTransport::new(&config.object_storage, config.request_timeout())?;
    let progress = TracingProgress::new("backup");
    let uploader = ChunkUploader::new(&transport, RetryPolicy::new(config.retry.clone()))
        .with_cancellation(cancel_on_ctrl_c())
        .with_progress(&progress);

    let report = backup_files(
        &uploader,
        &bucket,
        &config.object_storage.prefix,
        files,
        credential.as_mut(),
    )
    .await;

    for file in &report.uploaded {
        println!("uploaded {} -> {} ({} bytes)", file.path.display(), file.object_url, file.bytes);
    }
    for failure in &report.failed {
        println!("failed   {}: {}", failure.path.display(), failure.cause);
    }
    println!(
        "{}/{} files backed up{}",
        report.success_count(),
        files.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );

    if !report.is_complete_success() {
        tracing::error!(command = "backup", failed = report.failed.len(), cancelled = report.cancelled, "Backup incomplete");
        bail!("backup incomplete: {} of {} files failed", files.len() - report.success_count(), files.len());
    }
    tracing::info!(command = "backup", "Backup complete");
    Ok(())
}

async fn run_publish(config: &UploadConfig, metadata: VideoMetadata, file: PathBuf) -> Result<()> {
    tracing::info!(command = "publish", file = %file.display(), "Starting publish");

    let mut credential = load_credential()?;
    let transport = MediaApiTransport::new(&config.media, config.request_timeout())?;
    let progress = TracingProgress::new("publish");
    let uploader = ChunkUploader::new(&transport, RetryPolicy::new(config.retry.clone()))
        .with_cancellation(cancel_on_ctrl_c())
        .with_progress(&progress);

    let published = publish_video(&uploader, &file, metadata, credential.as_mut()).await?;
    println!("{}", published.url);
    tracing::info!(command = "publish", video_id = %published.video_id, "Publish complete");
    Ok(())
}

/// Token cancelled on the first Ctrl-C. The in-flight request finishes, nothing new starts.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, cancelling upload");
            child.cancel();
        }
    });
    token
}
