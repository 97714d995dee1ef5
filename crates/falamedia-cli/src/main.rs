//! FalaMedia CLI — run the media ingestion pipeline from the command line.
//!
//! Reads configuration from the environment (see `Config`); the chosen file
//! plays the role of the picked image. Useful for manual verification
//! against a real bucket and database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use falamedia_cli::init_tracing;
use falamedia_core::{
    CaptureOptions, Config, OwnerKind, OwnerReference, PipelineStage, UploadResult,
};
use falamedia_db::BindingRepository;
use falamedia_pipeline::{
    AlwaysGranted, FileCaptureSource, MediaPipeline, PipelineSettings, ProgressSink,
};
use falamedia_storage::create_storage;
use sqlx::postgres::PgPoolOptions;

#[derive(Parser)]
#[command(name = "falamedia", about = "FalaMedia media pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileKind {
    User,
    Child,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a profile photo and bind it to the profile record
    Avatar {
        /// Whose profile: the caregiver's own or a child's
        #[arg(long, value_enum, default_value = "user")]
        kind: ProfileKind,
        /// Owner key of the profile record
        owner: String,
        /// Path to the image file
        file: PathBuf,
    },
    /// Upload a vocabulary item image and bind it to the item record
    Vocab {
        /// Owner key of the vocabulary item record
        owner: String,
        /// Item name (becomes the stored object's final path segment)
        name: String,
        /// Path to the image file
        file: PathBuf,
    },
    /// Delete an object from the bucket by storage key
    Delete {
        /// Storage key, e.g. profile_photos/child_42_1700000000000.jpg
        key: String,
    },
}

struct StageLogger;

impl ProgressSink for StageLogger {
    fn stage(&self, owner: &OwnerReference, stage: PipelineStage) {
        tracing::info!(owner = %owner, stage = ?stage, "pipeline stage");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    let storage = create_storage(&config)
        .await
        .context("could not initialize storage backend")?;

    if let Commands::Delete { key } = &cli.command {
        storage.delete(key).await?;
        println!("deleted {}", key);
        return Ok(());
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("could not connect to database")?;
    let bindings = Arc::new(BindingRepository::new(pool));

    let (owner, item_name, file) = match cli.command {
        Commands::Avatar { kind, owner, file } => {
            let kind = match kind {
                ProfileKind::User => OwnerKind::UserProfile,
                ProfileKind::Child => OwnerKind::ChildProfile,
            };
            (OwnerReference::new(kind, owner), None, file)
        }
        Commands::Vocab { owner, name, file } => (
            OwnerReference::new(OwnerKind::VocabularyItem, owner),
            Some(name),
            file,
        ),
        Commands::Delete { .. } => unreachable!(),
    };

    let pipeline = Arc::new(
        MediaPipeline::new(
            storage,
            bindings,
            Arc::new(FileCaptureSource::new(file)),
            Arc::new(AlwaysGranted),
            PipelineSettings::from(&config),
        )
        .with_progress(Arc::new(StageLogger)),
    );

    let result = pipeline
        .run(owner, item_name, CaptureOptions::default())
        .await;
    println!(
        "{}",
        serde_json::to_string_pretty(&UploadResult::from_run(&result))?
    );

    result.map(|_| ()).map_err(anyhow::Error::from)
}
