use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use feedcull::config::Config;
use feedcull::domain::Rating;
use feedcull::miniflux::MinifluxClient;
use feedcull::scheduler::Scheduler;
use feedcull::storage::{Database, DatabaseError};
use feedcull::triage::TriageEngine;

/// Get the config directory path (~/.config/feedcull/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedcull"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedcull",
    about = "Marks uninteresting Miniflux entries read and keeps a small sample for review"
)]
struct Args {
    /// Path to the config file (default: ~/.config/feedcull/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the triage loop until interrupted
    Serve,
    /// Store a rating for an entry and mark it read
    Rate {
        entry_id: i64,
        /// not_opened, only_comments, not_finished or finished
        rating: Rating,
    },
    /// Print the category x rating matrix
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    // Summary only reads the rating store
    let config = match args.command {
        Command::Summary => Config::load_offline(&config_path),
        _ => Config::load(&config_path),
    }
    .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db = open_database(&config.database_path(&config_dir)).await?;

    let result = match args.command {
        Command::Serve => serve(&config, &db).await,
        Command::Rate { entry_id, rating } => rate(&config, &db, entry_id, rating).await,
        Command::Summary => {
            print!("{}", feedcull::summary::render(&db.summary().await));
            Ok(())
        }
    };

    db.close().await;
    result
}

/// Open the rating store. Schema reconciliation happens here, before any
/// other store access.
async fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(e @ DatabaseError::Migration(_)) => {
            tracing::error!(error = %e, "Schema history does not match this build");
            Err(anyhow::Error::new(e).context("Refusing to start"))
        }
        Err(e) => Err(anyhow::Error::new(e).context("Failed to open database")),
    }
}

fn miniflux_client(config: &Config) -> Result<MinifluxClient> {
    MinifluxClient::new(&config.miniflux.hostname, config.api_key())
        .context("Failed to create Miniflux client")
}

/// Mirror Miniflux categories and feeds so ratings can reference them.
async fn sync_catalog(client: &MinifluxClient, db: &Database) -> Result<()> {
    let categories = client
        .categories()
        .await
        .context("Failed to fetch Miniflux categories")?;
    db.upsert_categories(&categories)
        .await
        .context("Failed to store categories")?;

    let feeds = client
        .feeds()
        .await
        .context("Failed to fetch Miniflux feeds")?;
    db.upsert_feeds(&feeds)
        .await
        .context("Failed to store feeds")?;

    tracing::info!(
        categories = categories.len(),
        feeds = feeds.len(),
        "Mirrored Miniflux catalog"
    );
    Ok(())
}

async fn serve(config: &Config, db: &Database) -> Result<()> {
    let client = Arc::new(miniflux_client(config)?);
    sync_catalog(&client, db).await?;

    let policies = config.policies()?;
    if policies.is_empty() {
        tracing::warn!("No categories configured, every cycle will be empty");
    }

    let engine = TriageEngine::new(client, policies);
    let mut scheduler = Scheduler::new(engine, config.interval());

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone())?;

    tracing::info!("Starting service");
    scheduler.run(&cancel).await;
    tracing::info!("Service exited");
    Ok(())
}

/// Cancel `cancel` on SIGINT or SIGTERM.
fn spawn_signal_listener(cancel: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down gracefully"),
            }
            cancel.cancel();
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, shutting down gracefully");
        }
        cancel.cancel();
    });

    Ok(())
}

async fn rate(config: &Config, db: &Database, entry_id: i64, rating: Rating) -> Result<()> {
    let client = miniflux_client(config)?;

    let entry = client
        .entry(entry_id)
        .await
        .with_context(|| format!("Failed to fetch entry {entry_id}"))?;

    // The entry's feed may be newer than the last mirror
    sync_catalog(&client, db).await?;

    db.store_rating(&entry, rating)
        .await
        .with_context(|| format!("Failed to store rating for entry {entry_id}"))?;
    client
        .update_entries(&[entry_id], "read")
        .await
        .with_context(|| format!("Rating stored, but marking entry {entry_id} read failed"))?;

    println!("Rated \"{}\" as {}", entry.title, rating);
    Ok(())
}
