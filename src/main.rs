//! CLI entry point for the acquirer tool.

use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use acquirer_core::worker::{self, WorkInput};
use acquirer_core::{
    AcquisitionPipeline, AssetStore, Catalog, CoverExtractor, Database, HttpClient, Publication,
    RemoteFetcher,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

mod cli;
mod config;

use cli::{Args, Command};
use config::Settings;

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = match config::load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(error) => {
            error!("{error:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    if loaded.loaded_from_file
        && let Some(path) = &loaded.path
    {
        debug!(path = %path.display(), "configuration loaded");
    }
    let settings = Settings::resolve(args.library_dir, loaded.config.as_ref());

    // Dropping the command future on Ctrl-C runs the pending-file guards.
    tokio::select! {
        outcome = execute(args.command, &settings) => match outcome {
            Ok(code) => code,
            Err(error) => {
                error!("{error:#}");
                ExitCode::from(EXIT_FAILURE)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn execute(command: Command, settings: &Settings) -> Result<ExitCode> {
    let input = match command {
        Command::List => return list(settings).await,
        Command::Import { source, source_url } => WorkInput {
            publication_download_uri: Some(source),
            source_url,
            ..WorkInput::default()
        },
        Command::Fetch { publication } => {
            let Some(publication) = read_json::<Publication>(&publication)? else {
                return Ok(ExitCode::from(EXIT_USAGE));
            };
            WorkInput {
                publication: Some(publication),
                ..WorkInput::default()
            }
        }
        Command::Run { input } => {
            let Some(input) = read_json::<WorkInput>(&input)? else {
                return Ok(ExitCode::from(EXIT_USAGE));
            };
            input
        }
    };

    let pipeline = open_pipeline(settings).await?;
    let outcome = worker::run(&pipeline, input).await;
    println!("{}", serde_json::to_string(&outcome.result)?);

    // The process is about to exit; give the thumbnail a chance to land.
    if let Some(cover_task) = outcome.cover_task
        && let Err(error) = cover_task.await
    {
        warn!(error = %error, "cover task did not complete");
    }

    Ok(if outcome.result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

async fn list(settings: &Settings) -> Result<ExitCode> {
    let catalog = open_catalog(settings).await?;
    let books = catalog.list_books().await.context("Failed to list books")?;
    for book in &books {
        println!("{}", serde_json::to_string(book)?);
    }
    info!(count = books.len(), "catalog listed");
    Ok(ExitCode::SUCCESS)
}

async fn open_catalog(settings: &Settings) -> Result<Catalog> {
    if let Some(parent) = settings.database_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    let db = Database::with_options(&settings.database_path, settings.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open catalog database '{}'",
                settings.database_path.display()
            )
        })?;
    Ok(Catalog::new(db))
}

async fn open_pipeline(settings: &Settings) -> Result<AcquisitionPipeline> {
    let store = AssetStore::new(&settings.library_dir, &settings.scratch_dir);
    store
        .prepare()
        .await
        .context("Failed to create library directories")?;
    let catalog = open_catalog(settings).await?;
    let http = HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs)
        .context("Failed to build HTTP client")?;
    let fetcher: Arc<dyn RemoteFetcher> = Arc::new(http.clone());

    Ok(
        AcquisitionPipeline::builder(store, Arc::new(catalog), fetcher)
            .cover_extractor(CoverExtractor::new(http))
            .insert_failure_policy(settings.insert_failure_policy)
            .build(),
    )
}

/// Reads JSON from `path`, or stdin for `-`. Malformed JSON is logged and
/// yields `None`.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            error!(source = %path.display(), error = %error, "invalid JSON input");
            Ok(None)
        }
    }
}
