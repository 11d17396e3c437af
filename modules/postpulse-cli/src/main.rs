use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use postpulse_collector::{
    AnalysisStore, BlueskyCollector, CollectQuery, Orchestrator, TwitterCollector,
};
use postpulse_common::{normalize_handle, Config, Provider};

#[derive(Parser)]
#[command(name = "postpulse", about = "Collect normalized posts from Twitter/X and Bluesky")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keyword search on one provider. Posts are printed as JSON lines.
    Search {
        /// twitter (x) or bluesky (bsky)
        provider: Provider,
        query: String,
        #[arg(long, short, default_value_t = 25)]
        limit: usize,
    },
    /// Recent posts of one account. Accepts @name, a bare handle, or a profile URL.
    User {
        provider: Provider,
        handle: String,
        #[arg(long, short, default_value_t = 25)]
        limit: usize,
    },
    /// Display name and avatar of a Bluesky account, as JSON.
    Profile { handle: String },
    /// Stored analyses, most recent first. Entries are written by library
    /// callers of `AnalysisStore::save` sharing `POSTPULSE_STORE_DIR`.
    History {
        /// Show (or with --delete, remove) the entry for this handle
        handle: Option<String>,
        #[arg(long, requires = "handle")]
        delete: bool,
        #[arg(long, conflicts_with_all = ["handle", "delete"])]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries the JSON lines, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("postpulse=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    config.log_redacted();

    match cli.command {
        Command::Search {
            provider,
            query,
            limit,
        } => collect(&config, provider, CollectQuery::Search(query), limit).await,
        Command::User {
            provider,
            handle,
            limit,
        } => {
            let handle = normalize_handle(&handle);
            collect(&config, provider, CollectQuery::User(handle), limit).await
        }
        Command::Profile { handle } => profile(&config, &handle).await,
        Command::History {
            handle,
            delete,
            clear,
        } => history(&config, handle, delete, clear).await,
    }
}

/// Only the requested provider is set up, so a user of one provider never
/// needs credentials for the other.
async fn orchestrator_for(config: &Config, provider: Provider) -> Result<Orchestrator> {
    let builder = Orchestrator::builder();
    let builder = match provider {
        Provider::Twitter => {
            let collector = TwitterCollector::new(config.twitter.as_ref(), config)
                .context("Twitter collection is unavailable")?;
            builder.with(Arc::new(collector))
        }
        Provider::Bluesky => {
            let collector = BlueskyCollector::connect(config.bluesky.as_ref(), config)
                .await
                .context("Bluesky collection is unavailable")?;
            builder.with(Arc::new(collector))
        }
    };
    Ok(builder.build())
}

async fn collect(config: &Config, provider: Provider, query: CollectQuery, limit: usize) -> Result<()> {
    let orchestrator = orchestrator_for(config, provider).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current page");
            on_signal.cancel();
        }
    });

    let mut stream = orchestrator.collect(provider, query, limit, Some(cancel))?;
    let stats = stream.stats();

    let mut failure = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(post) => println!("{}", serde_json::to_string(&post)?),
            Err(e) => failure = Some(e),
        }
    }

    eprintln!(
        "{} posts emitted, {} items skipped, {} pages fetched",
        stats.emitted(),
        stats.skipped(),
        stats.pages()
    );

    if let Some(e) = failure {
        bail!("{} ({e})", e.public_message());
    }
    Ok(())
}

async fn profile(config: &Config, handle: &str) -> Result<()> {
    let collector = BlueskyCollector::connect(config.bluesky.as_ref(), config)
        .await
        .context("Bluesky collection is unavailable")?;
    let profile = collector
        .profile(&normalize_handle(handle))
        .await
        .map_err(|e| anyhow::anyhow!("{} ({e})", e.public_message()))?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

async fn history(config: &Config, handle: Option<String>, delete: bool, clear: bool) -> Result<()> {
    let store = AnalysisStore::new(&config.store_dir);

    if clear {
        store.clear().await?;
        info!("History cleared");
        return Ok(());
    }

    match handle.map(|h| normalize_handle(&h)) {
        Some(handle) if delete => {
            if !store.delete(&handle).await? {
                bail!("No stored analysis for '{handle}'");
            }
        }
        Some(handle) => match store.get(&handle).await {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => bail!("No stored analysis for '{handle}'"),
        },
        None => {
            for entry in store.list().await {
                println!(
                    "{}\t{}\t{} posts\t{}",
                    entry.analyzed_at.to_rfc3339(),
                    entry.handle,
                    entry.totals.analyzed,
                    entry.summary
                );
            }
        }
    }
    Ok(())
}
