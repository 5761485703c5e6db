//! Newsfeed - Search news with cached, rate-limited pagination
//!
//! A command-line front end over the feed library: it builds the `App` from
//! CLI arguments and drives a pagination context or the asset cache.

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use newsfeed::app::App;
use newsfeed::assets::AssetPhase;
use newsfeed::cli::{Cli, Command, StartupConfig};
use newsfeed::pagination::{LoadOutcome, PaginationController, PaginationState};

/// Sends logs to stderr so stdout only carries results
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsfeed=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints every article accumulated so far
fn print_state(state: &PaginationState) {
    for (i, article) in state.items.iter().enumerate() {
        let source = article.source_name.as_deref().unwrap_or("unknown source");
        println!("{:>4}. {} ({})", i + 1, article.title, source);
        println!("      {}", article.url);
    }
    println!(
        "{} of {} results for \"{}\" (page {}), more available: {}",
        state.items.len(),
        state.total_available,
        state.query,
        state.current_page,
        if state.has_more { "yes" } else { "no" }
    );
}

/// Loads up to `pages` pages into `paginator`
async fn load_pages(
    paginator: &PaginationController,
    query: &str,
    pages: u32,
    force_refresh: bool,
) -> Result<(), Box<dyn Error>> {
    let first = if force_refresh {
        paginator.force_refresh(query).await
    } else {
        paginator.load_first(query).await
    };
    if let LoadOutcome::Failed(err) = first {
        return Err(err.into());
    }

    for _ in 1..pages {
        match paginator.load_next().await {
            LoadOutcome::Loaded => {}
            LoadOutcome::Skipped => break,
            LoadOutcome::Failed(err) => {
                // Keep what we have; the caller decides whether to retry
                eprintln!("warning: stopped early: {}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let startup = StartupConfig::from_cli(&cli)?;
    let app = App::build(&startup.feed, startup.sources)?;

    match cli.command {
        Command::Search {
            query,
            pages,
            force_refresh,
            thumbnails,
        } => {
            let paginator = app.paginator();
            load_pages(&paginator, &query, pages, force_refresh).await?;
            let state = paginator.snapshot().await;
            print_state(&state);

            if thumbnails {
                let loads = state
                    .items
                    .iter()
                    .filter_map(|a| a.image_url.as_deref())
                    .map(|url| app.assets().load(url));
                let results = futures::future::join_all(loads).await;
                let loaded = results.iter().filter(|r| r.is_ok()).count();
                println!("thumbnails: {} loaded, {} failed", loaded, results.len() - loaded);
            }
        }
        Command::Asset { url } => {
            let mut view = app.asset_view();
            view.show(&url);
            view.settle().await?;
            match view.phase() {
                AssetPhase::Ready(asset) => {
                    println!("{} {} bytes {}", asset.format, asset.bytes.len(), asset.url)
                }
                AssetPhase::Failed { error, .. } => return Err(error.into()),
                AssetPhase::Empty | AssetPhase::Loading { .. } => {
                    return Err("asset load did not complete".into())
                }
            }
        }
        Command::ClearCache => {
            app.clear_cache().await;
            println!("cache cleared");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
