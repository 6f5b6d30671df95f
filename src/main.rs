//! web2feed main entry point
//!
//! This is the command-line interface for the web2feed extraction service.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use web2feed::config::{load_app_config, load_feed, load_feed_dir, AppConfig, FeedRegistry};
use web2feed::crawler::{Crawler, FetchSettings, HttpFetcher};
use web2feed::feed::render_rss;
use web2feed::logging::{setup_logging, LogBroadcast};
use web2feed::service::Service;
use web2feed::storage::{open_repository, Repository};

/// web2feed: turn HTML listing pages into feeds
///
/// Each feed file describes where the listing pages are, how to pick items
/// out of them and how to render each item.
#[derive(Parser, Debug)]
#[command(name = "web2feed")]
#[command(version)]
#[command(about = "Rule-driven HTML to feed extraction", long_about = None)]
struct Cli {
    /// Path to the base TOML configuration
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a feed file once without storing anything and print its RSS
    Test {
        /// Feed file to run
        feed: PathBuf,

        /// Write the RSS document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run every feed of the config directory on its schedule
    Start,

    /// Run one feed of the config directory once and store its records
    Update {
        /// Feed name
        feed: String,
    },

    /// Print stored records of a feed as RSS
    List {
        /// Feed name
        feed: String,

        /// Only records whose title or body contains this text
        #[arg(short, long, default_value = "")]
        search: String,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Records per page; defaults to the feed's item_count
        #[arg(long)]
        size: Option<usize>,
    },

    /// Load and validate every feed file of the config directory
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let app = load_app_config(cli.config.as_deref()).context("loading base configuration")?;
    setup_logging(cli.verbose, cli.quiet, app.log_level.as_deref(), LogBroadcast::new());

    match cli.command {
        Command::Test { feed, output } => handle_test(&app, &feed, output.as_deref()).await,
        Command::Start => handle_start(&app).await,
        Command::Update { feed } => handle_update(&app, &feed).await,
        Command::List {
            feed,
            search,
            page,
            size,
        } => handle_list(&app, &feed, &search, page, size),
        Command::Check => handle_check(&app),
    }
}

fn build_crawler(app: &AppConfig) -> anyhow::Result<Crawler> {
    let fetcher = HttpFetcher::new(&FetchSettings {
        proxy: app.http_proxy.clone(),
    })?;
    Ok(Crawler::new(Arc::new(fetcher)))
}

fn open_store(app: &AppConfig) -> anyhow::Result<Arc<dyn Repository>> {
    let path = Path::new(&app.database_path);
    open_repository(path, Duration::from_secs(app.existence_ttl))
        .with_context(|| format!("opening database {}", path.display()))
}

fn load_registry(app: &AppConfig) -> anyhow::Result<Arc<FeedRegistry>> {
    let dir = Path::new(&app.config_dir);
    let registry = FeedRegistry::load_dir(dir)
        .with_context(|| format!("reading feed directory {}", dir.display()))?;
    Ok(Arc::new(registry))
}

/// Handles `test`: one run, no existence checks, RSS out
async fn handle_test(app: &AppConfig, path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let feed = load_feed(path).with_context(|| format!("loading {}", path.display()))?;
    let crawler = build_crawler(app)?;

    let records = crawler.run(&feed).await?;
    tracing::info!("[{}] extracted {} records", feed.name, records.len());

    let xml = render_rss(&feed.desc, &records)?;
    match output {
        Some(out) => {
            std::fs::write(out, xml).with_context(|| format!("writing {}", out.display()))?;
            println!("✓ Wrote {} records to {}", records.len(), out.display());
        }
        None => print!("{}", xml),
    }
    Ok(())
}

/// Handles `start`: the service loop until Ctrl-C
async fn handle_start(app: &AppConfig) -> anyhow::Result<()> {
    let registry = load_registry(app)?;
    if registry.is_empty() {
        bail!("no feeds found in {}", app.config_dir);
    }

    let service = Arc::new(Service::new(
        registry,
        open_store(app)?,
        build_crawler(app)?,
        Duration::from_secs(app.period),
    ));

    let runner = tokio::spawn(Arc::clone(&service).run());
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    runner.abort();
    Ok(())
}

/// Handles `update`: one run of a registered feed, records stored
async fn handle_update(app: &AppConfig, name: &str) -> anyhow::Result<()> {
    let service = Service::new(
        load_registry(app)?,
        open_store(app)?,
        build_crawler(app)?,
        Duration::from_secs(app.period),
    );
    let saved = service.run_feed(name).await?;
    println!("✓ {}: {} new records", name, saved);
    Ok(())
}

/// Handles `list`: stored records as RSS
fn handle_list(
    app: &AppConfig,
    name: &str,
    search: &str,
    page: usize,
    size: Option<usize>,
) -> anyhow::Result<()> {
    let registry = load_registry(app)?;
    let feed = registry
        .get(name)
        .with_context(|| format!("unknown feed '{}'", name))?;

    let repository = open_store(app)?;
    let size = size.unwrap_or(feed.item_count);
    let records = repository.find_page(name, search, size, page)?;
    print!("{}", render_rss(&feed.desc, &records)?);
    Ok(())
}

/// Handles `check`: report every feed file
fn handle_check(app: &AppConfig) -> anyhow::Result<()> {
    let dir = Path::new(&app.config_dir);
    let loaded = load_feed_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

    let mut failed = 0;
    for (path, result) in &loaded {
        match result {
            Ok(feed) => println!(
                "✓ {} ({}): {} listing URLs{}",
                feed.name,
                path.display(),
                feed.rule.listing_urls.len(),
                if feed.disabled { ", disabled" } else { "" }
            ),
            Err(e) => {
                failed += 1;
                println!("✗ {}: {}", path.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} feed files are invalid", failed, loaded.len());
    }
    println!("\n✓ {} feed files are valid", loaded.len());
    Ok(())
}
