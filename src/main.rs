//! pipestock - scrape a storefront search and persist each product once per sink.

use anyhow::{Context, Result};
use clap::Parser;
use pipestock::config::{Config, OutputFormat};
use pipestock::credentials::Credentials;
use pipestock::report::Formatter;
use pipestock::site::Market;
use pipestock::{PageNavigator, Persister, Pipeline, SinkKind};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pipestock",
    version,
    about = "Idempotent product scraper with local, object store, SQL and image sinks",
    long_about = "Searches a storefront, collects product links across result pages and stores \
                  each product in the enabled sinks. Products already stored in a sink are skipped."
)]
struct Cli {
    /// Store records as JSON under the folder
    #[arg(long)]
    local: bool,

    /// Upload records to the object store
    #[arg(long)]
    s3: bool,

    /// Append records to the relational table
    #[arg(long)]
    rds: bool,

    /// Download product images
    #[arg(long)]
    imgs: bool,

    /// Folder for local records and object key prefix
    #[arg(long)]
    folder: Option<String>,

    /// Search term
    #[arg(short, long)]
    word: Option<String>,

    /// Table name for the relational sink
    #[arg(long)]
    table: Option<String>,

    /// Number of result pages to collect
    #[arg(short, long)]
    pages: Option<u32>,

    /// Only visit the first N product links
    #[arg(long)]
    max_products: Option<usize>,

    /// Storefront market
    #[arg(short, long, env = "PIPESTOCK_MARKET")]
    market: Option<Market>,

    /// Override the storefront base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Show the browser window (browser feature only)
    #[arg(long)]
    headed: bool,

    /// Delay between page interactions in milliseconds
    #[arg(long, env = "PIPESTOCK_DELAY")]
    delay: Option<u64>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to credentials file
    #[arg(long, env = "PIPESTOCK_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Output format for the run summary
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, env = "PIPESTOCK_PROXY")]
    proxy: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Applies CLI overrides on top of the file and environment layers.
    fn apply(self, config: &mut Config) {
        config.local |= self.local;
        config.s3 |= self.s3;
        config.rds |= self.rds;
        config.imgs |= self.imgs;
        config.format = self.format;

        if self.headed {
            config.headless = false;
        }
        if let Some(folder) = self.folder {
            config.folder = folder;
        }
        if let Some(word) = self.word {
            config.word = word;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if let Some(pages) = self.pages {
            config.pages = pages;
        }
        if let Some(max) = self.max_products {
            config.max_products = Some(max);
        }
        if let Some(market) = self.market {
            config.market = market;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = Some(base_url);
        }
        if let Some(delay) = self.delay {
            config.delay_ms = delay;
        }
        if let Some(credentials) = self.credentials {
            config.credentials = credentials;
        }
        if let Some(proxy) = self.proxy {
            config.proxy = Some(proxy);
        }
    }
}

/// Prints which sinks are off and how to turn them on.
fn print_sink_hints(config: &Config) {
    let enabled = config.enabled_sinks();
    for sink in SinkKind::all() {
        if !enabled.contains(sink) {
            eprintln!("The {} sink is disabled, pass {} to enable it", sink, sink.flag());
        }
    }
    if enabled.is_empty() {
        eprintln!("No sinks enabled: products will be scraped but not stored");
    }
}

async fn run<N: PageNavigator>(
    navigator: N,
    config: &Config,
    credentials: &Credentials,
) -> Result<String> {
    let persister =
        Persister::connect(config, credentials).await.context("Failed to set up sinks")?;

    let mut pipeline = Pipeline::new(navigator, persister, config);
    let summary = pipeline.run().await.context("Pipeline run failed")?;

    Ok(Formatter::new(config.format).format_summary(&summary, &config.enabled_sinks()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();
    cli.apply(&mut config);

    let credentials = Credentials::from_file(&config.credentials)?.with_env();
    config.validate(&credentials).context("Invalid configuration")?;

    print_sink_hints(&config);

    #[cfg(feature = "browser")]
    let navigator = pipestock::site::BrowserNavigator::launch(&config)
        .await
        .context("Failed to launch browser")?;

    #[cfg(not(feature = "browser"))]
    let navigator =
        pipestock::HttpNavigator::new(&config).context("Failed to create HTTP client")?;

    let output = run(navigator, &config, &credentials).await?;
    println!("{}", output);

    Ok(())
}
