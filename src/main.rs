//! gscholar-shields - Google Scholar citation snapshot and badge generator
//!
//! Fetches a citation profile, writes it to `<output>/gs_data.json` and
//! derives shields.io endpoint badges next to it.
//!
//! ## Usage
//!
//! ```bash
//! GOOGLE_SCHOLAR_ID=ABC123xyzAAAJ gscholar-shields --output results
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use gscholar_shields::config::{self, Config};
use gscholar_shields::gscholar::{ProviderOptions, ScholarProvider, DEFAULT_SCHOLAR_URL};
use gscholar_shields::provider::ProxyStatus;
use gscholar_shields::retry::RetryPolicy;
use gscholar_shields::scrape::{Outcome, Scraper};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar citation snapshot and shields.io badge generator
#[derive(Parser)]
#[command(name = "gscholar-shields")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Google Scholar user id of the profile
    #[arg(long, env = config::SCHOLAR_ID_ENV)]
    scholar_id: Option<String>,

    /// Unattended run: use a proxy and skip fresh snapshots
    /// (also enabled by GITHUB_ACTIONS=true)
    #[arg(long)]
    automated: bool,

    /// Output directory
    #[arg(short, long, default_value = config::DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Proxy URL candidates (e.g., http://127.0.0.1:7890)
    #[arg(long = "proxy", env = "SCHOLAR_PROXY", value_delimiter = ',')]
    proxies: Vec<String>,

    /// Mirror site URL
    #[arg(long, default_value = DEFAULT_SCHOLAR_URL)]
    mirror: String,

    /// Snapshot age in days below which automated runs skip fetching
    #[arg(long, default_value = "7")]
    fresh_days: u32,

    /// Overall deadline in seconds
    #[arg(long, default_value = "3600")]
    timeout_secs: u64,

    /// Attempts at filling author details
    #[arg(long, default_value = "3")]
    max_attempts: u32,

    /// Backoff unit in seconds between attempts
    #[arg(long, default_value = "10")]
    retry_delay_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let scholar_id = config::require_scholar_id(self.scholar_id)?;

        let config = Config {
            output_dir: self.output,
            automated: self.automated || config::automated_from_env(),
            freshness_threshold: chrono::Duration::days(i64::from(self.fresh_days)),
            deadline: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_secs(self.retry_delay_secs),
            },
            provider: ProviderOptions {
                base_url: self.mirror,
                proxies: self
                    .proxies
                    .into_iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
                ..Default::default()
            },
            ..Config::new(scholar_id)
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_json);

    match run(cli).await {
        Ok(outcome) => {
            info!(
                outcome = outcome.kind(),
                citedby = ?outcome.profile().details.citedby,
                "Process finished successfully"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Process failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool, json: bool) {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    let config = cli.into_config().context("Invalid configuration")?;

    // Proxies are only wanted for unattended runs or when given explicitly
    let use_proxy = config.automated || !config.provider.proxies.is_empty();
    let (provider, proxy) = ScholarProvider::configure(config.provider.clone(), use_proxy)
        .await
        .context("Failed to set up provider")?;
    match &proxy {
        ProxyStatus::Direct => info!("Running without proxy"),
        ProxyStatus::Proxied(url) => info!(proxy = %url, "Running through proxy"),
        ProxyStatus::Unavailable => warn!("Failed to configure a proxy, scraping may fail"),
    }

    let scraper = Scraper::new(config, provider);
    let outcome = scraper.run().await.context("Scraping failed after all fallbacks")?;
    Ok(outcome)
}
