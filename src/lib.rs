//! # gscholar-shields
//!
//! Google Scholar citation profile snapshots and shields.io badges.
//!
//! ## Modules
//!
//! - [`scrape`] - Run orchestration with retry, deadline and cache fallback
//! - [`gscholar`] - Google Scholar profile provider over HTTP
//! - [`provider`] - Provider trait the orchestrator depends on
//! - [`cache`] - Profile snapshot persistence
//! - [`shields`] - Badge derivation
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gscholar_shields::{config::Config, gscholar, scrape::Scraper};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("ABC123xyzAAAJ");
//!     let provider = gscholar::ScholarProvider::direct(config.provider.clone())?;
//!     let outcome = Scraper::new(config, provider).run().await?;
//!     println!("{} citations", outcome.profile().details.citedby.unwrap_or(0));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;
pub mod gscholar;
pub mod profile;
pub mod provider;
pub mod retry;
pub mod scrape;
pub mod shields;

pub use error::{Result, ScraperError};
