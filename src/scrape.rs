//! Scrape orchestration.
//!
//! One run walks `check fresh -> fetch -> transform -> persist -> derive`.
//! Any failure along the way, including the overall deadline expiring,
//! falls back to the snapshot already on disk. Only a failure with no
//! snapshot to fall back to is reported as an error.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::freshness::is_fresh;
use crate::profile::{Profile, RawProfile};
use crate::provider::{ProfileProvider, Section};
use crate::shields::write_badges;
use chrono::Local;
use tracing::{error, info, warn};

/// How a successful run obtained its profile
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Fetched from the provider and written out
    Fetched(Profile),
    /// Cached snapshot was fresh; nothing fetched
    Skipped(Profile),
    /// Fetch failed; the cached snapshot stands in
    Fallback(Profile),
}

impl Outcome {
    pub fn profile(&self) -> &Profile {
        match self {
            Outcome::Fetched(p) | Outcome::Skipped(p) | Outcome::Fallback(p) => p,
        }
    }

    pub fn into_profile(self) -> Profile {
        match self {
            Outcome::Fetched(p) | Outcome::Skipped(p) | Outcome::Fallback(p) => p,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Fetched(_) => "fetched",
            Outcome::Skipped(_) => "skipped",
            Outcome::Fallback(_) => "fallback",
        }
    }
}

/// Drives one scrape of a single profile
pub struct Scraper<P> {
    config: Config,
    provider: P,
    store: CacheStore,
}

impl<P: ProfileProvider> Scraper<P> {
    pub fn new(config: Config, provider: P) -> Self {
        let store = CacheStore::new(config.output_dir.clone());
        Self {
            config,
            provider,
            store,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Run the scrape under the configured deadline, falling back to the
    /// cached snapshot on any failure.
    pub async fn run(&self) -> Result<Outcome> {
        info!(
            scholar_id = %self.config.scholar_id,
            automated = self.config.automated,
            deadline_secs = self.config.deadline.as_secs(),
            "Starting scrape"
        );

        let attempt = tokio::time::timeout(self.config.deadline, self.scrape())
            .await
            .unwrap_or(Err(ScraperError::Timeout(self.config.deadline)));

        match attempt {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(error = %e, "Scraping failed, attempting to use existing data");
                match self.store.load() {
                    Some(profile) => {
                        info!(updated = ?profile.updated, "Loaded fallback data");
                        Ok(Outcome::Fallback(profile))
                    }
                    None => {
                        error!("Fallback data not available");
                        Err(ScraperError::NoFallback { source: Box::new(e) })
                    }
                }
            }
        }
    }

    async fn scrape(&self) -> Result<Outcome> {
        // Interactive runs always fetch
        if self.config.automated {
            let now = Local::now().naive_local();
            let threshold = self.config.freshness_threshold;
            if let Some(profile) = self.store.load().filter(|p| is_fresh(Some(p), now, threshold)) {
                info!(updated = ?profile.updated, "Skipping scrape, existing data is fresh");
                return Ok(Outcome::Skipped(profile));
            }
        }

        let raw = self.fetch().await?;
        let profile = Profile::from_raw(raw, Local::now().naive_local());

        self.store.save(&profile)?;
        write_badges(self.store.dir(), &profile)?;

        info!(
            citedby = ?profile.details.citedby,
            publications = profile.publications.len(),
            "Scraping completed"
        );
        Ok(Outcome::Fetched(profile))
    }

    async fn fetch(&self) -> Result<RawProfile> {
        info!(scholar_id = %self.config.scholar_id, "Searching for author by id");
        let author = self.provider.search_author_id(&self.config.scholar_id).await?;

        info!("Filling author details");
        self.config
            .retry
            .run("fill author", |_| self.provider.fill(&author, &Section::ALL))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AuthorDetails, Publication, TIMESTAMP_FORMAT};
    use crate::provider::AuthorHandle;
    use crate::shields::{Badge, PROFILE_BADGE_FILE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::Instant;

    /// Provider whose behaviour is fixed up front
    #[derive(Default)]
    struct ScriptedProvider {
        raw: RawProfile,
        search_fails: bool,
        fill_failures: u32,
        hang: bool,
        searches: AtomicU32,
        fills: AtomicU32,
    }

    impl ScriptedProvider {
        fn returning(raw: RawProfile) -> Self {
            Self {
                raw,
                ..Default::default()
            }
        }

        fn calls(&self) -> (u32, u32) {
            (self.searches.load(Ordering::SeqCst), self.fills.load(Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl ProfileProvider for ScriptedProvider {
        async fn search_author_id(&self, scholar_id: &str) -> Result<AuthorHandle> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if self.search_fails {
                return Err(ScraperError::AuthorNotFound(scholar_id.to_string()));
            }
            Ok(AuthorHandle {
                scholar_id: scholar_id.to_string(),
                name: None,
            })
        }

        async fn fill(&self, _author: &AuthorHandle, sections: &[Section]) -> Result<RawProfile> {
            let attempt = self.fills.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(sections, &Section::ALL);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if attempt <= self.fill_failures {
                return Err(ScraperError::RateLimited(60));
            }
            Ok(self.raw.clone())
        }
    }

    fn scenario_raw() -> RawProfile {
        RawProfile {
            details: AuthorDetails {
                scholar_id: "ABC123".to_string(),
                citedby: Some(42),
                ..Default::default()
            },
            publications: vec![Publication {
                author_pub_id: "p1".to_string(),
                num_citations: Some(5),
                ..Default::default()
            }],
        }
    }

    fn config(dir: &TempDir, automated: bool) -> Config {
        let mut config = Config::new("ABC123");
        config.output_dir = dir.path().to_path_buf();
        config.automated = automated;
        config
    }

    fn cached_profile(citedby: u64, age: chrono::Duration) -> Profile {
        let updated = Local::now().naive_local() - age;
        Profile {
            details: AuthorDetails {
                scholar_id: "ABC123".to_string(),
                citedby: Some(citedby),
                ..Default::default()
            },
            updated: Some(updated.format(TIMESTAMP_FORMAT).to_string()),
            ..Default::default()
        }
    }

    fn read_badge(dir: &TempDir, file: &str) -> Badge {
        let content = std::fs::read_to_string(dir.path().join(file)).expect("badge file");
        serde_json::from_str(&content).expect("badge json")
    }

    #[tokio::test]
    async fn test_fresh_fetch_writes_outputs() {
        let dir = TempDir::new().expect("temp dir");
        let provider = Arc::new(ScriptedProvider::returning(scenario_raw()));
        let scraper = Scraper::new(config(&dir, false), provider.clone());

        let before = Local::now().naive_local() - chrono::Duration::seconds(1);
        let outcome = scraper.run().await.expect("run succeeds");
        assert_eq!(outcome.kind(), "fetched");
        assert_eq!(provider.calls(), (1, 1));

        let saved = scraper.store().load().expect("saved profile");
        assert_eq!(&saved, outcome.profile());
        assert!(saved.last_updated().expect("stamped") >= before);
        assert_eq!(saved.publications.len(), 1);
        assert_eq!(saved.publications["p1"].num_citations, Some(5));

        assert_eq!(read_badge(&dir, PROFILE_BADGE_FILE).message, "42");
        assert_eq!(read_badge(&dir, "p1_shieldsio.json").message, "5");
    }

    #[tokio::test]
    async fn test_automated_run_skips_fresh_cache() {
        let dir = TempDir::new().expect("temp dir");
        let cached = cached_profile(10, chrono::Duration::days(2));
        let store = CacheStore::new(dir.path());
        store.save(&cached).expect("seed cache");
        let before = std::fs::read(store.profile_path()).expect("read");

        let provider = Arc::new(ScriptedProvider::returning(scenario_raw()));
        let scraper = Scraper::new(config(&dir, true), provider.clone());
        let outcome = scraper.run().await.expect("run succeeds");

        assert_eq!(outcome, Outcome::Skipped(cached));
        assert_eq!(provider.calls(), (0, 0));
        assert_eq!(std::fs::read(store.profile_path()).expect("read"), before);
    }

    #[tokio::test]
    async fn test_automated_run_refetches_stale_cache() {
        let dir = TempDir::new().expect("temp dir");
        CacheStore::new(dir.path())
            .save(&cached_profile(10, chrono::Duration::days(8)))
            .expect("seed cache");

        let provider = Arc::new(ScriptedProvider::returning(scenario_raw()));
        let scraper = Scraper::new(config(&dir, true), provider.clone());
        let outcome = scraper.run().await.expect("run succeeds");

        assert_eq!(outcome.kind(), "fetched");
        assert_eq!(outcome.profile().details.citedby, Some(42));
        assert_eq!(provider.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_automated_run_refetches_malformed_timestamp() {
        let dir = TempDir::new().expect("temp dir");
        let mut cached = cached_profile(10, chrono::Duration::zero());
        cached.updated = Some("2024/01/01".to_string());
        CacheStore::new(dir.path()).save(&cached).expect("seed cache");

        let provider = Arc::new(ScriptedProvider::returning(scenario_raw()));
        let scraper = Scraper::new(config(&dir, true), provider.clone());
        assert_eq!(scraper.run().await.expect("run").kind(), "fetched");
    }

    #[tokio::test]
    async fn test_interactive_run_ignores_freshness() {
        let dir = TempDir::new().expect("temp dir");
        CacheStore::new(dir.path())
            .save(&cached_profile(10, chrono::Duration::hours(1)))
            .expect("seed cache");

        let provider = Arc::new(ScriptedProvider::returning(scenario_raw()));
        let scraper = Scraper::new(config(&dir, false), provider.clone());
        assert_eq!(scraper.run().await.expect("run").kind(), "fetched");
        assert_eq!(provider.calls(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_fill_then_succeeds() {
        let dir = TempDir::new().expect("temp dir");
        let provider = Arc::new(ScriptedProvider {
            fill_failures: 2,
            ..ScriptedProvider::returning(scenario_raw())
        });
        let scraper = Scraper::new(config(&dir, false), provider.clone());

        let started = Instant::now();
        let outcome = scraper.run().await.expect("run succeeds");
        assert_eq!(outcome.kind(), "fetched");
        assert_eq!(provider.calls(), (1, 3));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fall_back_to_cache() {
        let dir = TempDir::new().expect("temp dir");
        let cached = cached_profile(10, chrono::Duration::days(30));
        CacheStore::new(dir.path()).save(&cached).expect("seed cache");

        let provider = Arc::new(ScriptedProvider {
            fill_failures: u32::MAX,
            ..ScriptedProvider::returning(scenario_raw())
        });
        let scraper = Scraper::new(config(&dir, true), provider.clone());

        let outcome = scraper.run().await.expect("fallback is a success");
        assert_eq!(outcome, Outcome::Fallback(cached.clone()));
        assert_eq!(provider.calls(), (1, 3));
        assert_eq!(scraper.store().load(), Some(cached));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_without_cache_fail() {
        let dir = TempDir::new().expect("temp dir");
        let provider = Arc::new(ScriptedProvider {
            fill_failures: u32::MAX,
            ..ScriptedProvider::returning(scenario_raw())
        });
        let scraper = Scraper::new(config(&dir, false), provider);

        let err = scraper.run().await.expect_err("no fallback available");
        match err {
            ScraperError::NoFallback { source } => {
                assert!(matches!(*source, ScraperError::RateLimited(_)))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dir.path().join("gs_data.json").exists());
    }

    #[tokio::test]
    async fn test_search_failure_is_not_retried() {
        let dir = TempDir::new().expect("temp dir");
        let cached = cached_profile(10, chrono::Duration::days(30));
        CacheStore::new(dir.path()).save(&cached).expect("seed cache");

        let provider = Arc::new(ScriptedProvider {
            search_fails: true,
            ..ScriptedProvider::returning(scenario_raw())
        });
        let scraper = Scraper::new(config(&dir, false), provider.clone());

        assert_eq!(scraper.run().await.expect("fallback"), Outcome::Fallback(cached));
        assert_eq!(provider.calls(), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_falls_back_to_cache() {
        let dir = TempDir::new().expect("temp dir");
        let cached = cached_profile(10, chrono::Duration::days(30));
        CacheStore::new(dir.path()).save(&cached).expect("seed cache");

        let provider = Arc::new(ScriptedProvider {
            hang: true,
            ..ScriptedProvider::returning(scenario_raw())
        });
        let mut config = config(&dir, false);
        config.deadline = Duration::from_secs(60);
        let scraper = Scraper::new(config, provider);

        let started = Instant::now();
        let outcome = scraper.run().await.expect("fallback");
        assert_eq!(outcome, Outcome::Fallback(cached));
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_without_cache_fails() {
        let dir = TempDir::new().expect("temp dir");
        let provider = ScriptedProvider {
            hang: true,
            ..ScriptedProvider::returning(scenario_raw())
        };
        let mut config = config(&dir, false);
        config.deadline = Duration::from_secs(5);

        let err = Scraper::new(config, provider).run().await.expect_err("timeout");
        assert!(matches!(
            err,
            ScraperError::NoFallback { source } if matches!(*source, ScraperError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_failure_without_cache_fails() {
        let dir = TempDir::new().expect("temp dir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "occupied").expect("write blocker");

        let mut config = config(&dir, false);
        config.output_dir = blocker;
        let scraper = Scraper::new(config, ScriptedProvider::returning(scenario_raw()));

        let err = scraper.run().await.expect_err("persist fails");
        assert!(matches!(
            err,
            ScraperError::NoFallback { source } if matches!(*source, ScraperError::Io(_))
        ));
    }
}
