//! Run configuration.
//!
//! Everything the orchestrator needs is collected into a [`Config`] once at
//! startup. Nothing below this layer reads the environment.

use crate::error::{Result, ScraperError};
use crate::freshness::DEFAULT_THRESHOLD_DAYS;
use crate::gscholar::ProviderOptions;
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that supplies the profile id
pub const SCHOLAR_ID_ENV: &str = "GOOGLE_SCHOLAR_ID";

/// Environment variable that marks an unattended run
pub const AUTOMATED_ENV: &str = "GITHUB_ACTIONS";

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "results";

/// Default overall deadline for one scrape
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3600);

/// Settings for one scrape run
#[derive(Debug, Clone)]
pub struct Config {
    /// Google Scholar user id of the profile
    pub scholar_id: String,
    /// Directory for the profile snapshot and badges
    pub output_dir: PathBuf,
    /// Unattended run: use a proxy and skip fresh snapshots
    pub automated: bool,
    /// Maximum snapshot age that still counts as fresh
    pub freshness_threshold: chrono::Duration,
    /// Bound on the whole fetch..derive sequence
    pub deadline: Duration,
    /// Retry settings for filling author details
    pub retry: RetryPolicy,
    pub provider: ProviderOptions,
}

impl Config {
    /// Configuration with defaults for everything but the id
    pub fn new(scholar_id: impl Into<String>) -> Self {
        Self {
            scholar_id: scholar_id.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            automated: false,
            freshness_threshold: chrono::Duration::days(DEFAULT_THRESHOLD_DAYS),
            deadline: DEFAULT_DEADLINE,
            retry: RetryPolicy::default(),
            provider: ProviderOptions::default(),
        }
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.scholar_id.trim().is_empty() {
            return Err(ScraperError::Config(format!("{} is empty", SCHOLAR_ID_ENV)));
        }
        if self.retry.max_attempts == 0 {
            return Err(ScraperError::Config("max attempts must be at least 1".to_string()));
        }
        if self.deadline.is_zero() {
            return Err(ScraperError::Config("timeout must be positive".to_string()));
        }
        if self.freshness_threshold < chrono::Duration::zero() {
            return Err(ScraperError::Config("freshness threshold must not be negative".to_string()));
        }
        Ok(())
    }
}

/// Require a non-empty profile id
pub fn require_scholar_id(value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ScraperError::Config(format!(
                "{} environment variable not set (or pass --scholar-id)",
                SCHOLAR_ID_ENV
            ))
        })
}

/// Boolean-like environment value: `true`, `1`, `yes` or `on`, any case
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Whether the process runs unattended according to its environment
pub fn automated_from_env() -> bool {
    std::env::var(AUTOMATED_ENV).is_ok_and(|v| is_truthy(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_scholar_id() {
        assert_eq!(
            require_scholar_id(Some(" ABC123 ".to_string())).expect("present"),
            "ABC123"
        );
        assert!(matches!(require_scholar_id(None), Err(ScraperError::Config(_))));
        assert!(matches!(
            require_scholar_id(Some("   ".to_string())),
            Err(ScraperError::Config(_))
        ));
    }

    #[test]
    fn test_is_truthy() {
        for value in ["true", "TRUE", "1", "yes", "On"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["false", "0", "", "no", "maybe"] {
            assert!(!is_truthy(value), "{value}");
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = Config::new("ABC123");
        assert!(!config.automated);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.deadline, Duration::from_secs(3600));
        assert_eq!(config.freshness_threshold, chrono::Duration::days(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::new("ABC123");
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::new("ABC123");
        config.deadline = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
