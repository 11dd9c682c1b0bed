//! Custom error types for gscholar-shields.
//!
//! Every fallible library operation returns `Result<T, ScraperError>`.
//! The binary converts these into `anyhow` errors at the edge.

use std::time::Duration;
use thiserror::Error;

/// Main error type for scrape operations.
#[derive(Debug, Error)]
pub enum ScraperError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the provider
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Provider returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message
        message: String,
    },

    /// CAPTCHA interstitial served instead of the profile
    #[error("CAPTCHA detected")]
    Captcha,

    /// No profile exists for the identifier
    #[error("No author found for scholar id '{0}'")]
    AuthorNotFound(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// The overall scrape deadline elapsed
    #[error("Scrape timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The scrape failed and there was no cached snapshot to fall back to
    #[error("Scrape failed and no fallback data is available: {source}")]
    NoFallback {
        #[source]
        source: Box<ScraperError>,
    },
}

/// Result type alias using `ScraperError`
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ScraperError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u32> = None;
        let err = missing.ok_or_parse("no table").expect_err("should fail");
        assert_eq!(err.to_string(), "Parse error: no table");
        assert_eq!(Some(3).ok_or_parse("unused").expect("present"), 3);
    }

    #[test]
    fn test_no_fallback_reports_cause() {
        let err = ScraperError::NoFallback {
            source: Box::new(ScraperError::Captcha),
        };
        assert!(err.to_string().contains("CAPTCHA detected"));
    }
}
