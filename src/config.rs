//! Feed configuration loaded from an optional YAML file.
//!
//! Every field carries a default, so running without a config file targets the
//! print-edition API with the settings the feed has always used. Command-line
//! flags are applied on top by `main`.

use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Site origin, without trailing slash.
    pub base_url: String,
    /// `root_path` query parameter the listing API expects.
    pub root_path: String,
    /// API path for one print-edition page; the page number is appended.
    pub endpoint: String,
    pub first_page: u32,
    pub last_page: u32,
    /// Pages fetched per batch.
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Upper bound of random jitter added to each backoff delay. 0 disables it.
    pub backoff_jitter_ms: u64,
    pub user_agent: String,
    /// Offset of the site's civil timezone from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Path prefix upstream adds to article paths that the public site does not serve.
    pub legacy_prefix: String,
    pub feed: ChannelConfig,
}

/// Channel-level metadata for the rendered feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    /// Public URL of the feed itself, for `atom:link rel="self"`.
    pub self_link: String,
    /// Item cap for accretive rendering.
    pub max_items: usize,
    /// File name of the feed inside the output directory.
    pub file_name: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bonikbarta.com".to_string(),
            root_path: "00000000010000000001".to_string(),
            endpoint: "/api/print-edition-page".to_string(),
            first_page: 3,
            last_page: 20,
            concurrency: 4,
            timeout_ms: 12_000,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_jitter_ms: 0,
            user_agent: "Mozilla/5.0 (RSS Generator)".to_string(),
            utc_offset_minutes: 6 * 60,
            legacy_prefix: "/home".to_string(),
            feed: ChannelConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "Bonikbarta Combined Feed".to_string(),
            link: "https://bonikbarta.com".to_string(),
            description: "Latest articles from Bonikbarta".to_string(),
            language: "bn".to_string(),
            self_link: "https://bonikbarta.com/feed.xml".to_string(),
            max_items: 500,
            file_name: "feed.xml".to_string(),
        }
    }
}

impl FeedConfig {
    /// Parse a YAML document. Missing keys fall back to defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        let config: FeedConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or use defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let yaml = tokio::fs::read_to_string(path).await?;
                let config = Self::from_yaml(&yaml)?;
                info!(path = %path.display(), "Loaded configuration");
                Ok(config)
            }
            None => {
                info!("No config file given; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.first_page > self.last_page {
            return Err(format!(
                "first_page ({}) is greater than last_page ({})",
                self.first_page, self.last_page
            )
            .into());
        }
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".into());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| format!("base_url {:?} is not a valid URL: {e}", self.base_url))?;
        Ok(())
    }

    pub fn pages(&self) -> Vec<u32> {
        (self.first_page..=self.last_page).collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_pages_three_to_twenty() {
        let config = FeedConfig::default();
        let pages = config.pages();
        assert_eq!(pages.len(), 18);
        assert_eq!(pages.first(), Some(&3));
        assert_eq!(pages.last(), Some(&20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
concurrency: 2
feed:
  title: "Test Feed"
  max_items: 50
"#;
        let config = FeedConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.feed.title, "Test Feed");
        assert_eq!(config.feed.max_items, 50);
        assert_eq!(config.feed.language, "bn");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_millis(12_000));
    }

    #[test]
    fn test_inverted_page_range_is_rejected() {
        let yaml = "first_page: 10\nlast_page: 2\n";
        assert!(FeedConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        assert!(FeedConfig::from_yaml("max_attempts: 0\n").is_err());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(FeedConfig::from_yaml("base_url: not a url\n").is_err());
    }

    #[tokio::test]
    async fn test_load_without_path_uses_defaults() {
        let config = FeedConfig::load(None).await.unwrap();
        assert_eq!(config.base_url, "https://bonikbarta.com");
    }
}
