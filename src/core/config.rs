use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlphaVantageProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub alpha_vantage: Option<AlphaVantageProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            alpha_vantage: Some(AlphaVantageProviderConfig {
                base_url: "https://www.alphavantage.co".to_string(),
            }),
        }
    }
}

/// Delays between sequential quote requests, in milliseconds.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StaggerConfig {
    #[serde(default = "default_live_stagger")]
    pub live_ms: u64,
    #[serde(default = "default_refresh_stagger")]
    pub refresh_ms: u64,
}

fn default_live_stagger() -> u64 {
    1200
}

fn default_refresh_stagger() -> u64 {
    600
}

impl Default for StaggerConfig {
    fn default() -> Self {
        StaggerConfig {
            live_ms: default_live_stagger(),
            refresh_ms: default_refresh_stagger(),
        }
    }
}

impl StaggerConfig {
    pub fn live(&self) -> Duration {
        Duration::from_millis(self.live_ms)
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

fn default_watchlist() -> Vec<String> {
    ["AAPL", "MSFT", "NVDA"].map(String::from).to_vec()
}

fn default_quote_ttl_minutes() -> u64 {
    15
}

fn default_persist() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<String>,
    #[serde(default = "default_quote_ttl_minutes")]
    pub quote_ttl_minutes: u64,
    #[serde(default)]
    pub stagger: StaggerConfig,
    #[serde(default = "default_persist")]
    pub persist: bool,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_key: None,
            providers: ProvidersConfig::default(),
            watchlist: default_watchlist(),
            quote_ttl_minutes: default_quote_ttl_minutes(),
            stagger: StaggerConfig::default(),
            persist: default_persist(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, or built-in defaults when there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default().with_env_overrides());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "marketpulse", "marketpulse")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "marketpulse", "marketpulse")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            debug!("Using API key from {}", API_KEY_ENV);
            self.api_key = Some(key);
        }
        self
    }

    /// The configured credential, if any. Blank keys count as missing.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn alpha_vantage_base_url(&self) -> &str {
        self.providers
            .alpha_vantage
            .as_ref()
            .map_or("https://www.alphavantage.co", |p| &p.base_url)
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_minutes.saturating_mul(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
api_key: "demo"
providers:
  alpha_vantage:
    base_url: "http://example.com/av"
watchlist: ["TSLA", "AMZN"]
quote_ttl_minutes: 5
stagger:
  live_ms: 100
persist: false
data_path: "/tmp/marketpulse"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.api_key(), Some("demo"));
        assert_eq!(config.alpha_vantage_base_url(), "http://example.com/av");
        assert_eq!(config.watchlist, vec!["TSLA", "AMZN"]);
        assert_eq!(config.quote_ttl(), Duration::from_secs(300));
        assert_eq!(config.stagger.live(), Duration::from_millis(100));
        assert_eq!(config.stagger.refresh(), Duration::from_millis(600));
        assert!(!config.persist);
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/marketpulse")
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");

        assert!(config.api_key().is_none());
        assert_eq!(config.alpha_vantage_base_url(), "https://www.alphavantage.co");
        assert_eq!(config.watchlist, vec!["AAPL", "MSFT", "NVDA"]);
        assert_eq!(config.quote_ttl(), Duration::from_secs(15 * 60));
        assert_eq!(config.stagger.live(), Duration::from_millis(1200));
        assert!(config.persist);
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let config: AppConfig =
            serde_yaml::from_str("api_key: \"  \"").expect("Failed to deserialize");
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_huge_quote_ttl_saturates() {
        let config = AppConfig {
            quote_ttl_minutes: u64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(config.quote_ttl(), Duration::from_secs(u64::MAX));
    }
}
