//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default remote graph service endpoint
pub const DEFAULT_BASE_URL: &str = "https://jdm-api.demo.lirmm.fr/v0";

/// Relinfer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    /// Per-call deadline
    pub timeout_secs: u64,
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Raw weights below this are not requested from the service
    pub min_weight: i64,
    /// Maximum edges per fetch (0 = service default)
    pub page_limit: u32,
    /// Raw weight that maps to certainty 1.0
    pub weight_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_depth: usize,
    /// Relation types allowed on intermediate hops (empty = any)
    pub relation_filter: Vec<String>,
    pub top_k: usize,
    pub query_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub certainty_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this are re-fetched (None = process lifetime)
    pub expiry_secs: Option<u64>,
    pub negative_ttl_ms: u64,
    /// JSONL snapshot location (None = in-memory only)
    pub persist_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub renderer: String,
}

/// Certainty models selectable through `search.certainty_model`
pub const CERTAINTY_MODELS: &[&str] = &["bottleneck", "product", "harmonic"];

/// Renderers selectable through `output.renderer`
pub const RENDERERS: &[&str] = &["terminal", "chat"];

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 200,
            backoff_max_ms: 5000,
            min_weight: 1,
            page_limit: 100,
            weight_scale: 100.0,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            relation_filter: Vec::new(),
            top_k: 10,
            query_timeout_secs: 30,
            max_concurrent_fetches: 16,
            certainty_model: "bottleneck".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            renderer: "terminal".to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(env::var("RELINFER_API_KEY").ok().filter(|k| !k.is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                let count = key.chars().count();
                if count <= 4 {
                    "***".to_string()
                } else {
                    let tail: String = key.chars().skip(count - 4).collect();
                    format!("***{}", tail)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Remote API credentials must be provided via RELINFER_API_KEY, not stored in configuration"
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SearchConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_secs: None,
            negative_ttl_ms: 2000,
            persist_path: None,
        }
    }
}

impl CacheConfig {
    pub fn expiry(&self) -> Option<Duration> {
        self.expiry_secs.map(Duration::from_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_millis(self.negative_ttl_ms)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("RELINFER_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("relinfer")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.remote.enforce_env_only()?;

        if self.search.max_depth == 0 {
            return Err(anyhow!("search.max_depth must be at least 1"));
        }
        if self.search.max_concurrent_fetches == 0 {
            return Err(anyhow!("search.max_concurrent_fetches must be at least 1"));
        }
        if self.remote.weight_scale <= 0.0 {
            return Err(anyhow!("remote.weight_scale must be positive"));
        }
        if !CERTAINTY_MODELS.contains(&self.search.certainty_model.as_str()) {
            return Err(anyhow!(
                "Invalid certainty model: {}. Valid options: {}",
                self.search.certainty_model,
                CERTAINTY_MODELS.join(", ")
            ));
        }
        if !RENDERERS.contains(&self.output.renderer.as_str()) {
            return Err(anyhow!(
                "Invalid renderer: {}. Valid options: {}",
                self.output.renderer,
                RENDERERS.join(", ")
            ));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "remote.base_url" => Ok(self.remote.base_url.clone()),
            "remote.timeout_secs" => Ok(self.remote.timeout_secs.to_string()),
            "remote.max_retries" => Ok(self.remote.max_retries.to_string()),
            "remote.backoff_base_ms" => Ok(self.remote.backoff_base_ms.to_string()),
            "remote.backoff_max_ms" => Ok(self.remote.backoff_max_ms.to_string()),
            "remote.min_weight" => Ok(self.remote.min_weight.to_string()),
            "remote.page_limit" => Ok(self.remote.page_limit.to_string()),
            "remote.weight_scale" => Ok(self.remote.weight_scale.to_string()),

            "search.max_depth" => Ok(self.search.max_depth.to_string()),
            "search.relation_filter" => Ok(self.search.relation_filter.join(", ")),
            "search.top_k" => Ok(self.search.top_k.to_string()),
            "search.query_timeout_secs" => Ok(self.search.query_timeout_secs.to_string()),
            "search.max_concurrent_fetches" => Ok(self.search.max_concurrent_fetches.to_string()),
            "search.certainty_model" => Ok(self.search.certainty_model.clone()),

            "cache.expiry_secs" => Ok(self
                .cache
                .expiry_secs
                .map(|s| s.to_string())
                .unwrap_or_else(|| "(never)".to_string())),
            "cache.negative_ttl_ms" => Ok(self.cache.negative_ttl_ms.to_string()),
            "cache.persist_path" => Ok(self
                .cache
                .persist_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(in-memory)".to_string())),

            "output.renderer" => Ok(self.output.renderer.clone()),

            "remote.api_key" | "api_key" => match self.remote.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use RELINFER_API_KEY env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `relinfer config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "remote.base_url" => {
                let url = value.trim_end_matches('/');
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.remote.base_url = url.to_string();
            }
            "remote.timeout_secs" => {
                self.remote.timeout_secs = parse_positive(key, value)?;
            }
            "remote.max_retries" => {
                self.remote.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid max_retries value: {}", value))?;
            }
            "remote.backoff_base_ms" => {
                self.remote.backoff_base_ms = value
                    .parse()
                    .with_context(|| format!("Invalid backoff_base_ms value: {}", value))?;
            }
            "remote.backoff_max_ms" => {
                self.remote.backoff_max_ms = value
                    .parse()
                    .with_context(|| format!("Invalid backoff_max_ms value: {}", value))?;
            }
            "remote.min_weight" => {
                self.remote.min_weight = value
                    .parse()
                    .with_context(|| format!("Invalid min_weight value: {}", value))?;
            }
            "remote.page_limit" => {
                self.remote.page_limit = value
                    .parse()
                    .with_context(|| format!("Invalid page_limit value: {}", value))?;
            }
            "remote.weight_scale" => {
                let scale: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid weight_scale value: {}", value))?;
                if scale <= 0.0 {
                    return Err(anyhow!("Weight scale must be positive"));
                }
                self.remote.weight_scale = scale;
            }

            "search.max_depth" => {
                let depth: usize = parse_positive(key, value)?;
                if depth > 6 {
                    return Err(anyhow!("Max depth must be between 1 and 6"));
                }
                self.search.max_depth = depth;
            }
            "search.relation_filter" => {
                self.search.relation_filter = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "search.top_k" => {
                self.search.top_k = parse_positive(key, value)?;
            }
            "search.query_timeout_secs" => {
                self.search.query_timeout_secs = parse_positive(key, value)?;
            }
            "search.max_concurrent_fetches" => {
                self.search.max_concurrent_fetches = parse_positive(key, value)?;
            }
            "search.certainty_model" => {
                if !CERTAINTY_MODELS.contains(&value) {
                    return Err(anyhow!(
                        "Invalid certainty model: {}. Valid options: {}",
                        value,
                        CERTAINTY_MODELS.join(", ")
                    ));
                }
                self.search.certainty_model = value.to_string();
            }

            "cache.expiry_secs" => {
                self.cache.expiry_secs = match value {
                    "" | "never" | "none" => None,
                    v => Some(parse_positive(key, v)?),
                };
            }
            "cache.negative_ttl_ms" => {
                self.cache.negative_ttl_ms = value
                    .parse()
                    .with_context(|| format!("Invalid negative_ttl_ms value: {}", value))?;
            }
            "cache.persist_path" => {
                self.cache.persist_path = match value {
                    "" | "none" => None,
                    v => Some(PathBuf::from(v)),
                };
            }

            "output.renderer" => {
                if !RENDERERS.contains(&value) {
                    return Err(anyhow!(
                        "Invalid renderer: {}. Valid options: {}",
                        value,
                        RENDERERS.join(", ")
                    ));
                }
                self.output.renderer = value.to_string();
            }

            "remote.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the RELINFER_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `relinfer config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "remote.base_url",
            "remote.timeout_secs",
            "remote.max_retries",
            "remote.backoff_base_ms",
            "remote.backoff_max_ms",
            "remote.min_weight",
            "remote.page_limit",
            "remote.weight_scale",
            "remote.api_key",
            "search.max_depth",
            "search.relation_filter",
            "search.top_k",
            "search.query_timeout_secs",
            "search.max_concurrent_fetches",
            "search.certainty_model",
            "cache.expiry_secs",
            "cache.negative_ttl_ms",
            "cache.persist_path",
            "output.renderer",
        ];

        keys.into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_positive<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed: T = value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", key, value))?;
    if parsed <= T::default() {
        return Err(anyhow!("{} must be greater than zero", key));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert!(config.remote.api_key.is_none());
        assert_eq!(config.remote.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.remote.timeout_secs, 10);
        assert_eq!(config.remote.max_retries, 3);
        assert_eq!(config.remote.min_weight, 1);
        assert_eq!(config.remote.page_limit, 100);

        assert_eq!(config.search.max_depth, 2);
        assert!(config.search.relation_filter.is_empty());
        assert_eq!(config.search.top_k, 10);
        assert_eq!(config.search.certainty_model, "bottleneck");

        assert!(config.cache.expiry_secs.is_none());
        assert_eq!(config.cache.negative_ttl(), Duration::from_millis(2000));
        assert!(config.cache.persist_path.is_none());
        assert_eq!(config.output.renderer, "terminal");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip_with_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [search]
            max_depth = 3
            relation_filter = ["r_isa", "r_syn"]

            [cache]
            expiry_secs = 3600
            "#,
        )
        .unwrap();

        assert_eq!(config.search.max_depth, 3);
        assert_eq!(config.search.relation_filter, vec!["r_isa", "r_syn"]);
        assert_eq!(config.search.top_k, 10);
        assert_eq!(config.cache.expiry(), Some(Duration::from_secs(3600)));
        assert_eq!(config.remote.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_api_key_in_file_rejected() {
        let mut config = Config::default();
        config.remote.api_key = Some("secret".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();

        config.set("search.max_depth", "3").unwrap();
        assert_eq!(config.get("search.max_depth").unwrap(), "3");

        config.set("search.relation_filter", "r_isa, r_hypo,").unwrap();
        assert_eq!(config.search.relation_filter, vec!["r_isa", "r_hypo"]);

        config.set("cache.expiry_secs", "120").unwrap();
        assert_eq!(config.cache.expiry_secs, Some(120));
        config.set("cache.expiry_secs", "never").unwrap();
        assert_eq!(config.cache.expiry_secs, None);

        config.set("output.renderer", "chat").unwrap();
        assert_eq!(config.get("output.renderer").unwrap(), "chat");
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("search.max_depth", "0").is_err());
        assert!(config.set("search.max_depth", "12").is_err());
        assert!(config.set("search.top_k", "abc").is_err());
        assert!(config.set("search.certainty_model", "vibes").is_err());
        assert!(config.set("output.renderer", "html").is_err());
        assert!(config.set("remote.base_url", "ftp://x").is_err());
        assert!(config.set("remote.api_key", "secret").is_err());
        assert!(config.set("nope", "1").is_err());
    }

    #[test]
    fn test_list_covers_every_key() {
        let config = Config::default();
        let listed = config.list().unwrap();
        assert_eq!(listed.len(), 19);
        assert!(listed.iter().any(|(k, _)| k == "search.top_k"));
    }

    #[test]
    fn test_unknown_key_error_message() {
        let config = Config::default();
        let err = config.get("bogus").unwrap_err().to_string();
        assert!(err.contains("relinfer config list"));
    }
}
