
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
        }
    }
}

/// Where the navigation manifest and page bodies are fetched from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Navigation manifest (JSON or YAML)
    pub manifest_url: String,
    /// Prefix joined with a page's `path` to fetch its raw markup
    pub content_base_url: String,
    /// Public site root used to build canonical page URLs
    pub site_base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            manifest_url: "https://raw.githubusercontent.com/VapiAI/docs/main/fern/docs.yml"
                .to_string(),
            content_base_url: "https://raw.githubusercontent.com/VapiAI/docs/main/fern/"
                .to_string(),
            site_base_url: "https://docs.vapi.ai/".to_string(),
            user_agent: concat!("docs-index/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window of the documentation structure in either tier
    pub memory_ttl_secs: u64,
    /// Age past which a structure adopted from disk triggers a background refresh
    pub refresh_after_secs: u64,
    /// Age past which a persisted vector index is rebuilt
    pub index_max_age_secs: u64,
    /// Overrides `<base_dir>/cache`
    pub cache_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl_secs: 60 * 60,
            refresh_after_secs: 30 * 60,
            index_max_age_secs: 24 * 60 * 60,
            cache_dir: None,
        }
    }
}

impl CacheConfig {
    #[inline]
    pub fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_ttl_secs)
    }

    #[inline]
    pub fn refresh_after(&self) -> Duration {
        Duration::from_secs(self.refresh_after_secs)
    }

    #[inline]
    pub fn index_max_age(&self) -> Duration {
        Duration::from_secs(self.index_max_age_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Documents embedded per batch
    pub batch_size: usize,
    /// Pages whose searchable text is shorter than this are not embedded
    pub min_text_length: usize,
    /// Leading words of resolved content included in the searchable text
    pub content_words: usize,
    /// Resolve page bodies while building (one request per page)
    pub include_content: bool,
    pub content_concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            min_text_length: 50,
            content_words: 100,
            include_content: true,
            content_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub similarity_threshold: f32,
    pub default_limit: usize,
    /// Cleaned page text shorter than this is replaced by a synthetic summary
    pub min_content_length: usize,
    /// Extra trigger keyword -> expansion terms, merged over the built-in table
    pub synonyms: HashMap<String, Vec<String>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.15,
            default_limit: 10,
            min_content_length: 100,
            synonyms: HashMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid similarity threshold: {0} (must be between -1.0 and 1.0)")]
    InvalidThreshold(f32),
    #[error("Invalid memory TTL: {0}s (must be greater than zero)")]
    InvalidTtl(u64),
    #[error("Refresh threshold ({0}s) must not exceed the memory TTL ({1}s)")]
    RefreshAfterTtl(u64, u64),
    #[error("Invalid index batch size: {0} (must be between 1 and 256)")]
    InvalidIndexBatchSize(usize),
    #[error("Invalid content concurrency: {0} (must be between 1 and 64)")]
    InvalidConcurrency(usize),
    #[error("Invalid default limit: {0} (must be greater than zero)")]
    InvalidLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default base directory, `~/.docs-index`, unless `DOCS_INDEX_HOME` is set
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os("DOCS_INDEX_HOME") {
            return Ok(PathBuf::from(dir));
        }

        dirs::home_dir()
            .map(|home| home.join(".docs-index"))
            .or_else(|| dirs::data_dir().map(|data| data.join("docs-index")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.source.validate()?;
        self.validate_cache_config()?;
        self.validate_index_config()?;
        self.validate_search_config()?;
        Ok(())
    }

    fn validate_cache_config(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;

        if cache.memory_ttl_secs == 0 {
            return Err(ConfigError::InvalidTtl(cache.memory_ttl_secs));
        }

        if cache.refresh_after_secs > cache.memory_ttl_secs {
            return Err(ConfigError::RefreshAfterTtl(
                cache.refresh_after_secs,
                cache.memory_ttl_secs,
            ));
        }

        Ok(())
    }

    fn validate_index_config(&self) -> Result<(), ConfigError> {
        let index = &self.index;

        if !(1..=256).contains(&index.batch_size) {
            return Err(ConfigError::InvalidIndexBatchSize(index.batch_size));
        }

        if !(1..=64).contains(&index.content_concurrency) {
            return Err(ConfigError::InvalidConcurrency(index.content_concurrency));
        }

        Ok(())
    }

    fn validate_search_config(&self) -> Result<(), ConfigError> {
        let search = &self.search;

        if !(-1.0..=1.0).contains(&search.similarity_threshold) {
            return Err(ConfigError::InvalidThreshold(search.similarity_threshold));
        }

        if search.default_limit == 0 {
            return Err(ConfigError::InvalidLimit(search.default_limit));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the structure cache and the persisted vector index
    #[inline]
    pub fn cache_dir_path(&self) -> PathBuf {
        self.cache
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.get_base_dir().join("cache"))
    }

    #[inline]
    pub fn structure_cache_path(&self) -> PathBuf {
        self.cache_dir_path().join("docs-structure.json")
    }

    #[inline]
    pub fn vector_index_path(&self) -> PathBuf {
        self.cache_dir_path().join("vector-index.json")
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [
            &self.manifest_url,
            &self.content_base_url,
            &self.site_base_url,
        ] {
            let parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }

        Ok(())
    }

    /// Canonical public URL for a source-relative page path
    pub fn page_url(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        let without_ext = trimmed
            .strip_suffix(".mdx")
            .or_else(|| trimmed.strip_suffix(".md"))
            .unwrap_or(trimmed);
        format!(
            "{}/{}",
            self.site_base_url.trim_end_matches('/'),
            without_ext
        )
    }

    /// Raw markup URL for a source-relative page path
    pub fn content_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.content_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
