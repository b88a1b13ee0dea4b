// Configuration management module
// TOML settings for the documentation source, cache tiers, index and search

pub mod settings;

pub use settings::{
    CacheConfig, Config, ConfigError, IndexConfig, OllamaConfig, SearchConfig, SourceConfig,
};

/// Resolve the configuration directory, preferring an explicit override
#[inline]
pub fn resolve_config_dir(
    explicit: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    explicit.map_or_else(Config::default_base_dir, Ok)
}
