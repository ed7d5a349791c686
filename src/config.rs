use config::{Case, Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::provider::DEFAULT_BASE_URL;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// OpenWeatherMap API key
    pub openweathermap_api_key: String,

    /// OpenWeatherMap base URL (scheme and host, no path)
    #[serde(default = "default_openweathermap_url")]
    pub openweathermap_url: String,

    /// How long provider responses, failures included, stay cached
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Upper bound on a single provider call
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Maximum provider calls per UTC day (unlimited if not set)
    #[serde(default)]
    pub provider_daily_call_limit: Option<u32>,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_openweathermap_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        Self::from_builder(
            Config::builder()
                // Load from config file if present
                .add_source(File::with_name("config").required(false))
                .add_source(File::with_name("config.local").required(false))
                // Override with environment variables (prefixed with WEATHER_RELAY_)
                // Convert SCREAMING_SNAKE_CASE env vars to snake_case config keys
                .add_source(
                    Environment::with_prefix("WEATHER_RELAY")
                        .prefix_separator("_")
                        .separator("__")
                        .convert_case(Case::Snake)
                        .try_parsing(true),
                ),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .set_default("host", default_host())?
            .set_default("port", default_port())?
            .set_default("openweathermap_url", default_openweathermap_url())?
            .set_default("cache_ttl_secs", default_cache_ttl_secs())?
            .set_default("provider_timeout_secs", default_provider_timeout_secs())?
            .build()?
            .try_deserialize()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}
