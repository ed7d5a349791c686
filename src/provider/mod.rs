mod budget;
mod openweathermap;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::weather::models::Units;

pub use budget::ApiCallBudget;
pub use openweathermap::{OpenWeatherMapClient, DEFAULT_BASE_URL};

/// The forecast endpoint returns one sample every 3 hours
pub const INTERVALS_PER_DAY: u32 = 8;
/// The forecast endpoint never returns more than 5 days of samples
pub const MAX_FORECAST_INTERVALS: u32 = 40;

/// Translate a day count into the provider's `cnt` interval count
pub fn forecast_interval_count(days: u8) -> u32 {
    (u32::from(days) * INTERVALS_PER_DAY).min(MAX_FORECAST_INTERVALS)
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider returned HTTP {status}")]
    Status { status: u16, body: Value },

    /// Never carries the request URL, which holds the API key
    #[error("Failed to reach provider: {0}")]
    Request(reqwest::Error),

    #[error("Daily provider call budget of {0} exhausted")]
    BudgetExhausted(u32),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.without_url())
    }
}

impl ProviderError {
    /// Detail placed in the failure envelope's `error` field
    pub fn body(&self) -> Value {
        match self {
            Self::Status { body, .. } => body.clone(),
            Self::Request(e) => json!({ "message": e.to_string() }),
            Self::BudgetExhausted(_) => json!({ "cod": 429, "message": self.to_string() }),
        }
    }

    /// Metrics label for the failure kind
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Status { .. } => "http_error",
            Self::Request(_) => "transport_error",
            Self::BudgetExhausted(_) => "budget_exhausted",
        }
    }
}

/// Upstream weather data source.
///
/// Every call is a single attempt; failures are returned immediately.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions for a city name
    async fn fetch_current_by_city(&self, city: &str, units: Units) -> Result<Value, ProviderError>;

    /// Current conditions for a coordinate pair
    async fn fetch_current_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<Value, ProviderError>;

    /// Raw 3-hour forecast covering `days` days
    async fn fetch_forecast_by_city(
        &self,
        city: &str,
        units: Units,
        days: u8,
    ) -> Result<Value, ProviderError>;

    /// Cities matching free text
    async fn search_cities(&self, query: &str, limit: u8) -> Result<Value, ProviderError>;
}
