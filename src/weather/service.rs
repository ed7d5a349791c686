use axum::http::StatusCode;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::models::{SearchResult, Units, WeatherQuery};
use crate::cache::TtlCache;
use crate::error::{Envelope, HttpError};
use crate::forecast::{self, AggregationError};
use crate::impl_into_response;
use crate::provider::{ProviderError, WeatherProvider};

pub const WEATHER_FAILURE_MESSAGE: &str = "Unable to fetch weather data";
pub const FORECAST_FAILURE_MESSAGE: &str = "Unable to fetch forecast data";
pub const SEARCH_FAILURE_MESSAGE: &str = "Unable to fetch search results";

/// Failures that are not cached: the provider answered with a body we could
/// not interpret, or the call was refused locally before reaching it
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid forecast data from provider: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Invalid provider payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Daily provider call budget of {0} exhausted")]
    BudgetExhausted(u32),
}

impl HttpError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Aggregation(_) | Self::MalformedPayload(_) => StatusCode::BAD_GATEWAY,
            Self::BudgetExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl_into_response!(ServiceError);

/// Cached access to the weather provider.
///
/// Successful and failed provider responses are both cached for the TTL, so
/// repeating a failing request inside the window does not reach the provider.
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    cache: Arc<TtlCache<String, Envelope>>,
    ttl: Duration,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        cache: Arc<TtlCache<String, Envelope>>,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            ttl,
        }
    }

    /// Run whichever operation `query` describes
    pub async fn lookup(&self, query: &WeatherQuery) -> Result<Envelope, ServiceError> {
        match query {
            WeatherQuery::City { name, units } => self.current_by_city(name, *units).await,
            WeatherQuery::Coordinates { lat, lon, units } => {
                self.current_by_coordinates(*lat, *lon, *units).await
            }
            WeatherQuery::Forecast { city, units, days } => {
                self.forecast_by_city(city, *units, *days).await
            }
            WeatherQuery::SearchText { query, limit } => self.search_cities(query, *limit).await,
        }
    }

    /// Current conditions by city name
    pub async fn current_by_city(&self, city: &str, units: Units) -> Result<Envelope, ServiceError> {
        let query = WeatherQuery::City {
            name: city.to_string(),
            units,
        };

        self.cached(&query, move || async move {
            envelope_from(
                self.provider.fetch_current_by_city(city, units).await,
                WEATHER_FAILURE_MESSAGE,
            )
        })
        .await
    }

    /// Current conditions by coordinates
    pub async fn current_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<Envelope, ServiceError> {
        let query = WeatherQuery::Coordinates { lat, lon, units };

        self.cached(&query, move || async move {
            envelope_from(
                self.provider
                    .fetch_current_by_coordinates(lat, lon, units)
                    .await,
                WEATHER_FAILURE_MESSAGE,
            )
        })
        .await
    }

    /// Forecast grouped into at most `days` daily summaries
    pub async fn forecast_by_city(
        &self,
        city: &str,
        units: Units,
        days: u8,
    ) -> Result<Envelope, ServiceError> {
        let query = WeatherQuery::Forecast {
            city: city.to_string(),
            units,
            days,
        };

        self.cached(&query, move || async move {
            match self.provider.fetch_forecast_by_city(city, units, days).await {
                Ok(body) => {
                    let grouped = forecast::summarize(body, usize::from(days))?;
                    tracing::info!(
                        city = %grouped.city.name,
                        days = grouped.daily.len(),
                        "Forecast grouped by day"
                    );
                    Ok(Envelope::success(serde_json::to_value(grouped)?))
                }
                Err(e) => failure_envelope(e, FORECAST_FAILURE_MESSAGE),
            }
        })
        .await
    }

    /// City search through the provider's geocoding endpoint
    pub async fn search_cities(&self, text: &str, limit: u8) -> Result<Envelope, ServiceError> {
        let query = WeatherQuery::SearchText {
            query: text.to_string(),
            limit,
        };

        self.cached(&query, move || async move {
            match self.provider.search_cities(text, limit).await {
                Ok(body) => {
                    let results: Vec<SearchResult> = serde_json::from_value(body)?;
                    Ok(Envelope::success(serde_json::to_value(results)?))
                }
                Err(e) => failure_envelope(e, SEARCH_FAILURE_MESSAGE),
            }
        })
        .await
    }

    async fn cached<F, Fut>(&self, query: &WeatherQuery, compute: F) -> Result<Envelope, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Envelope, ServiceError>>,
    {
        let key = query.cache_key();
        tracing::debug!(operation = query.operation(), key = %key, "Looking up weather cache");
        self.cache.get_or_compute(key, self.ttl, compute).await
    }
}

fn envelope_from(
    result: Result<Value, ProviderError>,
    failure_message: &str,
) -> Result<Envelope, ServiceError> {
    match result {
        Ok(body) => Ok(Envelope::success(body)),
        Err(e) => failure_envelope(e, failure_message),
    }
}

/// Provider failures become a cacheable envelope. A local budget refusal is
/// returned as an error so the key is retried once the budget resets.
fn failure_envelope(err: ProviderError, message: &str) -> Result<Envelope, ServiceError> {
    if let ProviderError::BudgetExhausted(limit) = err {
        return Err(ServiceError::BudgetExhausted(limit));
    }
    tracing::warn!(error = %err, "Weather provider request failed");
    Ok(Envelope::failure(message, Some(err.body())))
}
