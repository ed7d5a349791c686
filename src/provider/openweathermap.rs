use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;

use super::{forecast_interval_count, ApiCallBudget, ProviderError, WeatherProvider};
use crate::weather::models::Units;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const GEOCODING_PATH: &str = "/geo/1.0/direct";

/// OpenWeatherMap client for the free 2.5 and geocoding APIs
pub struct OpenWeatherMapClient {
    client: Client,
    base_url: String,
    api_key: String,
    budget: Option<Arc<ApiCallBudget>>,
}

impl OpenWeatherMapClient {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            budget: None,
        }
    }

    /// Refuse calls once `budget` is spent for the day
    pub fn with_budget(mut self, budget: Arc<ApiCallBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    async fn get_json(
        &self,
        operation: &'static str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let result = self.send(path, params).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        metrics::counter!("provider_requests_total", "operation" => operation, "outcome" => outcome)
            .increment(1);

        result
    }

    async fn send(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        if let Some(budget) = &self.budget {
            if !budget.try_acquire() {
                tracing::warn!(limit = budget.daily_limit(), "Provider call budget exhausted");
                return Err(ProviderError::BudgetExhausted(budget.daily_limit()));
            }
        }

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Calling weather provider");

        // Use query builder for proper URL encoding - handles spaces and special chars
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "Received provider response");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text).unwrap_or(if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            });
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapClient {
    async fn fetch_current_by_city(&self, city: &str, units: Units) -> Result<Value, ProviderError> {
        tracing::debug!(city = %city, units = %units, "Fetching current weather");
        self.get_json(
            "current",
            CURRENT_PATH,
            &[("q", city.to_string()), ("units", units.to_string())],
        )
        .await
    }

    async fn fetch_current_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<Value, ProviderError> {
        tracing::debug!(lat = %lat, lon = %lon, units = %units, "Fetching current weather by coordinates");
        self.get_json(
            "current_geo",
            CURRENT_PATH,
            &[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", units.to_string()),
            ],
        )
        .await
    }

    async fn fetch_forecast_by_city(
        &self,
        city: &str,
        units: Units,
        days: u8,
    ) -> Result<Value, ProviderError> {
        let count = forecast_interval_count(days);
        tracing::debug!(city = %city, units = %units, cnt = count, "Fetching forecast");
        self.get_json(
            "forecast",
            FORECAST_PATH,
            &[
                ("q", city.to_string()),
                ("units", units.to_string()),
                ("cnt", count.to_string()),
            ],
        )
        .await
    }

    async fn search_cities(&self, query: &str, limit: u8) -> Result<Value, ProviderError> {
        tracing::debug!(query = %query, limit = limit, "Searching cities");
        self.get_json(
            "search",
            GEOCODING_PATH,
            &[("q", query.to_string()), ("limit", limit.to_string())],
        )
        .await
    }
}
