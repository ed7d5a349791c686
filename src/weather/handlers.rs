use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::models::WeatherQuery;
use super::service::ServiceError;
use crate::error::{Envelope, HttpError};
use crate::extractors::{Params, ValidationError, Validator};
use crate::impl_into_response;
use crate::AppState;

const MAX_CITY_CHARS: usize = 100;
const MAX_QUERY_CHARS: usize = 100;
const MAX_FORECAST_DAYS: u8 = 5;
const MAX_SEARCH_RESULTS: u8 = 5;

/// Everything a weather handler can fail with
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl HttpError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(e) => e.status_code(),
            Self::Service(e) => e.status_code(),
        }
    }

    fn detail(&self) -> Option<Value> {
        match self {
            Self::Validation(e) => e.detail(),
            Self::Service(e) => e.detail(),
        }
    }
}

impl_into_response!(ApiError);

#[derive(Debug, Deserialize)]
pub struct CurrentQuery {
    /// City name to get weather for
    pub city: Option<String>,
    /// Units: metric, imperial, or standard
    pub units: Option<String>,
}

impl CurrentQuery {
    pub fn validate(self) -> Result<WeatherQuery, ValidationError> {
        let mut v = Validator::new();
        let name = v.required_string("city", self.city, MAX_CITY_CHARS);
        let units = v.optional_units(self.units);
        v.finish(|| Some(WeatherQuery::City { name: name?, units }))
    }
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub city: Option<String>,
    pub units: Option<String>,
    /// Number of days, 1 to 5
    pub days: Option<String>,
}

impl ForecastQuery {
    pub fn validate(self) -> Result<WeatherQuery, ValidationError> {
        let mut v = Validator::new();
        let city = v.required_string("city", self.city, MAX_CITY_CHARS);
        let units = v.optional_units(self.units);
        let days = v.optional_integer("days", self.days, 1..=MAX_FORECAST_DAYS, MAX_FORECAST_DAYS);
        v.finish(|| {
            Some(WeatherQuery::Forecast {
                city: city?,
                units,
                days,
            })
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CoordinatesQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub units: Option<String>,
}

impl CoordinatesQuery {
    pub fn validate(self) -> Result<WeatherQuery, ValidationError> {
        let mut v = Validator::new();
        let lat = v.required_number("lat", self.lat);
        let lon = v.required_number("lon", self.lon);
        let units = v.optional_units(self.units);
        v.finish(|| {
            Some(WeatherQuery::Coordinates {
                lat: lat?,
                lon: lon?,
                units,
            })
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Free-text city name
    pub query: Option<String>,
    /// Maximum number of matches, 1 to 5
    pub limit: Option<String>,
}

impl SearchQuery {
    pub fn validate(self) -> Result<WeatherQuery, ValidationError> {
        let mut v = Validator::new();
        let query = v.required_string("query", self.query, MAX_QUERY_CHARS);
        let limit = v.optional_integer("limit", self.limit, 1..=MAX_SEARCH_RESULTS, MAX_SEARCH_RESULTS);
        v.finish(|| {
            Some(WeatherQuery::SearchText {
                query: query?,
                limit,
            })
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Entries still within their TTL
    pub cached_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_calls_remaining: Option<u32>,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cached_entries: state.cache.live_len(),
        provider_calls_remaining: state.budget.as_ref().map(|b| b.remaining()),
    })
}

/// Prometheus scrape endpoint
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Current weather by city
///
/// GET /weather/current?city=London&units=metric
pub async fn current(
    State(state): State<AppState>,
    Params(query): Params<CurrentQuery>,
) -> Result<Envelope, ApiError> {
    lookup(&state, query.validate()?).await
}

/// Forecast grouped by day
///
/// GET /weather/forecast?city=London&units=metric&days=5
pub async fn forecast(
    State(state): State<AppState>,
    Params(query): Params<ForecastQuery>,
) -> Result<Envelope, ApiError> {
    lookup(&state, query.validate()?).await
}

/// Current weather by coordinates
///
/// GET /weather/coordinates?lat=51.51&lon=-0.13&units=metric
pub async fn by_coordinates(
    State(state): State<AppState>,
    Params(query): Params<CoordinatesQuery>,
) -> Result<Envelope, ApiError> {
    lookup(&state, query.validate()?).await
}

/// City search
///
/// GET /weather/search?query=Lon&limit=5
pub async fn search(
    State(state): State<AppState>,
    Params(query): Params<SearchQuery>,
) -> Result<Envelope, ApiError> {
    lookup(&state, query.validate()?).await
}

async fn lookup(state: &AppState, query: WeatherQuery) -> Result<Envelope, ApiError> {
    let envelope = state.weather_service.lookup(&query).await?;
    if envelope.success {
        tracing::info!(operation = query.operation(), "Weather lookup succeeded");
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::models::Units;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_current_defaults_to_metric() {
        let query = CurrentQuery {
            city: s("London"),
            units: None,
        };
        assert_eq!(
            query.validate().unwrap(),
            WeatherQuery::City {
                name: "London".to_string(),
                units: Units::Metric
            }
        );
    }

    #[test]
    fn test_forecast_defaults_to_five_days() {
        let query = ForecastQuery {
            city: s("London"),
            units: s("imperial"),
            days: None,
        };
        assert_eq!(
            query.validate().unwrap(),
            WeatherQuery::Forecast {
                city: "London".to_string(),
                units: Units::Imperial,
                days: 5
            }
        );
    }

    #[test]
    fn test_forecast_rejects_ten_days() {
        let query = ForecastQuery {
            city: s("London"),
            units: None,
            days: s("10"),
        };
        let err = query.validate().unwrap_err();
        assert_eq!(err.to_string(), "The days field must be between 1 and 5.");
    }

    #[test]
    fn test_coordinates_require_both_values() {
        let query = CoordinatesQuery {
            lat: s("51.5"),
            lon: None,
            units: None,
        };
        let err = query.validate().unwrap_err();
        assert_eq!(err.to_string(), "The lon field is required.");
    }

    #[test]
    fn test_search_defaults_to_five_results() {
        let query = SearchQuery {
            query: s("Spring"),
            limit: None,
        };
        assert_eq!(
            query.validate().unwrap(),
            WeatherQuery::SearchText {
                query: "Spring".to_string(),
                limit: 5
            }
        );
    }

    #[test]
    fn test_search_requires_query() {
        let query = SearchQuery {
            query: None,
            limit: s("3"),
        };
        assert!(query.validate().is_err());
    }
}
