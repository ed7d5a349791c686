use axum::Json;
use utoipa::OpenApi;

use crate::error::Envelope;
use crate::forecast::models::{
    Coordinates, DailySummary, ForecastCity, ForecastGrouped, Period, WeatherCondition, Wind,
};
use crate::weather::models::{SearchResult, Units};

/// OpenAPI documentation for the weather relay API
///
/// This provides schema documentation for the response envelope and the
/// payloads carried in its `data` field.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Relay API",
        version = "1.0.0",
        description = "Caching proxy for OpenWeatherMap. Provides current weather by city or coordinates, a daily-grouped 5 day forecast and city search.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    tags(
        (name = "weather", description = "Current weather by city or coordinates"),
        (name = "forecast", description = "Forecast grouped into daily summaries"),
        (name = "search", description = "City search")
    ),
    components(
        schemas(
            Envelope,
            Units,
            ForecastGrouped,
            ForecastCity,
            Coordinates,
            DailySummary,
            Period,
            WeatherCondition,
            Wind,
            SearchResult,
        )
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document as JSON
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_envelope_and_forecast_schemas() {
        let doc = ApiDoc::openapi();
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("Envelope"));
        assert!(schemas.contains_key("DailySummary"));
        assert!(schemas.contains_key("SearchResult"));
    }
}
