use axum::{
    error_handling::HandleErrorLayer, http::Method, http::StatusCode, routing::get, BoxError,
    Json, Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::Envelope;
use crate::openapi;
use crate::weather::handlers as weather_handlers;
use crate::AppState;

/// Whole-request deadline, provider call included
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Handle request timeout errors
async fn handle_timeout_error(err: BoxError) -> (StatusCode, Json<Envelope>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(Envelope::failure("Request timed out", None)),
        )
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Envelope::failure(format!("Internal error: {}", err), None)),
        )
    }
}

/// Build the weather API routes
fn weather_routes() -> Router<AppState> {
    Router::new()
        .route("/weather/current", get(weather_handlers::current))
        .route("/weather/forecast", get(weather_handlers::forecast))
        .route("/weather/coordinates", get(weather_handlers::by_coordinates))
        .route("/weather/search", get(weather_handlers::search))
}

/// Build the complete application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check at root level
        .route("/", get(weather_handlers::health))
        .route("/health", get(weather_handlers::health))
        .route("/metrics", get(weather_handlers::metrics))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .merge(weather_routes())
        .layer(
            ServiceBuilder::new()
                // Handle timeout errors
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
        )
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::cache::DEFAULT_TTL;
    use crate::provider::testing::FakeProvider;
    use crate::weather::WeatherService;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(provider: Arc<FakeProvider>) -> Router {
        let cache = Arc::new(TtlCache::new());
        let weather_service = Arc::new(WeatherService::new(provider, Arc::clone(&cache), DEFAULT_TTL));
        build_router(AppState {
            weather_service,
            cache,
            budget: None,
            metrics: None,
        })
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Provider forecast body with eight 3-hour records per date
    fn forecast_body(dates: &[&str]) -> Value {
        let list: Vec<Value> = dates
            .iter()
            .enumerate()
            .flat_map(|(d, date)| {
                (0..8).map(move |i| {
                    let temp = d as f64 * 5.0 + i as f64;
                    json!({
                        "dt": 1717200000 + (d * 8 + i) * 10800,
                        "dt_txt": format!("{} {:02}:00:00", date, i * 3),
                        "main": {
                            "temp": temp,
                            "feels_like": temp,
                            "temp_min": temp - 1.0,
                            "temp_max": temp + 1.0,
                            "pressure": 1012,
                            "humidity": 70 + i
                        },
                        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
                        "wind": {"speed": 3.0 + i as f64, "deg": 200}
                    })
                })
            })
            .collect();

        json!({
            "cod": "200",
            "cnt": list.len(),
            "city": {"id": 2643743, "name": "London", "country": "GB"},
            "list": list
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Arc::new(FakeProvider::new()));
        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cached_entries"], 0);
    }

    #[tokio::test]
    async fn test_current_weather_passthrough() {
        let current = json!({
            "name": "London",
            "main": {"temp": 15.0, "feels_like": 14.0, "temp_min": 13.0, "temp_max": 16.0, "pressure": 1012, "humidity": 72},
            "weather": [{"id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d"}],
            "wind": {"speed": 4.6, "deg": 230},
            "sys": {"country": "GB", "sunrise": 1717213000, "sunset": 1717272000},
            "dt": 1717240000,
            "timezone": 3600,
            "visibility": 10000
        });
        let provider = Arc::new(FakeProvider::new().with_current(Ok(current.clone())));
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/current?city=London&units=metric").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "data": current}));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_forecast_groups_sixteen_records_into_two_days() {
        let provider = Arc::new(
            FakeProvider::new().with_forecast(Ok(forecast_body(&["2024-06-01", "2024-06-02"]))),
        );
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/forecast?city=London&units=metric").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["city"]["name"], "London");

        let daily = body["data"]["daily"].as_array().unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0]["date"], "2024-06-01");
        assert_eq!(daily[0]["day"], "Saturday");
        assert_eq!(daily[0]["periods"].as_array().unwrap().len(), 8);
        assert_eq!(daily[1]["periods"].as_array().unwrap().len(), 8);
        assert_eq!(daily[0]["temp_min"], -1.0);
        assert_eq!(daily[0]["temp_max"], 8.0);
        assert_eq!(daily[1]["temp_min"], 4.0);
        assert_eq!(daily[1]["temp_max"], 13.0);
        assert_eq!(daily[0]["humidity"], 70);
        assert_eq!(daily[0]["wind"]["speed"], 3.0);
        assert_eq!(provider.forecast_counts(), vec![40]);
    }

    #[tokio::test]
    async fn test_forecast_days_limit_request_and_output() {
        let provider = Arc::new(FakeProvider::new().with_forecast(Ok(forecast_body(&[
            "2024-06-01",
            "2024-06-02",
            "2024-06-03",
        ]))));
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/forecast?city=London&days=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["daily"].as_array().unwrap().len(), 2);
        assert_eq!(provider.forecast_counts(), vec![16]);
    }

    #[tokio::test]
    async fn test_forecast_rejects_out_of_range_days() {
        let provider = Arc::new(FakeProvider::new());
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/forecast?city=London&days=10").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "The days field must be between 1 and 5.");
        assert_eq!(body["error"]["days"][0], "The days field must be between 1 and 5.");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_city_failure_is_cached() {
        let provider = Arc::new(FakeProvider::new().with_current(Err((
            404,
            json!({"cod": "404", "message": "city not found"}),
        ))));
        let app = app(provider.clone());

        for _ in 0..2 {
            let (status, body) = get_json(&app, "/weather/current?city=Nonexistentville").await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(
                body,
                json!({
                    "success": false,
                    "message": "Unable to fetch weather data",
                    "error": {"cod": "404", "message": "city not found"}
                })
            );
        }

        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_coordinates_without_lon_never_reach_provider() {
        let provider = Arc::new(FakeProvider::new());
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/coordinates?lat=51.5").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "The lon field is required.");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_coordinates_lookup() {
        let provider = Arc::new(FakeProvider::new().with_current(Ok(json!({"name": "Paris"}))));
        let app = app(provider.clone());

        let (status, body) =
            get_json(&app, "/weather/coordinates?lat=48.85&lon=2.35&units=imperial").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Paris");
    }

    #[tokio::test]
    async fn test_current_requires_city() {
        let provider = Arc::new(FakeProvider::new());
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/current?units=kelvin").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["message"],
            "The city field is required. (and 1 more error)"
        );
        assert_eq!(body["error"]["units"][0], "The selected units is invalid.");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_overlong_city_is_rejected() {
        let provider = Arc::new(FakeProvider::new());
        let app = app(provider.clone());
        let uri = format!("/weather/current?city={}", "a".repeat(101));

        let (status, _) = get_json(&app, &uri).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_search() {
        let provider = Arc::new(FakeProvider::new().with_search(Ok(json!([
            {"name": "Springfield", "lat": 39.8, "lon": -89.6, "country": "US", "state": "Illinois"}
        ]))));
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/search?query=Springfield&limit=1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["state"], "Illinois");
        assert_eq!(body["data"][0]["country"], "US");
    }

    #[tokio::test]
    async fn test_malformed_forecast_is_bad_gateway() {
        let provider = Arc::new(FakeProvider::new().with_forecast(Ok(json!({"cod": "200"}))));
        let app = app(provider.clone());

        let (status, body) = get_json(&app, "/weather/forecast?city=London").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let app = app(Arc::new(FakeProvider::new()));
        let (status, body) = get_json(&app, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "Weather Relay API");
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_too_many_requests_and_retried() {
        let budget = Arc::new(crate::provider::ApiCallBudget::new(0));
        let provider = Arc::new(
            FakeProvider::new()
                .with_current(Ok(json!({"name": "London"})))
                .with_budget(Arc::clone(&budget)),
        );
        let cache = Arc::new(TtlCache::new());
        let weather_service = Arc::new(WeatherService::new(
            provider.clone(),
            Arc::clone(&cache),
            DEFAULT_TTL,
        ));
        let app = build_router(AppState {
            weather_service,
            cache,
            budget: Some(budget),
            metrics: None,
        });

        let (status, body) = get_json(&app, "/weather/current?city=London").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Daily provider call budget of 0 exhausted");

        let (_, health) = get_json(&app, "/health").await;
        assert_eq!(health["cached_entries"], 0);
        assert_eq!(health["provider_calls_remaining"], 0);
    }
}
