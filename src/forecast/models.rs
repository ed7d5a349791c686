use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// 5 day / 3 hour Forecast API Response (Internal)
// Only the fields the daily grouping reads are required; the rest are ignored
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ForecastPayload {
    pub city: ForecastCity,
    pub list: Vec<IntervalRecord>,
}

/// One 3-hour forecast sample
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalRecord {
    /// Provider-local timestamp, "YYYY-MM-DD HH:MM:SS"
    pub dt_txt: String,
    pub main: IntervalMain,
    pub weather: Vec<WeatherCondition>,
    pub wind: Wind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalMain {
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherCondition {
    pub id: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Wind {
    pub speed: f64,
    pub deg: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

// ============================================================================
// API Response Models (External - what we return to clients)
// ============================================================================

/// City block of the forecast, passed through from the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastCity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    /// Shift in seconds from UTC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastGrouped {
    pub city: ForecastCity,
    pub daily: Vec<DailySummary>,
}

/// All 3-hour samples sharing one calendar date.
///
/// `humidity`, `weather` and `wind` come from the first sample of the day,
/// not an average over the day.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailySummary {
    /// "YYYY-MM-DD"
    pub date: String,
    /// Full English weekday name
    pub day: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u32,
    pub weather: WeatherCondition,
    pub wind: Wind,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Period {
    /// "HH:MM"
    pub time: String,
    pub temp: f64,
    pub weather: WeatherCondition,
    pub wind_speed: f64,
}
