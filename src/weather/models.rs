use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::cache::normalize_cache_key;

/// Measurement system requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
            Self::Standard => "standard",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            "standard" => Ok(Self::Standard),
            _ => Err(()),
        }
    }
}

/// A validated lookup, one per endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    City {
        name: String,
        units: Units,
    },
    Coordinates {
        lat: f64,
        lon: f64,
        units: Units,
    },
    Forecast {
        city: String,
        units: Units,
        days: u8,
    },
    SearchText {
        query: String,
        limit: u8,
    },
}

impl WeatherQuery {
    /// Short operation name used in logs and metrics
    pub fn operation(&self) -> &'static str {
        match self {
            Self::City { .. } => "current",
            Self::Coordinates { .. } => "current_geo",
            Self::Forecast { .. } => "forecast",
            Self::SearchText { .. } => "search",
        }
    }

    /// Deterministic cache fingerprint; equal normalized parameters give equal keys.
    ///
    /// Every shape has its own prefix and free text is never followed by
    /// another shape's prefix, so a city name cannot forge a coordinates key.
    pub fn cache_key(&self) -> String {
        match self {
            Self::City { name, units } => {
                format!("current_city_{}_{}", normalize_cache_key(name), units)
            }
            Self::Coordinates { lat, lon, units } => {
                format!(
                    "current_geo_{}_{}_{}",
                    coordinate_key(*lat),
                    coordinate_key(*lon),
                    units
                )
            }
            Self::Forecast { city, units, days } => {
                format!("forecast_{}_{}_{}", normalize_cache_key(city), units, days)
            }
            Self::SearchText { query, limit } => {
                format!("search_{}_{}", normalize_cache_key(query), limit)
            }
        }
    }
}

/// Fold `-0.0` into `0.0` so both spellings share a key
fn coordinate_key(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// A city match from the provider's direct geocoding endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}
