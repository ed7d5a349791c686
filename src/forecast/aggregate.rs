use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use super::models::{DailySummary, ForecastGrouped, ForecastPayload, IntervalRecord, Period};

const DT_TXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("Malformed forecast payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid forecast timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Forecast interval {0} has no weather condition")]
    MissingCondition(String),
}

/// Decode a raw forecast body and group its intervals into at most `max_days`
/// daily summaries.
pub fn summarize(body: Value, max_days: usize) -> Result<ForecastGrouped, AggregationError> {
    let payload: ForecastPayload = serde_json::from_value(body)
        .map_err(|e| AggregationError::MalformedPayload(e.to_string()))?;

    let daily = group_by_day(&payload.list, max_days)?;

    Ok(ForecastGrouped {
        city: payload.city,
        daily,
    })
}

/// Fold 3-hour interval records into per-date summaries.
///
/// Dates are taken from `dt_txt` as-is (provider-local, no timezone shift) and
/// emitted in the order they are first seen. Min/max temperatures span every
/// interval of a date; humidity, wind and condition are those of the date's
/// first interval. Only the first `max_days` dates are returned.
pub fn group_by_day(
    records: &[IntervalRecord],
    max_days: usize,
) -> Result<Vec<DailySummary>, AggregationError> {
    if max_days == 0 {
        return Ok(Vec::new());
    }

    let mut days: IndexMap<NaiveDate, DailySummary> = IndexMap::new();

    for record in records {
        let timestamp = NaiveDateTime::parse_from_str(&record.dt_txt, DT_TXT_FORMAT)
            .map_err(|_| AggregationError::InvalidTimestamp(record.dt_txt.clone()))?;
        let condition = record
            .weather
            .first()
            .ok_or_else(|| AggregationError::MissingCondition(record.dt_txt.clone()))?;

        let summary = days
            .entry(timestamp.date())
            .or_insert_with(|| DailySummary {
                date: timestamp.format("%Y-%m-%d").to_string(),
                day: timestamp.format("%A").to_string(),
                temp_min: record.main.temp_min,
                temp_max: record.main.temp_max,
                humidity: record.main.humidity,
                weather: condition.clone(),
                wind: record.wind.clone(),
                periods: Vec::new(),
            });

        summary.temp_min = summary.temp_min.min(record.main.temp_min);
        summary.temp_max = summary.temp_max.max(record.main.temp_max);
        summary.periods.push(Period {
            time: timestamp.format("%H:%M").to_string(),
            temp: record.main.temp,
            weather: condition.clone(),
            wind_speed: record.wind.speed,
        });
    }

    Ok(days.into_values().take(max_days).collect())
}
