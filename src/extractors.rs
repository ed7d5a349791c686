use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, StatusCode},
};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::HttpError;
use crate::impl_into_response;
use crate::weather::models::Units;

/// Query string extractor whose rejection is a 422 validation envelope
/// instead of axum's plain-text 400.
#[derive(Debug)]
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ValidationError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(params)) => Ok(Params(params)),
            Err(rejection) => {
                let mut errors = Validator::new();
                errors.add("query", rejection.body_text());
                Err(errors.into_error())
            }
        }
    }
}

/// Every failed rule, keyed by parameter name in the order checked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationError {
    errors: IndexMap<&'static str, Vec<String>>,
}

impl ValidationError {
    fn count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self
            .errors
            .values()
            .flatten()
            .next()
            .map(String::as_str)
            .unwrap_or("The given data was invalid.");
        f.write_str(first)?;

        match self.count() {
            0 | 1 => Ok(()),
            2 => f.write_str(" (and 1 more error)"),
            n => write!(f, " (and {} more errors)", n - 1),
        }
    }
}

impl std::error::Error for ValidationError {}

impl HttpError for ValidationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }

    fn detail(&self) -> Option<Value> {
        serde_json::to_value(&self.errors).ok()
    }
}

impl_into_response!(ValidationError);

/// Collects rule failures for one request
#[derive(Debug, Default)]
pub struct Validator {
    error: ValidationError,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.error
            .errors
            .entry(field)
            .or_default()
            .push(message.into());
    }

    /// Trimmed non-blank string of at most `max_chars` characters
    pub fn required_string(
        &mut self,
        field: &'static str,
        value: Option<String>,
        max_chars: usize,
    ) -> Option<String> {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let Some(value) = value else {
            self.add(field, format!("The {} field is required.", field));
            return None;
        };

        if value.chars().count() > max_chars {
            self.add(
                field,
                format!(
                    "The {} field must not be greater than {} characters.",
                    field, max_chars
                ),
            );
            return None;
        }

        Some(value)
    }

    /// Finite number
    pub fn required_number(&mut self, field: &'static str, value: Option<String>) -> Option<f64> {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let Some(value) = value else {
            self.add(field, format!("The {} field is required.", field));
            return None;
        };

        match value.parse::<f64>() {
            Ok(number) if number.is_finite() => Some(number),
            _ => {
                self.add(field, format!("The {} field must be a number.", field));
                None
            }
        }
    }

    /// Integer within `range`, or `default` when absent
    pub fn optional_integer(
        &mut self,
        field: &'static str,
        value: Option<String>,
        range: RangeInclusive<u8>,
        default: u8,
    ) -> u8 {
        let Some(value) = value else {
            return default;
        };

        let Ok(number) = value.trim().parse::<i64>() else {
            self.add(field, format!("The {} field must be an integer.", field));
            return default;
        };

        match u8::try_from(number) {
            Ok(n) if range.contains(&n) => n,
            _ => {
                self.add(
                    field,
                    format!(
                        "The {} field must be between {} and {}.",
                        field,
                        range.start(),
                        range.end()
                    ),
                );
                default
            }
        }
    }

    /// One of the supported unit systems, or metric when absent
    pub fn optional_units(&mut self, value: Option<String>) -> Units {
        match value {
            None => Units::default(),
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                self.add("units", "The selected units is invalid.");
                Units::default()
            }),
        }
    }

    /// `Ok(value)` when no rule failed
    pub fn finish<T>(self, value: impl FnOnce() -> Option<T>) -> Result<T, ValidationError> {
        if !self.error.errors.is_empty() {
            return Err(self.error);
        }
        value().ok_or_else(|| {
            let mut errors = Validator::new();
            errors.add("query", "The given data was invalid.");
            errors.into_error()
        })
    }

    fn into_error(self) -> ValidationError {
        self.error
    }
}
