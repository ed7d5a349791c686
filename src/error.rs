use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Uniform response envelope returned by every weather endpoint.
///
/// Callers branch on `success`; the transport status is informative only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub error: Option<Value>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<Value>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error,
        }
    }

    /// 200 for a successful envelope, 422 for a failed one
    pub fn status_code(&self) -> StatusCode {
        if self.success {
            StatusCode::OK
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Trait for errors that can be converted to HTTP responses
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Optional structured detail placed in the envelope's `error` field
    fn detail(&self) -> Option<Value> {
        None
    }
}

/// Convert any HttpError into an Axum response
pub fn into_response<E: HttpError>(err: E) -> Response {
    let status = err.status_code();
    let message = err.to_string();

    if status.is_server_error() {
        tracing::error!(error = %message, status = %status, "API error");
    } else {
        tracing::warn!(error = %message, status = %status, "Request rejected");
    }

    (status, Json(Envelope::failure(message, err.detail()))).into_response()
}

/// Macro to implement IntoResponse for HttpError types
#[macro_export]
macro_rules! impl_into_response {
    ($error_type:ty) => {
        impl axum::response::IntoResponse for $error_type {
            fn into_response(self) -> axum::response::Response {
                $crate::error::into_response(self)
            }
        }
    };
}
