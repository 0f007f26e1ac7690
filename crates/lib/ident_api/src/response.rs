//! Shared response envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Body of every API response, success or error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status_code: u16,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// A successful response: HTTP status plus envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    description: String,
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, "OK", data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, "Created", data)
    }

    pub fn with_status(status: StatusCode, description: &str, data: T) -> Self {
        Self {
            status,
            description: description.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Envelope without a `data` field.
    pub fn message(status: StatusCode, description: &str) -> Self {
        Self {
            status,
            description: description.to_string(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            status_code: self.status.as_u16(),
            description: self.description,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}
