// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`ComandaError`] onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use comanda_core::ComandaError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
    /// Whether the same request may succeed later.
    pub retryable: bool,
}

/// Handler error wrapper.
#[derive(Debug)]
pub struct ApiError(pub ComandaError);

impl From<ComandaError> for ApiError {
    fn from(err: ComandaError) -> Self {
        Self(err)
    }
}

/// HTTP status for each error category.
pub fn status_for(err: &ComandaError) -> StatusCode {
    match err {
        ComandaError::Validation(_) | ComandaError::InvalidPhone(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ComandaError::ChannelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ComandaError::ReceiptDelivery { .. } | ComandaError::Channel { .. } => {
            StatusCode::BAD_GATEWAY
        }
        ComandaError::NotFound(_) => StatusCode::NOT_FOUND,
        ComandaError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ComandaError::Storage { .. } | ComandaError::Config(_) | ComandaError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
