// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the order API.
//!
//! Handles GET /health, POST /api/customers/identify, POST /api/orders and
//! GET /api/customers/{phone}/orders.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use comanda_orders::{ChannelState, CustomerLookup, OrderRequest, OrderSummary, SubmittedOrder};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Default page size for order history.
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Request body for POST /api/customers/identify.
#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    pub phone: String,
}

/// Query string for GET /api/customers/{phone}/orders.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` while the channel is ready, `degraded` otherwise.
    pub status: &'static str,
    pub service: String,
    /// Binary version.
    pub version: String,
    pub channel: ChannelState,
    pub pending_notifications: usize,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let channel = state.service.gate().state();
    Json(HealthResponse {
        status: if channel == ChannelState::Ready {
            "ok"
        } else {
            "degraded"
        },
        service: state.health.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        channel,
        pending_notifications: state.service.scheduler().pending(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// POST /api/customers/identify
pub async fn post_identify(
    State(state): State<GatewayState>,
    Json(body): Json<IdentifyRequest>,
) -> Result<Json<CustomerLookup>, ApiError> {
    let lookup = state.service.identify_customer(&body.phone).await?;
    Ok(Json(lookup))
}

/// POST /api/orders
pub async fn post_order(
    State(state): State<GatewayState>,
    Json(body): Json<OrderRequest>,
) -> Result<(StatusCode, Json<SubmittedOrder>), ApiError> {
    let submitted = state.service.submit_order(body).await?;
    Ok((StatusCode::CREATED, Json(submitted)))
}

/// GET /api/customers/{phone}/orders
pub async fn get_history(
    State(state): State<GatewayState>,
    Path(phone): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = state.service.order_history(&phone, limit).await?;
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_request_deserializes() {
        let req: IdentifyRequest = serde_json::from_str(r#"{"phone": "(11) 99123-4567"}"#).unwrap();
        assert_eq!(req.phone, "(11) 99123-4567");
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok",
            service: "comanda".to_string(),
            version: "0.1.0".to_string(),
            channel: ChannelState::PairingPending,
            pending_notifications: 3,
            uptime_secs: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"channel\":\"pairing_pending\""));
        assert!(json.contains("\"uptime_secs\":42"));
    }
}
