// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use comanda_config::model::GatewayConfig;
use comanda_core::ComandaError;
use comanda_orders::OrderService;

use crate::handlers;

/// Requests handled concurrently before new ones queue.
const MAX_IN_FLIGHT: usize = 256;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Service name reported by `/health`.
    pub service_name: String,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<OrderService>,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(service: Arc<OrderService>, service_name: impl Into<String>) -> Self {
        Self {
            service,
            health: HealthState {
                start_time: std::time::Instant::now(),
                service_name: service_name.into(),
            },
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, ComandaError> {
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| ComandaError::Config(format!("invalid CORS origin `{origin}`: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::permissive().allow_origin(AllowOrigin::list(origins)))
}

/// Build the gateway router.
///
/// - GET /health
/// - POST /api/customers/identify
/// - GET /api/customers/{phone}/orders
/// - POST /api/orders
pub fn router(state: GatewayState, config: &GatewayConfig) -> Result<Router, ComandaError> {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/customers/identify", post(handlers::post_identify))
        .route("/api/customers/{phone}/orders", get(handlers::get_history))
        .route("/api/orders", post(handlers::post_order))
        .with_state(state);

    Ok(Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins)?))
}

/// Start the gateway HTTP server.
///
/// Binds to the configured host:port and serves until `shutdown` is
/// cancelled, letting in-flight requests finish.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), ComandaError> {
    let app = router(state, config)?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ComandaError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ComandaError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_origin_list_is_permissive() {
        assert!(cors_layer(&[]).is_ok());
    }

    #[test]
    fn configured_origins_are_parsed() {
        assert!(cors_layer(&["https://pedidos.example.com".to_string()]).is_ok());
    }

    #[test]
    fn invalid_origin_is_a_config_error() {
        let err = cors_layer(&["bad\norigin".to_string()]).unwrap_err();
        assert!(matches!(err, ComandaError::Config(_)));
    }
}
