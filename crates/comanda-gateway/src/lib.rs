// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway exposing the order service as a JSON API.
//!
//! The gateway holds no business logic: every handler delegates to
//! [`comanda_orders::OrderService`] and maps its errors onto status codes.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, HealthState, router, start_server};
