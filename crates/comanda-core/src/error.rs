// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Comanda order backend.

use thiserror::Error;

use crate::types::OrderId;

/// The primary error type used across all Comanda adapter traits and services.
#[derive(Debug, Error)]
pub enum ComandaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected input: empty cart, missing name or address, bad amounts.
    #[error("validation error: {0}")]
    Validation(String),

    /// Phone input that does not resolve to a canonical channel address.
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    /// The messaging channel is not ready to accept orders.
    #[error("messaging channel temporarily unavailable (state: {state})")]
    ChannelUnavailable { state: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (bridge unreachable, recipient rejected).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The immediate receipt for a freshly created order could not be delivered.
    #[error("order {order_id} receipt could not be delivered: {message}")]
    ReceiptDelivery { order_id: OrderId, message: String },

    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ComandaError {
    /// Wraps any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Whether the client may resubmit the same request later.
    ///
    /// Channel unavailability and storage failures are transient; input
    /// errors will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChannelUnavailable { .. }
                | Self::Storage { .. }
                | Self::Timeout { .. }
                | Self::ReceiptDelivery { .. }
        )
    }
}
