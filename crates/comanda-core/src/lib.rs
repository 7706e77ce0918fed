// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Comanda order backend.
//!
//! This crate provides the adapter trait definitions, the error type, the
//! domain types and the phone normalizer used throughout the workspace.

pub mod error;
pub mod phone;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ComandaError;
pub use phone::{CanonicalPhone, InvalidPhone, normalize};
pub use types::{
    AdapterType, CartItem, ChannelEvent, Customer, HealthStatus, MessageId, NewCustomer,
    NotificationKind, Order, OrderId, OrderSnapshot, OrderStatus, PaymentMethod,
    PendingNotification,
};

pub use traits::{ChannelAdapter, PluginAdapter, StorageAdapter};
