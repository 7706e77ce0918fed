// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and services.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::phone::CanonicalPhone;

/// Identifier of a message accepted by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Opaque sequential order identifier assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
}

/// The deferred follow-up messages sent after an order is placed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// "Your order is being prepared."
    Confirmation,
    /// "Your order is on its way."
    Dispatch,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 2] = [NotificationKind::Confirmation, NotificationKind::Dispatch];
}

/// How the customer pays on delivery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Pix,
}

/// A single cart line, embedded in the order snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CartItem {
    /// `unit_price * quantity`, unrounded. `None` if the product overflows.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Immutable cart and payment data captured at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub items: Vec<CartItem>,
    pub payment_method: PaymentMethod,
    /// Amount the customer will hand over, for cash payments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_for: Option<Decimal>,
}

/// Customer fields written by an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub phone: CanonicalPhone,
    pub name: String,
    pub address: String,
    pub reference: Option<String>,
}

/// A persisted customer, keyed by canonical phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub phone: CanonicalPhone,
    pub name: String,
    pub address: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order lifecycle as far as notifications are concerned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Cancelled,
}

/// A persisted order. Only the two sent flags and the status ever change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_phone: CanonicalPhone,
    pub snapshot: OrderSnapshot,
    pub status: OrderStatus,
    pub confirmation_sent: bool,
    pub dispatch_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Returns the sent flag for the given notification kind.
    pub fn is_sent(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Confirmation => self.confirmation_sent,
            NotificationKind::Dispatch => self.dispatch_sent,
        }
    }
}

/// A notification that was never attempted for an open order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub order_created_at: DateTime<Utc>,
}

/// Lifecycle events emitted by a messaging channel client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The client is (re)starting its session.
    Initializing,
    /// The client needs to be paired; carries the QR payload when known.
    PairingRequired(Option<String>),
    /// Pairing succeeded; session is authenticated but not yet synced.
    Authenticated,
    /// Authentication was rejected by the platform.
    AuthFailure(String),
    /// The client can deliver messages.
    Ready,
    /// The session dropped.
    Disconnected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn line_total_multiplies_price_by_quantity() {
        let item = CartItem {
            name: "Pastel".into(),
            unit_price: Decimal::new(550, 2),
            quantity: 3,
            note: None,
        };
        assert_eq!(item.line_total(), Some(Decimal::new(1650, 2)));
    }

    #[test]
    fn line_total_overflow_is_none() {
        let item = CartItem {
            name: "Pastel".into(),
            unit_price: Decimal::MAX,
            quantity: 2,
            note: None,
        };
        assert_eq!(item.line_total(), None);
    }

    #[test]
    fn notification_kind_string_forms() {
        assert_eq!(NotificationKind::Confirmation.to_string(), "confirmation");
        assert_eq!(
            NotificationKind::from_str("dispatch").unwrap(),
            NotificationKind::Dispatch
        );
        let json = serde_json::to_string(&NotificationKind::Dispatch).unwrap();
        assert_eq!(json, "\"dispatch\"");
    }

    #[test]
    fn payment_method_deserializes_snake_case() {
        let method: PaymentMethod = serde_json::from_str("\"pix\"").unwrap();
        assert_eq!(method, PaymentMethod::Pix);
        assert!(serde_json::from_str::<PaymentMethod>("\"cheque\"").is_err());
    }

    #[test]
    fn snapshot_json_omits_absent_optionals() {
        let snapshot = OrderSnapshot {
            items: vec![CartItem {
                name: "Coxinha".into(),
                unit_price: Decimal::new(700, 2),
                quantity: 1,
                note: None,
            }],
            payment_method: PaymentMethod::Card,
            change_for: None,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("note"));
        assert!(!json.contains("change_for"));
        let back: OrderSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
