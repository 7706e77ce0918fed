// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound operations: customer identification, order submission and history.
//!
//! Submission runs gate -> validate -> upsert customer -> create order ->
//! render receipt -> send receipt -> arm notifications. Nothing is persisted
//! when the gate is closed or the input is invalid. If the receipt cannot be
//! delivered the order is cancelled and the caller gets
//! [`ComandaError::ReceiptDelivery`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use comanda_core::types::{
    CartItem, Customer, NewCustomer, Order, OrderId, OrderSnapshot, OrderStatus, PaymentMethod,
};
use comanda_core::{ChannelAdapter, ComandaError, StorageAdapter, normalize};

use crate::gate::ReadinessGate;
use crate::receipt::{ReceiptRenderer, ReceiptTotals};
use crate::scheduler::NotificationScheduler;

/// Largest history page handed out.
pub const MAX_HISTORY: usize = 50;

/// Result of [`OrderService::identify_customer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerLookup {
    pub is_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
}

/// Raw order payload as received from the web form.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    pub phone: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub change_for: Option<Decimal>,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedOrder {
    pub order_id: OrderId,
    pub totals: ReceiptTotals,
}

/// An order from the history with its computed totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub totals: ReceiptTotals,
}

struct Validated {
    customer: NewCustomer,
    snapshot: OrderSnapshot,
}

/// The order-taking surface, independent of transport.
pub struct OrderService {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    channel: Arc<dyn ChannelAdapter + Send + Sync>,
    gate: Arc<ReadinessGate>,
    scheduler: NotificationScheduler,
    receipts: ReceiptRenderer,
    send_timeout: Duration,
}

impl OrderService {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        gate: Arc<ReadinessGate>,
        scheduler: NotificationScheduler,
        receipts: ReceiptRenderer,
    ) -> Self {
        let send_timeout = scheduler.config().send_timeout();
        Self {
            storage,
            channel,
            gate,
            scheduler,
            receipts,
            send_timeout,
        }
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    /// Looks up a customer by free-form phone. Gated on channel readiness.
    pub async fn identify_customer(&self, raw_phone: &str) -> Result<CustomerLookup, ComandaError> {
        self.gate.ensure_ready()?;
        let phone = normalize(raw_phone)?;
        let customer = self.storage.get_customer(&phone).await?;
        Ok(CustomerLookup {
            is_new: customer.is_none(),
            customer,
        })
    }

    /// Persists an order, sends its receipt and arms its follow-up notifications.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<SubmittedOrder, ComandaError> {
        self.gate.ensure_ready()?;
        let Validated { customer, snapshot } = validate(request)?;
        let totals = self.receipts.totals(&snapshot)?;

        let customer = self.storage.upsert_customer(&customer).await?;
        let created_at = Utc::now();
        let order_id = self
            .storage
            .create_order(&customer.phone, &snapshot, created_at)
            .await?;

        let order = Order {
            id: order_id,
            customer_phone: customer.phone.clone(),
            snapshot,
            status: OrderStatus::Open,
            confirmation_sent: false,
            dispatch_sent: false,
            created_at,
        };
        let sent = match self.receipts.render(&order, &customer, created_at) {
            Ok(receipt) => match tokio::time::timeout(
                self.send_timeout,
                self.channel.send(&customer.phone, &receipt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ComandaError::Timeout {
                    duration: self.send_timeout,
                }),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!(order_id = %order_id, error = %e, "receipt not delivered, cancelling order");
            if let Err(cancel_err) = self.storage.cancel_order(order_id).await {
                warn!(order_id = %order_id, error = %cancel_err, "could not cancel undelivered order");
            }
            return Err(ComandaError::ReceiptDelivery {
                order_id,
                message: e.to_string(),
            });
        }

        self.scheduler.schedule_order(order_id, created_at);
        info!(
            order_id = %order_id,
            phone = %customer.phone,
            total = %totals.total,
            "order submitted"
        );
        Ok(SubmittedOrder { order_id, totals })
    }

    /// Orders placed under `raw_phone`, newest first.
    pub async fn order_history(
        &self,
        raw_phone: &str,
        limit: usize,
    ) -> Result<Vec<OrderSummary>, ComandaError> {
        let phone = normalize(raw_phone)?;
        let orders = self
            .storage
            .history(&phone, limit.clamp(1, MAX_HISTORY))
            .await?;
        orders
            .into_iter()
            .map(|order| -> Result<OrderSummary, ComandaError> {
                let totals = self.receipts.totals(&order.snapshot)?;
                Ok(OrderSummary { totals, order })
            })
            .collect()
    }

    /// Cancels an open order and drops its pending notifications.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<bool, ComandaError> {
        let cancelled = self.storage.cancel_order(order_id).await?;
        let dropped = self.scheduler.cancel(order_id);
        if cancelled {
            info!(order_id = %order_id, dropped, "order cancelled");
        }
        Ok(cancelled)
    }
}

fn required(field: &str, value: String) -> Result<String, ComandaError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ComandaError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate(request: OrderRequest) -> Result<Validated, ComandaError> {
    let phone = normalize(&request.phone)?;
    let name = required("name", request.name)?;
    let address = required("address", request.address)?;
    let reference = request
        .reference
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    if request.items.is_empty() {
        return Err(ComandaError::Validation("cart is empty".into()));
    }
    let mut items = Vec::with_capacity(request.items.len());
    for item in request.items {
        let item_name = required("item name", item.name)?;
        if item.quantity == 0 {
            return Err(ComandaError::Validation(format!(
                "quantity of `{item_name}` must be at least 1"
            )));
        }
        if item.unit_price.is_sign_negative() {
            return Err(ComandaError::Validation(format!(
                "price of `{item_name}` must not be negative"
            )));
        }
        items.push(CartItem {
            name: item_name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            note: item.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        });
    }

    let payment_method = request
        .payment_method
        .ok_or_else(|| ComandaError::Validation("payment method is required".into()))?;
    let change_for = match (payment_method, request.change_for) {
        (PaymentMethod::Cash, Some(amount)) if amount.is_sign_negative() => {
            return Err(ComandaError::Validation(
                "change_for must not be negative".into(),
            ));
        }
        (PaymentMethod::Cash, amount) => amount,
        _ => None,
    };

    Ok(Validated {
        customer: NewCustomer {
            phone,
            name,
            address,
            reference,
        },
        snapshot: OrderSnapshot {
            items,
            payment_method,
            change_for,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OrderRequest {
        OrderRequest {
            phone: "(11) 99123-4567".into(),
            name: "  Test ".into(),
            address: "Rua A, 1".into(),
            reference: Some("   ".into()),
            items: vec![CartItem {
                name: "Pastel".into(),
                unit_price: Decimal::new(1000, 2),
                quantity: 2,
                note: Some(" sem cebola ".into()),
            }],
            payment_method: Some(PaymentMethod::Cash),
            change_for: Some(Decimal::new(5000, 2)),
        }
    }

    fn validation_message(request: OrderRequest) -> String {
        match validate(request) {
            Err(ComandaError::Validation(message)) => message,
            Err(other) => panic!("expected validation error, got {other}"),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[test]
    fn valid_request_is_normalized() {
        let validated = validate(request()).unwrap();
        assert_eq!(validated.customer.phone.as_str(), "551191234567");
        assert_eq!(validated.customer.name, "Test");
        assert_eq!(validated.customer.reference, None);
        assert_eq!(validated.snapshot.items[0].note.as_deref(), Some("sem cebola"));
        assert_eq!(validated.snapshot.change_for, Some(Decimal::new(5000, 2)));
    }

    #[test]
    fn rejects_bad_phone() {
        let mut req = request();
        req.phone = "123".into();
        assert!(matches!(validate(req), Err(ComandaError::InvalidPhone(_))));
    }

    #[test]
    fn rejects_empty_cart() {
        let mut req = request();
        req.items.clear();
        assert_eq!(validation_message(req), "cart is empty");
    }

    #[test]
    fn rejects_missing_payment_method() {
        let mut req = request();
        req.payment_method = None;
        assert_eq!(validation_message(req), "payment method is required");
    }

    #[test]
    fn rejects_blank_name_and_address() {
        let mut req = request();
        req.name = " ".into();
        assert_eq!(validation_message(req), "name is required");
        let mut req = request();
        req.address = String::new();
        assert_eq!(validation_message(req), "address is required");
    }

    #[test]
    fn rejects_zero_quantity_and_negative_price() {
        let mut req = request();
        req.items[0].quantity = 0;
        assert!(validation_message(req).contains("quantity"));
        let mut req = request();
        req.items[0].unit_price = Decimal::new(-1, 0);
        assert!(validation_message(req).contains("price"));
    }

    #[test]
    fn change_for_dropped_for_card_and_rejected_when_negative() {
        let mut req = request();
        req.payment_method = Some(PaymentMethod::Card);
        assert_eq!(validate(req).unwrap().snapshot.change_for, None);

        let mut req = request();
        req.change_for = Some(Decimal::new(-5, 0));
        assert!(validation_message(req).contains("change_for"));
    }

    #[test]
    fn request_deserializes_from_form_json() {
        let json = r#"{
            "phone": "11991234567",
            "name": "Test",
            "address": "Rua A",
            "items": [{"name": "Pastel", "unit_price": "10.00", "quantity": 2}],
            "payment_method": "pix"
        }"#;
        let req: OrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.payment_method, Some(PaymentMethod::Pix));
        assert_eq!(req.items[0].unit_price, Decimal::new(1000, 2));
        assert!(req.reference.is_none());
    }
}
