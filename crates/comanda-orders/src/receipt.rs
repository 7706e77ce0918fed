// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Receipt rendering.
//!
//! Pure and deterministic: the same order, customer and `now` always yield
//! the same text. All money is `Decimal`, rounded half away from zero to two
//! places at every step (line totals, subtotal, total, change).

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use comanda_config::model::ReceiptConfig;
use comanda_core::types::{CartItem, Customer, Order, OrderSnapshot, PaymentMethod};
use comanda_core::ComandaError;

/// Round to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The money figures printed on a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiptTotals {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    /// `change_for - total` for cash orders that state an amount; may be negative.
    pub change: Option<Decimal>,
}

/// Turns orders into the text receipt sent to the customer.
#[derive(Debug, Clone)]
pub struct ReceiptRenderer {
    business_name: String,
    delivery_fee: Decimal,
    offset: FixedOffset,
}

impl ReceiptRenderer {
    pub fn new(config: &ReceiptConfig) -> Result<Self, ComandaError> {
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).ok_or_else(|| {
            ComandaError::Config(format!(
                "receipt.utc_offset_hours out of range: {}",
                config.utc_offset_hours
            ))
        })?;
        Ok(Self {
            business_name: config.business_name.clone(),
            delivery_fee: round_money(config.delivery_fee),
            offset,
        })
    }

    pub fn delivery_fee(&self) -> Decimal {
        self.delivery_fee
    }

    /// Subtotal, fee, total and change for a snapshot.
    ///
    /// Fails with a validation error when any figure overflows `Decimal`.
    pub fn totals(&self, snapshot: &OrderSnapshot) -> Result<ReceiptTotals, ComandaError> {
        let mut subtotal = Decimal::ZERO;
        for item in &snapshot.items {
            subtotal = subtotal
                .checked_add(line_total(item)?)
                .ok_or_else(out_of_range)?;
        }
        let total = subtotal
            .checked_add(self.delivery_fee)
            .ok_or_else(out_of_range)?;
        let change = match (snapshot.payment_method, snapshot.change_for) {
            (PaymentMethod::Cash, Some(given)) => Some(
                round_money(given)
                    .checked_sub(total)
                    .ok_or_else(out_of_range)?,
            ),
            _ => None,
        };
        Ok(ReceiptTotals {
            subtotal,
            delivery_fee: self.delivery_fee,
            total,
            change,
        })
    }

    /// Render the receipt for `order`, stamped with `now` in the configured offset.
    pub fn render(
        &self,
        order: &Order,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> Result<String, ComandaError> {
        let snapshot = &order.snapshot;
        let totals = self.totals(snapshot)?;
        let stamp = now.with_timezone(&self.offset).format("%d/%m/%Y %H:%M");

        // Writing into a String cannot fail.
        let mut out = String::new();
        let _ = writeln!(out, "*{}*", self.business_name);
        let _ = writeln!(out, "Pedido #{} - {stamp}", order.id);
        let _ = writeln!(out, "Cliente: {}", customer.name);
        let _ = writeln!(out, "Endereço: {}", customer.address);
        if let Some(reference) = customer.reference.as_deref().filter(|r| !r.trim().is_empty()) {
            let _ = writeln!(out, "Referência: {reference}");
        }
        out.push('\n');

        for item in &snapshot.items {
            let _ = writeln!(
                out,
                "{}x {} - R$ {:.2}",
                item.quantity,
                item.name,
                line_total(item)?
            );
            if let Some(note) = item.note.as_deref().filter(|n| !n.trim().is_empty()) {
                let _ = writeln!(out, "   Obs: {note}");
            }
        }
        out.push('\n');

        let _ = writeln!(out, "Subtotal: R$ {:.2}", totals.subtotal);
        let _ = writeln!(out, "Entrega: R$ {:.2}", totals.delivery_fee);
        let _ = writeln!(out, "Total: R$ {:.2}", totals.total);
        let _ = write!(out, "Pagamento: {}", payment_label(snapshot.payment_method));
        if let (Some(given), Some(change)) = (snapshot.change_for, totals.change) {
            let _ = write!(
                out,
                "\nTroco para: R$ {:.2}\nTroco: R$ {:.2}",
                round_money(given),
                change
            );
        }
        Ok(out)
    }
}

/// Rounded line total of one cart item.
fn line_total(item: &CartItem) -> Result<Decimal, ComandaError> {
    item.line_total().map(round_money).ok_or_else(out_of_range)
}

fn out_of_range() -> ComandaError {
    ComandaError::Validation("order total out of range".into())
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Dinheiro",
        PaymentMethod::Card => "Cartão",
        PaymentMethod::Pix => "Pix",
    }
}
