// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite and the domain types.
//!
//! The canonical types live in `comanda-core::types` for use across adapter
//! trait boundaries. This module re-exports them and converts rows into them.

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;
use rust_decimal::Decimal;

use comanda_core::phone::{CanonicalPhone, normalize};
pub use comanda_core::types::{
    CartItem, Customer, NewCustomer, NotificationKind, Order, OrderId, OrderSnapshot, OrderStatus,
    PaymentMethod, PendingNotification,
};

/// Column list matching [`order_from_row`].
pub(crate) const ORDER_COLUMNS: &str = "id, customer_phone, items, payment_method, change_for, \
     status, confirmation_sent, dispatch_sent, created_at";

/// Column list matching [`customer_from_row`].
pub(crate) const CUSTOMER_COLUMNS: &str =
    "phone, name, address, reference, created_at, updated_at";

/// The `orders` column holding the sent flag for `kind`.
pub(crate) fn sent_column(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Confirmation => "confirmation_sent",
        NotificationKind::Dispatch => "dispatch_sent",
    }
}

fn conversion_err(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

fn phone_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<CanonicalPhone> {
    let raw: String = row.get(idx)?;
    normalize(&raw).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        phone: phone_column(row, 0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        reference: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let items_json: String = row.get(2)?;
    let items: Vec<CartItem> =
        serde_json::from_str(&items_json).map_err(|e| conversion_err(2, e))?;
    let change_for = row
        .get::<_, Option<String>>(4)?
        .map(|raw| Decimal::from_str(&raw).map_err(|e| conversion_err(4, e)))
        .transpose()?;

    Ok(Order {
        id: OrderId(row.get(0)?),
        customer_phone: phone_column(row, 1)?,
        snapshot: OrderSnapshot {
            items,
            payment_method: parse_column::<PaymentMethod>(row, 3)?,
            change_for,
        },
        status: parse_column::<OrderStatus>(row, 5)?,
        confirmation_sent: row.get(6)?,
        dispatch_sent: row.get(7)?,
        created_at: row.get(8)?,
    })
}
