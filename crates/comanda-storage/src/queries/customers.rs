// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer upsert and lookup.

use chrono::Utc;
use comanda_core::ComandaError;
use comanda_core::phone::CanonicalPhone;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{CUSTOMER_COLUMNS, Customer, NewCustomer, customer_from_row};

/// Insert a customer, or overwrite name, address and reference of the
/// existing row with the same phone. `created_at` is kept on update.
pub async fn upsert_customer(
    db: &Database,
    customer: &NewCustomer,
) -> Result<Customer, ComandaError> {
    let customer = customer.clone();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "INSERT INTO customers (phone, name, address, reference, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(phone) DO UPDATE SET
                    name = excluded.name,
                    address = excluded.address,
                    reference = excluded.reference,
                    updated_at = excluded.updated_at
                 RETURNING {CUSTOMER_COLUMNS}"
            );
            conn.query_row(
                &sql,
                params![
                    customer.phone.as_str(),
                    customer.name,
                    customer.address,
                    customer.reference,
                    now,
                ],
                customer_from_row,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a customer by canonical phone.
pub async fn get_customer(
    db: &Database,
    phone: &CanonicalPhone,
) -> Result<Option<Customer>, ComandaError> {
    let phone = phone.clone();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE phone = ?1");
            conn.query_row(&sql, params![phone.as_str()], customer_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
