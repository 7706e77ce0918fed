// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order creation, lookup, history, and the sent-flag transition.

use chrono::{DateTime, Utc};
use comanda_core::ComandaError;
use comanda_core::phone::CanonicalPhone;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{
    NotificationKind, ORDER_COLUMNS, Order, OrderId, OrderSnapshot, order_from_row, sent_column,
};

/// Insert a new open order. The customer row must already exist.
pub async fn create_order(
    db: &Database,
    phone: &CanonicalPhone,
    snapshot: &OrderSnapshot,
    created_at: DateTime<Utc>,
) -> Result<OrderId, ComandaError> {
    let phone = phone.clone();
    let items = serde_json::to_string(&snapshot.items).map_err(ComandaError::storage)?;
    let payment_method = snapshot.payment_method.to_string();
    let change_for = snapshot.change_for.map(|amount| amount.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO orders (customer_phone, items, payment_method, change_for, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![phone.as_str(), items, payment_method, change_for, created_at],
            )?;
            Ok(OrderId(conn.last_insert_rowid()))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an order by id.
pub async fn get_order(db: &Database, id: OrderId) -> Result<Option<Order>, ComandaError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
            conn.query_row(&sql, params![id.0], order_from_row).optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Orders of one customer, newest first.
pub async fn history(
    db: &Database,
    phone: &CanonicalPhone,
    limit: usize,
) -> Result<Vec<Order>, ComandaError> {
    let phone = phone.clone();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {ORDER_COLUMNS} FROM orders
                 WHERE customer_phone = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![phone.as_str(), limit], order_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set the sent flag for `kind` if it is still unset.
///
/// A single conditional `UPDATE`: of any number of concurrent callers for
/// the same order and kind, exactly one sees a changed row.
pub async fn mark_sent(
    db: &Database,
    id: OrderId,
    kind: NotificationKind,
) -> Result<bool, ComandaError> {
    let column = sent_column(kind);
    db.connection()
        .call(move |conn| {
            let sql = format!("UPDATE orders SET {column} = 1 WHERE id = ?1 AND {column} = 0");
            let changed = conn.execute(&sql, params![id.0])?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move an open order to `cancelled`.
pub async fn cancel_order(db: &Database, id: OrderId) -> Result<bool, ComandaError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE orders SET status = 'cancelled' WHERE id = ?1 AND status = 'open'",
                params![id.0],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::customers::upsert_customer;
    use crate::queries::test_support::{at, new_customer, phone, setup_db, snapshot};
    use comanda_core::types::OrderStatus;

    #[tokio::test]
    async fn create_and_get_order_roundtrips() {
        let (db, _dir) = setup_db().await;
        upsert_customer(&db, &new_customer("11991234567", "Ana"))
            .await
            .unwrap();

        let id = create_order(&db, &phone("11991234567"), &snapshot(), at(0))
            .await
            .unwrap();
        let order = get_order(&db, id).await.unwrap().expect("order exists");

        assert_eq!(order.id, id);
        assert_eq!(order.customer_phone.as_str(), "551191234567");
        assert_eq!(order.snapshot, snapshot());
        assert_eq!(order.status, OrderStatus::Open);
        assert!(!order.confirmation_sent);
        assert!(!order.dispatch_sent);
        assert_eq!(order.created_at, at(0));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn order_ids_are_sequential() {
        let (db, _dir) = setup_db().await;
        upsert_customer(&db, &new_customer("11991234567", "Ana"))
            .await
            .unwrap();
        let p = phone("11991234567");
        let first = create_order(&db, &p, &snapshot(), at(0)).await.unwrap();
        let second = create_order(&db, &p, &snapshot(), at(1)).await.unwrap();
        assert!(second > first);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_order_without_customer_fails() {
        let (db, _dir) = setup_db().await;
        let result = create_order(&db, &phone("11991234567"), &snapshot(), at(0)).await;
        assert!(matches!(result, Err(ComandaError::Storage { .. })));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_order_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_order(&db, OrderId(404)).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn history_is_newest_first_and_scoped_to_phone() {
        let (db, _dir) = setup_db().await;
        upsert_customer(&db, &new_customer("11991234567", "Ana"))
            .await
            .unwrap();
        upsert_customer(&db, &new_customer("21 3456-7890", "Bruno"))
            .await
            .unwrap();
        let ana = phone("11991234567");
        let bruno = phone("21 3456-7890");

        let a1 = create_order(&db, &ana, &snapshot(), at(0)).await.unwrap();
        let b1 = create_order(&db, &bruno, &snapshot(), at(1)).await.unwrap();
        let a2 = create_order(&db, &ana, &snapshot(), at(2)).await.unwrap();
        let a3 = create_order(&db, &ana, &snapshot(), at(3)).await.unwrap();

        let ids: Vec<_> = history(&db, &ana, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![a3, a2, a1]);

        let limited = history(&db, &ana, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, a3);

        let bruno_orders = history(&db, &bruno, 10).await.unwrap();
        assert_eq!(bruno_orders.len(), 1);
        assert_eq!(bruno_orders[0].id, b1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_sent_transitions_once_per_kind() {
        let (db, _dir) = setup_db().await;
        upsert_customer(&db, &new_customer("11991234567", "Ana"))
            .await
            .unwrap();
        let id = create_order(&db, &phone("11991234567"), &snapshot(), at(0))
            .await
            .unwrap();

        assert!(mark_sent(&db, id, NotificationKind::Confirmation).await.unwrap());
        assert!(!mark_sent(&db, id, NotificationKind::Confirmation).await.unwrap());
        assert!(mark_sent(&db, id, NotificationKind::Dispatch).await.unwrap());

        let order = get_order(&db, id).await.unwrap().unwrap();
        assert!(order.confirmation_sent);
        assert!(order.dispatch_sent);
        assert_eq!(order.snapshot, snapshot(), "snapshot never changes");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_sent_on_missing_order_is_false() {
        let (db, _dir) = setup_db().await;
        assert!(
            !mark_sent(&db, OrderId(9), NotificationKind::Dispatch)
                .await
                .unwrap()
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_only_affects_open_orders() {
        let (db, _dir) = setup_db().await;
        upsert_customer(&db, &new_customer("11991234567", "Ana"))
            .await
            .unwrap();
        let id = create_order(&db, &phone("11991234567"), &snapshot(), at(0))
            .await
            .unwrap();

        assert!(cancel_order(&db, id).await.unwrap());
        assert!(!cancel_order(&db, id).await.unwrap());
        let order = get_order(&db, id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        db.close().await.unwrap();
    }
}
