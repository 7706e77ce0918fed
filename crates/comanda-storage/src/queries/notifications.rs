// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification attempt bookkeeping.
//!
//! A row in `notification_attempts` is the single permitted delivery attempt
//! for an `(order, kind)` pair. It is written before the send and never
//! removed, so a failed send stays missed across restarts.

use chrono::{DateTime, Utc};
use comanda_core::ComandaError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{NotificationKind, OrderId, PendingNotification, sent_column};

/// Reserve the delivery attempt for `(id, kind)`.
///
/// Inserts the attempt row only if the order is open, its flag for `kind`
/// is unset, and no attempt exists yet. Returns whether a row was inserted.
pub async fn claim_notification(
    db: &Database,
    id: OrderId,
    kind: NotificationKind,
) -> Result<bool, ComandaError> {
    let column = sent_column(kind);
    let kind = kind.to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "INSERT INTO notification_attempts (order_id, kind, claimed_at)
                 SELECT id, ?2, ?3 FROM orders
                 WHERE id = ?1 AND status = 'open' AND {column} = 0
                 ON CONFLICT(order_id, kind) DO NOTHING"
            );
            let inserted = conn.execute(&sql, params![id.0, kind, now])?;
            Ok(inserted == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store the failure reason on an existing attempt.
pub async fn record_failure(
    db: &Database,
    id: OrderId,
    kind: NotificationKind,
    reason: &str,
) -> Result<(), ComandaError> {
    let kind = kind.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE notification_attempts SET failure = ?3 WHERE order_id = ?1 AND kind = ?2",
                params![id.0, kind, reason],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Failure reason recorded for an attempt, if the attempt exists.
pub async fn attempt_failure(
    db: &Database,
    id: OrderId,
    kind: NotificationKind,
) -> Result<Option<Option<String>>, ComandaError> {
    use rusqlite::OptionalExtension;

    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT failure FROM notification_attempts WHERE order_id = ?1 AND kind = ?2",
                params![id.0, kind],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Notifications never attempted for open orders created at or after `since`.
///
/// Ordered by order id, confirmation before dispatch.
pub async fn pending_notifications(
    db: &Database,
    since: DateTime<Utc>,
) -> Result<Vec<PendingNotification>, ComandaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT o.id, k.kind, o.created_at
                 FROM orders o
                 CROSS JOIN (SELECT 'confirmation' AS kind UNION ALL SELECT 'dispatch') k
                 WHERE o.status = 'open'
                   AND o.created_at >= ?1
                   AND CASE k.kind
                         WHEN 'confirmation' THEN o.confirmation_sent
                         ELSE o.dispatch_sent
                       END = 0
                   AND NOT EXISTS (
                         SELECT 1 FROM notification_attempts a
                         WHERE a.order_id = o.id AND a.kind = k.kind)
                 ORDER BY o.id, k.kind",
            )?;
            let rows = stmt.query_map(params![since], |row| {
                let kind: String = row.get(1)?;
                let kind = kind.parse::<NotificationKind>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(PendingNotification {
                    order_id: OrderId(row.get(0)?),
                    kind,
                    order_created_at: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::customers::upsert_customer;
    use crate::queries::orders::{cancel_order, create_order, mark_sent};
    use crate::queries::test_support::{at, new_customer, phone, setup_db, snapshot};

    async fn order_at(db: &Database, minute: u32) -> OrderId {
        upsert_customer(db, &new_customer("11991234567", "Ana"))
            .await
            .unwrap();
        create_order(db, &phone("11991234567"), &snapshot(), at(minute))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn claim_succeeds_once_per_kind() {
        let (db, _dir) = setup_db().await;
        let id = order_at(&db, 0).await;

        assert!(claim_notification(&db, id, NotificationKind::Confirmation).await.unwrap());
        assert!(!claim_notification(&db, id, NotificationKind::Confirmation).await.unwrap());
        assert!(claim_notification(&db, id, NotificationKind::Dispatch).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claim_refused_for_sent_cancelled_or_missing_orders() {
        let (db, _dir) = setup_db().await;
        let sent = order_at(&db, 0).await;
        mark_sent(&db, sent, NotificationKind::Confirmation)
            .await
            .unwrap();
        assert!(!claim_notification(&db, sent, NotificationKind::Confirmation).await.unwrap());

        let cancelled = order_at(&db, 1).await;
        cancel_order(&db, cancelled).await.unwrap();
        assert!(!claim_notification(&db, cancelled, NotificationKind::Dispatch).await.unwrap());

        assert!(!claim_notification(&db, OrderId(999), NotificationKind::Dispatch).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failure_reason_is_recorded() {
        let (db, _dir) = setup_db().await;
        let id = order_at(&db, 0).await;
        assert_eq!(
            attempt_failure(&db, id, NotificationKind::Dispatch).await.unwrap(),
            None
        );

        claim_notification(&db, id, NotificationKind::Dispatch)
            .await
            .unwrap();
        assert_eq!(
            attempt_failure(&db, id, NotificationKind::Dispatch).await.unwrap(),
            Some(None)
        );

        record_failure(&db, id, NotificationKind::Dispatch, "bridge timeout")
            .await
            .unwrap();
        assert_eq!(
            attempt_failure(&db, id, NotificationKind::Dispatch).await.unwrap(),
            Some(Some("bridge timeout".to_string()))
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pending_excludes_sent_claimed_cancelled_and_stale() {
        let (db, _dir) = setup_db().await;
        let stale = order_at(&db, 0).await;
        let fresh = order_at(&db, 10).await;
        let half_done = order_at(&db, 11).await;
        let attempted = order_at(&db, 12).await;
        let cancelled = order_at(&db, 13).await;

        mark_sent(&db, half_done, NotificationKind::Confirmation)
            .await
            .unwrap();
        claim_notification(&db, attempted, NotificationKind::Confirmation)
            .await
            .unwrap();
        claim_notification(&db, attempted, NotificationKind::Dispatch)
            .await
            .unwrap();
        cancel_order(&db, cancelled).await.unwrap();

        let pending = pending_notifications(&db, at(5)).await.unwrap();
        let pairs: Vec<_> = pending.iter().map(|p| (p.order_id, p.kind)).collect();
        assert_eq!(
            pairs,
            vec![
                (fresh, NotificationKind::Confirmation),
                (fresh, NotificationKind::Dispatch),
                (half_done, NotificationKind::Dispatch),
            ]
        );
        assert_eq!(pending[0].order_created_at, at(10));
        assert!(!pairs.iter().any(|(id, _)| *id == stale));
        db.close().await.unwrap();
    }
}
