// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete order pipeline.
//!
//! Each test builds an isolated TestHarness over a temp SQLite database and a
//! mock channel. Delays are shortened to seconds and real time is used, since
//! SQLite calls run on their own thread.

use std::time::Duration;

use chrono::Utc;
use comanda_core::types::{NotificationKind, OrderStatus};
use comanda_core::{StorageAdapter, normalize};
use comanda_orders::NotificationTask;
use comanda_storage::SqliteStorage;
use comanda_test_utils::TestHarness;

const PREPARING: &str = "sendo preparado";
const DISPATCHED: &str = "saiu para entrega";
const WAIT: Duration = Duration::from_secs(10);

async fn fast_harness(dispatch_delay_secs: u64) -> TestHarness {
    TestHarness::builder()
        .with_config(|config| {
            config.notifications.confirmation_delay_secs = 1;
            config.notifications.dispatch_delay_secs = dispatch_delay_secs;
            config.notifications.send_timeout_secs = 5;
        })
        .build()
        .await
        .unwrap()
}

async fn wait_for_sent(harness: &TestHarness, count: usize) {
    tokio::time::timeout(WAIT, harness.channel.wait_for_sent(count))
        .await
        .unwrap_or_else(|_| panic!("expected {count} sent messages within {WAIT:?}"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn order_receipt_and_both_notifications_are_delivered_once() {
    let harness = fast_harness(2).await;

    let submitted = harness
        .service
        .submit_order(TestHarness::order_request("11991234567"))
        .await
        .unwrap();

    let sent = harness.channel.sent_messages().await;
    assert_eq!(sent.len(), 1, "receipt is sent synchronously");
    assert_eq!(sent[0].to.as_str(), "551191234567");
    assert!(sent[0].text.contains(&format!("Pedido #{}", submitted.order_id)));
    assert!(sent[0].text.contains("Total: R$ 30.50"));

    wait_for_sent(&harness, 3).await;
    assert_eq!(harness.channel.sent_containing(PREPARING).await, 1);
    assert_eq!(harness.channel.sent_containing(DISPATCHED).await, 1);

    let order = harness
        .storage
        .get_order(submitted.order_id)
        .await
        .unwrap()
        .unwrap();
    assert!(order.confirmation_sent);
    assert!(order.dispatch_sent);

    // A duplicate timer for an already delivered notification sends nothing.
    harness.scheduler.schedule(NotificationTask::for_order(
        order.id,
        NotificationKind::Confirmation,
        order.created_at,
        harness.scheduler.config(),
    ));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.channel.sent_containing(PREPARING).await, 1);
    assert_eq!(harness.channel.sent_count().await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_rearms_only_what_was_not_sent() {
    let harness = fast_harness(3).await;

    let submitted = harness
        .service
        .submit_order(TestHarness::order_request("(11) 99123-4567"))
        .await
        .unwrap();
    wait_for_sent(&harness, 2).await;
    assert_eq!(harness.channel.sent_containing(PREPARING).await, 1);

    // Process stops before the dispatch timer fires.
    harness.scheduler.shutdown().await;
    assert_eq!(harness.scheduler.pending(), 0);

    // Downtime lasts past the dispatch due time.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(harness.channel.sent_containing(DISPATCHED).await, 0);

    let restarted = harness.restarted_scheduler();
    let rearmed = restarted.rearm(Utc::now()).await.unwrap();
    assert_eq!(rearmed, 1, "only the dispatch is still pending");

    // Overdue, so it fires right away.
    wait_for_sent(&harness, 3).await;
    assert_eq!(harness.channel.sent_containing(PREPARING).await, 1);
    assert_eq!(harness.channel.sent_containing(DISPATCHED).await, 1);

    let order = harness
        .storage
        .get_order(submitted.order_id)
        .await
        .unwrap()
        .unwrap();
    assert!(order.dispatch_sent);

    // A second restart finds nothing left to do.
    restarted.shutdown().await;
    let again = harness.restarted_scheduler();
    assert_eq!(again.rearm(Utc::now()).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_receipt_never_produces_follow_ups() {
    let harness = fast_harness(2).await;
    harness.channel.fail_next_send("bridge offline").await;

    let err = harness
        .service
        .submit_order(TestHarness::order_request("11991234567"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bridge offline"), "got: {err}");

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(harness.channel.sent_count().await, 0);

    let phone = normalize("11991234567").unwrap();
    let history = harness.storage.history(&phone, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Cancelled);
    assert!(!history[0].confirmation_sent);
}

#[tokio::test]
async fn data_survives_reopening_the_database() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .service
        .submit_order(TestHarness::order_request("11991234567"))
        .await
        .unwrap();
    harness.scheduler.shutdown().await;
    harness.storage.close().await.unwrap();

    let reopened = SqliteStorage::new(harness.config.storage.clone());
    reopened.initialize().await.unwrap();

    let phone = normalize("+55 11 9 9123-4567").unwrap();
    let customer = reopened.get_customer(&phone).await.unwrap().unwrap();
    assert_eq!(customer.name, "Test");
    let history = reopened.history(&phone, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].snapshot.items.len(), 2);

    let pending = reopened
        .pending_notifications(Utc::now() - chrono::TimeDelta::hours(1))
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn history_totals_match_the_receipt() {
    let harness = TestHarness::builder().build().await.unwrap();
    let submitted = harness
        .service
        .submit_order(TestHarness::order_request("11991234567"))
        .await
        .unwrap();

    let history = harness
        .service
        .order_history("11 99123-4567", 5)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order.id, submitted.order_id);
    assert_eq!(history[0].totals, submitted.totals);
    assert_eq!(
        history[0].totals.total,
        rust_decimal::Decimal::new(3050, 2)
    );
    harness.scheduler.shutdown().await;
}
