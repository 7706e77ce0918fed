// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification scheduler timing and idempotency, on a paused clock.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use comanda_core::StorageAdapter;
use comanda_core::types::{NotificationKind, OrderId};
use comanda_orders::{FireOutcome, NotificationTask};
use comanda_test_utils::TestHarness;
use tokio::time::sleep;
use tracing_test::traced_test;

const PREPARING: &str = "sendo preparado";
const DISPATCHED: &str = "saiu para entrega";

async fn harness() -> TestHarness {
    TestHarness::builder().in_memory().build().await.unwrap()
}

async fn submit(harness: &TestHarness) -> OrderId {
    harness
        .service
        .submit_order(TestHarness::order_request("11991234567"))
        .await
        .unwrap()
        .order_id
}

#[tokio::test(start_paused = true)]
async fn notifications_fire_after_their_delays_and_not_before() {
    let h = harness().await;
    submit(&h).await;
    assert_eq!(h.channel.sent_count().await, 1, "receipt only");
    assert_eq!(h.scheduler.pending(), 2);

    sleep(Duration::from_secs(29)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);
    assert_eq!(h.channel.sent_containing(DISPATCHED).await, 0);
    assert_eq!(h.scheduler.pending(), 1);

    sleep(Duration::from_secs(30 * 60)).await;
    assert_eq!(h.channel.sent_containing(DISPATCHED).await, 1);
    assert_eq!(h.channel.sent_count().await, 3);
    assert_eq!(h.scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn messages_use_customer_name_and_order_id() {
    let h = harness().await;
    let id = submit(&h).await;
    sleep(Duration::from_secs(31)).await;

    let sent = h.channel.sent_messages().await;
    let confirmation = &sent[1].text;
    assert_eq!(
        confirmation,
        &format!("Olá Test! Seu pedido #{id} já está sendo preparado.")
    );
    assert_eq!(sent[1].to.as_str(), "551191234567");

    let order = h.storage.get_order(id).await.unwrap().unwrap();
    assert!(order.confirmation_sent);
    assert!(!order.dispatch_sent);
}

#[tokio::test(start_paused = true)]
async fn duplicate_timers_deliver_once() {
    let h = harness().await;
    let id = submit(&h).await;
    let task = NotificationTask::for_order(
        id,
        NotificationKind::Confirmation,
        Utc::now(),
        h.scheduler.config(),
    );
    h.scheduler.schedule(task);
    h.scheduler.schedule(task);

    sleep(Duration::from_secs(31)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);

    // A second identical advance, as if yet another timer were pending.
    h.scheduler.schedule(NotificationTask { fire_at: Utc::now(), ..task });
    sleep(Duration::from_secs(31)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_schedulers_deliver_once() {
    let h = harness().await;
    let id = submit(&h).await;
    let other = h.restarted_scheduler();
    let task = NotificationTask {
        order_id: id,
        kind: NotificationKind::Dispatch,
        fire_at: Utc::now(),
    };

    let (a, b) = tokio::join!(h.scheduler.fire(&task), other.fire(&task));
    let mut outcomes = [a, b];
    outcomes.sort_by_key(|o| *o == FireOutcome::Sent);
    assert_eq!(outcomes, [FireOutcome::Skipped, FireOutcome::Sent]);
    assert_eq!(h.channel.sent_containing(DISPATCHED).await, 1);
}

#[tokio::test(start_paused = true)]
async fn rearm_after_restart_skips_what_already_fired() {
    let h = harness().await;
    let id = submit(&h).await;
    sleep(Duration::from_secs(31)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);

    // Process "dies": timers are gone, confirmation is persisted as sent.
    h.scheduler.shutdown().await;

    let restarted = h.restarted_scheduler();
    let armed = restarted.rearm(Utc::now()).await.unwrap();
    assert_eq!(armed, 1, "only dispatch is still pending");

    // The overdue, already-sent confirmation does nothing even if re-armed by hand.
    let overdue = NotificationTask {
        order_id: id,
        kind: NotificationKind::Confirmation,
        fire_at: Utc::now() - TimeDelta::minutes(5),
    };
    assert_eq!(restarted.fire(&overdue).await, FireOutcome::Skipped);
    restarted.schedule(overdue);

    sleep(Duration::from_secs(31 * 60)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);
    assert_eq!(h.channel.sent_containing(DISPATCHED).await, 1);
}

#[tokio::test(start_paused = true)]
async fn rearm_fires_overdue_tasks_immediately() {
    let h = harness().await;
    let phone = comanda_core::normalize("11991234567").unwrap();
    h.storage
        .upsert_customer(&comanda_core::NewCustomer {
            phone: phone.clone(),
            name: "Test".into(),
            address: "Rua A".into(),
            reference: None,
        })
        .await
        .unwrap();
    let snapshot = comanda_core::OrderSnapshot {
        items: TestHarness::order_request("11991234567").items,
        payment_method: comanda_core::PaymentMethod::Pix,
        change_for: None,
    };
    // Placed an hour ago, never notified.
    h.storage
        .create_order(&phone, &snapshot, Utc::now() - TimeDelta::hours(1))
        .await
        .unwrap();

    assert_eq!(h.scheduler.rearm(Utc::now()).await.unwrap(), 2);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);
    assert_eq!(h.channel.sent_containing(DISPATCHED).await, 1);
}

#[tokio::test(start_paused = true)]
async fn rearm_ignores_stale_orders() {
    let h = harness().await;
    let phone = comanda_core::normalize("11991234567").unwrap();
    h.storage
        .upsert_customer(&comanda_core::NewCustomer {
            phone: phone.clone(),
            name: "Test".into(),
            address: "Rua A".into(),
            reference: None,
        })
        .await
        .unwrap();
    let snapshot = comanda_core::OrderSnapshot {
        items: TestHarness::order_request("11991234567").items,
        payment_method: comanda_core::PaymentMethod::Card,
        change_for: None,
    };
    h.storage
        .create_order(&phone, &snapshot, Utc::now() - TimeDelta::days(2))
        .await
        .unwrap();

    assert_eq!(h.scheduler.rearm(Utc::now()).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn failed_send_is_missed_logged_and_never_retried() {
    let h = harness().await;
    let id = submit(&h).await;
    h.channel.fail_next_send("recipient not on whatsapp").await;

    let task = NotificationTask {
        order_id: id,
        kind: NotificationKind::Confirmation,
        fire_at: Utc::now(),
    };
    assert_eq!(h.scheduler.fire(&task).await, FireOutcome::Missed);
    assert!(logs_contain("notification permanently missed"));
    assert!(logs_contain("recipient not on whatsapp"));

    let memory = h.memory.as_ref().unwrap();
    assert_eq!(
        memory.attempt(id, NotificationKind::Confirmation),
        Some(Some("channel error: recipient not on whatsapp".into()))
    );
    let order = h.storage.get_order(id).await.unwrap().unwrap();
    assert!(!order.confirmation_sent, "flag stays false for a failed send");

    // The regular timer finds the attempt and does not retry.
    sleep(Duration::from_secs(31)).await;
    assert_eq!(h.channel.sent_containing(PREPARING).await, 0);

    // Neither does a restart; dispatch is still pending.
    let restarted = h.restarted_scheduler();
    h.scheduler.shutdown().await;
    assert_eq!(restarted.rearm(Utc::now()).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_send_times_out_as_missed() {
    let h = harness().await;
    let id = submit(&h).await;
    h.channel
        .set_send_delay(Some(Duration::from_secs(60)))
        .await;

    let task = NotificationTask {
        order_id: id,
        kind: NotificationKind::Confirmation,
        fire_at: Utc::now(),
    };
    assert_eq!(h.scheduler.fire(&task).await, FireOutcome::Missed);
    let failure = h
        .memory
        .as_ref()
        .unwrap()
        .attempt(id, NotificationKind::Confirmation)
        .flatten()
        .unwrap();
    assert!(failure.contains("timed out"), "{failure}");
}

#[tokio::test(start_paused = true)]
async fn cancelled_order_drops_timers_and_is_skipped() {
    let h = harness().await;
    let id = submit(&h).await;
    assert!(h.service.cancel_order(id).await.unwrap());
    assert_eq!(h.scheduler.pending(), 0);

    sleep(Duration::from_secs(31 * 60)).await;
    assert_eq!(h.channel.sent_count().await, 1, "receipt only");

    let task = NotificationTask {
        order_id: id,
        kind: NotificationKind::Dispatch,
        fire_at: Utc::now(),
    };
    assert_eq!(h.scheduler.fire(&task).await, FireOutcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn cancel_then_reschedule_tracks_new_timers() {
    let h = harness().await;
    let id = submit(&h).await;
    assert_eq!(h.scheduler.cancel(id), 2);
    assert_eq!(h.scheduler.cancel(id), 0);

    h.scheduler.schedule_order(id, Utc::now());
    assert_eq!(h.scheduler.pending(), 2);
    sleep(Duration::from_secs(31)).await;
    assert_eq!(h.scheduler.pending(), 1);
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_drops_pending_timers() {
    let h = harness().await;
    let id = submit(&h).await;
    h.scheduler.shutdown().await;
    assert_eq!(h.scheduler.pending(), 0);

    h.scheduler.schedule_order(id, Utc::now());
    assert_eq!(h.scheduler.pending(), 0, "no timers after shutdown");

    sleep(Duration::from_secs(31 * 60)).await;
    assert_eq!(h.channel.sent_count().await, 1);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn storage_failure_on_claim_is_missed_without_attempt() {
    let h = harness().await;
    let id = submit(&h).await;
    let memory = h.memory.clone().unwrap();
    memory.set_unavailable(true);

    let task = NotificationTask {
        order_id: id,
        kind: NotificationKind::Confirmation,
        fire_at: Utc::now(),
    };
    assert_eq!(h.scheduler.fire(&task).await, FireOutcome::Missed);
    assert!(logs_contain("notification not attempted"));
    assert!(logs_contain("may be re-armed"));
    assert!(!logs_contain("permanently missed"));
    memory.set_unavailable(false);
    assert_eq!(memory.attempt(id, NotificationKind::Confirmation), None);

    // Nothing was claimed, so the same task still goes out once the store is back.
    assert_eq!(h.scheduler.fire(&task).await, FireOutcome::Sent);
    assert_eq!(h.channel.sent_containing(PREPARING).await, 1);
}
