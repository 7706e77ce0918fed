// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delayed, idempotent notification scheduler.
//!
//! Every order gets one [`NotificationTask`] per [`NotificationKind`]. A task
//! sleeps until its `fire_at`, then:
//!
//! 1. claims the single delivery attempt for `(order, kind)` in the store;
//!    losing the claim means another timer or process already handled it
//!    and the task ends as [`FireOutcome::Skipped`];
//! 2. sends the templated message through the channel, bounded by the send
//!    timeout;
//! 3. on success sets the sent flag; on failure records the reason and
//!    logs the notification as permanently missed. There is no retry.
//!
//! Timer state is not persisted. After a restart [`NotificationScheduler::rearm`]
//! re-creates tasks from the store, and the claim suppresses anything that
//! already fired.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use comanda_config::model::NotificationsConfig;
use comanda_core::types::{NotificationKind, OrderId};
use comanda_core::{CanonicalPhone, ChannelAdapter, ComandaError, StorageAdapter};

use crate::messages::{fill_template, template_for};

/// A deferred notification: what to send, for which order, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTask {
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub fire_at: DateTime<Utc>,
}

impl NotificationTask {
    /// Task for `kind` of an order created at `created_at`.
    pub fn for_order(
        order_id: OrderId,
        kind: NotificationKind,
        created_at: DateTime<Utc>,
        config: &NotificationsConfig,
    ) -> Self {
        let delay = match kind {
            NotificationKind::Confirmation => config.confirmation_delay(),
            NotificationKind::Dispatch => config.dispatch_delay(),
        };
        Self {
            order_id,
            kind,
            fire_at: offset(created_at, delay),
        }
    }

    /// Deduplication key; at most one delivery per key.
    pub fn key(&self) -> (OrderId, NotificationKind) {
        (self.order_id, self.kind)
    }

    /// Time left until `fire_at`, zero if already overdue.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.fire_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

fn offset(at: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Terminal state of a fired task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The message was delivered and the flag set.
    Sent,
    /// Already claimed or sent elsewhere, or the order was cancelled.
    Skipped,
    /// The single attempt failed, or the claim itself errored. This task
    /// will not retry; an unclaimed notification can still be re-armed.
    Missed,
}

struct OrderTimers {
    token: CancellationToken,
    generation: u64,
    pending: usize,
}

struct Inner {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    channel: Arc<dyn ChannelAdapter + Send + Sync>,
    config: NotificationsConfig,
    timers: DashMap<OrderId, OrderTimers>,
    generation: AtomicU64,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

/// Runs notification timers. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct NotificationScheduler {
    inner: Arc<Inner>,
}

impl NotificationScheduler {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        config: NotificationsConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                channel,
                config,
                timers: DashMap::new(),
                generation: AtomicU64::new(0),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &NotificationsConfig {
        &self.inner.config
    }

    /// Arms a timer for `task`. Must be called from within a Tokio runtime.
    pub fn schedule(&self, task: NotificationTask) {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            debug!(order_id = %task.order_id, kind = %task.kind, "scheduler stopped, task not armed");
            return;
        }

        let (token, generation) = {
            let mut entry = inner.timers.entry(task.order_id).or_insert_with(|| OrderTimers {
                token: inner.shutdown.child_token(),
                generation: inner.generation.fetch_add(1, Ordering::Relaxed),
                pending: 0,
            });
            entry.pending += 1;
            (entry.token.clone(), entry.generation)
        };

        let delay = task.remaining(Utc::now());
        debug!(
            order_id = %task.order_id,
            kind = %task.kind,
            delay_secs = delay.as_secs(),
            "notification armed"
        );

        let this = self.clone();
        inner.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(order_id = %task.order_id, kind = %task.kind, "notification timer dropped");
                }
                _ = tokio::time::sleep(delay) => {
                    this.fire(&task).await;
                }
            }
            this.release(task.order_id, generation);
        });
    }

    /// Arms both notifications of a freshly created order.
    pub fn schedule_order(&self, order_id: OrderId, created_at: DateTime<Utc>) {
        for kind in NotificationKind::ALL {
            self.schedule(NotificationTask::for_order(
                order_id,
                kind,
                created_at,
                &self.inner.config,
            ));
        }
    }

    /// Drops every pending timer of `order_id`. Returns how many were dropped.
    ///
    /// A timer that is already sending is not interrupted.
    pub fn cancel(&self, order_id: OrderId) -> usize {
        match self.inner.timers.remove(&order_id) {
            Some((_, timers)) => {
                timers.token.cancel();
                debug!(order_id = %order_id, dropped = timers.pending, "order timers cancelled");
                timers.pending
            }
            None => 0,
        }
    }

    /// Number of armed timers that have not finished.
    pub fn pending(&self) -> usize {
        self.inner.timers.iter().map(|entry| entry.pending).sum()
    }

    /// Re-creates timers for open orders whose notifications were never
    /// attempted. Orders older than `rearm_max_age` are left alone.
    ///
    /// Overdue tasks fire immediately. Returns the number of tasks armed.
    pub async fn rearm(&self, now: DateTime<Utc>) -> Result<usize, ComandaError> {
        let max_age = TimeDelta::from_std(self.inner.config.rearm_max_age()).unwrap_or(TimeDelta::MAX);
        let since = now
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let pending = self.inner.storage.pending_notifications(since).await?;
        let count = pending.len();
        for notification in pending {
            self.schedule(NotificationTask::for_order(
                notification.order_id,
                notification.kind,
                notification.order_created_at,
                &self.inner.config,
            ));
        }
        info!(count, since = %since, "re-armed pending notifications");
        Ok(count)
    }

    /// Runs one task now: claim, send, mark.
    ///
    /// Never returns an error; failures end as [`FireOutcome::Missed`] and are
    /// logged.
    pub async fn fire(&self, task: &NotificationTask) -> FireOutcome {
        let inner = &self.inner;
        let (order_id, kind) = task.key();

        match inner.storage.claim_notification(order_id, kind).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(order_id = %order_id, kind = %kind, "notification already handled, skipping");
                return FireOutcome::Skipped;
            }
            Err(e) => {
                // No attempt row was written, so a later re-arm may still pick it up.
                error!(
                    order_id = %order_id,
                    kind = %kind,
                    error = %e,
                    "notification not attempted, claim failed; may be re-armed"
                );
                return FireOutcome::Missed;
            }
        }

        let (phone, text) = match self.compose(order_id, kind).await {
            Ok(message) => message,
            Err(e) => return self.missed(task, &e.to_string()).await,
        };

        let timeout = inner.config.send_timeout();
        let sent = match tokio::time::timeout(timeout, inner.channel.send(&phone, &text)).await {
            Ok(result) => result,
            Err(_) => Err(ComandaError::Timeout { duration: timeout }),
        };
        if let Err(e) = sent {
            return self.missed(task, &e.to_string()).await;
        }

        match inner.storage.mark_sent(order_id, kind).await {
            Ok(true) => info!(order_id = %order_id, kind = %kind, "notification sent"),
            Ok(false) => warn!(order_id = %order_id, kind = %kind, "notification sent but flag was already set"),
            Err(e) => error!(
                order_id = %order_id,
                kind = %kind,
                error = %e,
                "notification sent but sent flag not persisted"
            ),
        }
        FireOutcome::Sent
    }

    /// Stops accepting tasks, drops pending timers and waits for in-flight
    /// sends to finish. Dropped tasks are picked up by the next `rearm`.
    pub async fn shutdown(&self) {
        let pending = self.pending();
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.timers.clear();
        info!(dropped = pending, "notification scheduler stopped");
    }

    async fn compose(
        &self,
        order_id: OrderId,
        kind: NotificationKind,
    ) -> Result<(CanonicalPhone, String), ComandaError> {
        let storage = &self.inner.storage;
        let order = storage
            .get_order(order_id)
            .await?
            .ok_or_else(|| ComandaError::NotFound(format!("order {order_id}")))?;
        let customer = storage
            .get_customer(&order.customer_phone)
            .await?
            .ok_or_else(|| ComandaError::NotFound(format!("customer {}", order.customer_phone)))?;
        let text = fill_template(template_for(&self.inner.config, kind), &customer.name, order_id);
        Ok((order.customer_phone, text))
    }

    async fn missed(&self, task: &NotificationTask, reason: &str) -> FireOutcome {
        if let Err(e) = self
            .inner
            .storage
            .record_notification_failure(task.order_id, task.kind, reason)
            .await
        {
            warn!(order_id = %task.order_id, error = %e, "could not record notification failure");
        }
        error!(
            order_id = %task.order_id,
            kind = %task.kind,
            reason,
            "notification permanently missed"
        );
        FireOutcome::Missed
    }

    fn release(&self, order_id: OrderId, generation: u64) {
        self.inner.timers.remove_if_mut(&order_id, |_, timers| {
            if timers.generation != generation {
                return false;
            }
            timers.pending = timers.pending.saturating_sub(1);
            timers.pending == 0
        });
    }
}
