// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for customer and order persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ComandaError;
use crate::phone::CanonicalPhone;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Customer, NewCustomer, NotificationKind, Order, OrderId, OrderSnapshot, PendingNotification,
};

/// Adapter for the order store.
///
/// Order snapshots are immutable once written. The only mutations on an
/// order are its status and the two per-kind sent flags, which move
/// `false -> true` at most once.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ComandaError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), ComandaError>;

    /// Inserts the customer or overwrites name, address and reference of an
    /// existing one. Returns the stored row.
    async fn upsert_customer(&self, customer: &NewCustomer) -> Result<Customer, ComandaError>;

    /// Looks up a customer by canonical phone.
    async fn get_customer(&self, phone: &CanonicalPhone) -> Result<Option<Customer>, ComandaError>;

    /// Persists a new open order with both sent flags false.
    async fn create_order(
        &self,
        phone: &CanonicalPhone,
        snapshot: &OrderSnapshot,
        created_at: DateTime<Utc>,
    ) -> Result<OrderId, ComandaError>;

    /// Loads an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, ComandaError>;

    /// Orders placed under `phone`, newest first, at most `limit`.
    async fn history(
        &self,
        phone: &CanonicalPhone,
        limit: usize,
    ) -> Result<Vec<Order>, ComandaError>;

    /// Reserves the single delivery attempt for `(id, kind)`.
    ///
    /// Returns `true` only for the one caller that created the attempt, and
    /// only while the order is open and the kind is not yet sent.
    async fn claim_notification(
        &self,
        id: OrderId,
        kind: NotificationKind,
    ) -> Result<bool, ComandaError>;

    /// Sets the sent flag for `kind` if it is still false.
    ///
    /// Returns whether this call performed the transition. Atomic with
    /// respect to concurrent callers for the same order.
    async fn mark_sent(&self, id: OrderId, kind: NotificationKind) -> Result<bool, ComandaError>;

    /// Records why the claimed attempt for `(id, kind)` failed.
    async fn record_notification_failure(
        &self,
        id: OrderId,
        kind: NotificationKind,
        reason: &str,
    ) -> Result<(), ComandaError>;

    /// Moves an open order to cancelled. Returns `false` if it was not open.
    async fn cancel_order(&self, id: OrderId) -> Result<bool, ComandaError>;

    /// Unclaimed, unsent notifications of open orders created at or after `since`.
    async fn pending_notifications(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PendingNotification>, ComandaError>;
}
