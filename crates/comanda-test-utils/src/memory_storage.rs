// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `StorageAdapter` with the same claim and mark semantics as the
//! SQLite store.
//!
//! Every operation completes without yielding to another thread, which keeps
//! paused-clock timer tests deterministic.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use comanda_core::traits::adapter::PluginAdapter;
use comanda_core::traits::storage::StorageAdapter;
use comanda_core::types::{
    AdapterType, Customer, HealthStatus, NewCustomer, NotificationKind, Order, OrderId,
    OrderSnapshot, OrderStatus, PendingNotification,
};
use comanda_core::{CanonicalPhone, ComandaError};

#[derive(Default)]
struct State {
    customers: HashMap<CanonicalPhone, Customer>,
    orders: BTreeMap<OrderId, Order>,
    attempts: HashMap<(OrderId, NotificationKind), Option<String>>,
    next_id: i64,
}

/// A storage adapter backed by maps behind a mutex.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with a storage error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Failure recorded for `(id, kind)`: `None` if never attempted,
    /// `Some(None)` if attempted without a recorded failure.
    pub fn attempt(&self, id: OrderId, kind: NotificationKind) -> Option<Option<String>> {
        self.with(|state| Ok(state.attempts.get(&(id, kind)).cloned()))
            .ok()
            .flatten()
    }

    pub fn order_count(&self) -> usize {
        self.with(|state| Ok(state.orders.len())).unwrap_or(0)
    }

    pub fn customer_count(&self) -> usize {
        self.with(|state| Ok(state.customers.len())).unwrap_or(0)
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> Result<T, ComandaError>) -> Result<T, ComandaError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ComandaError::storage("memory storage unavailable"));
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| ComandaError::Internal("memory storage lock poisoned".into()))?;
        f(&mut state)
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ComandaError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("unavailable".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), ComandaError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), ComandaError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ComandaError> {
        Ok(())
    }

    async fn upsert_customer(&self, customer: &NewCustomer) -> Result<Customer, ComandaError> {
        self.with(|state| {
            let now = Utc::now();
            let stored = state
                .customers
                .entry(customer.phone.clone())
                .and_modify(|existing| {
                    existing.name = customer.name.clone();
                    existing.address = customer.address.clone();
                    existing.reference = customer.reference.clone();
                    existing.updated_at = now;
                })
                .or_insert_with(|| Customer {
                    phone: customer.phone.clone(),
                    name: customer.name.clone(),
                    address: customer.address.clone(),
                    reference: customer.reference.clone(),
                    created_at: now,
                    updated_at: now,
                });
            Ok(stored.clone())
        })
    }

    async fn get_customer(&self, phone: &CanonicalPhone) -> Result<Option<Customer>, ComandaError> {
        self.with(|state| Ok(state.customers.get(phone).cloned()))
    }

    async fn create_order(
        &self,
        phone: &CanonicalPhone,
        snapshot: &OrderSnapshot,
        created_at: DateTime<Utc>,
    ) -> Result<OrderId, ComandaError> {
        self.with(|state| {
            if !state.customers.contains_key(phone) {
                return Err(ComandaError::storage(format!("unknown customer {phone}")));
            }
            state.next_id += 1;
            let id = OrderId(state.next_id);
            state.orders.insert(
                id,
                Order {
                    id,
                    customer_phone: phone.clone(),
                    snapshot: snapshot.clone(),
                    status: OrderStatus::Open,
                    confirmation_sent: false,
                    dispatch_sent: false,
                    created_at,
                },
            );
            Ok(id)
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, ComandaError> {
        self.with(|state| Ok(state.orders.get(&id).cloned()))
    }

    async fn history(
        &self,
        phone: &CanonicalPhone,
        limit: usize,
    ) -> Result<Vec<Order>, ComandaError> {
        self.with(|state| {
            let mut orders: Vec<Order> = state
                .orders
                .values()
                .filter(|o| &o.customer_phone == phone)
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            orders.truncate(limit);
            Ok(orders)
        })
    }

    async fn claim_notification(
        &self,
        id: OrderId,
        kind: NotificationKind,
    ) -> Result<bool, ComandaError> {
        self.with(|state| {
            let claimable = state
                .orders
                .get(&id)
                .is_some_and(|o| o.status == OrderStatus::Open && !o.is_sent(kind));
            if !claimable || state.attempts.contains_key(&(id, kind)) {
                return Ok(false);
            }
            state.attempts.insert((id, kind), None);
            Ok(true)
        })
    }

    async fn mark_sent(&self, id: OrderId, kind: NotificationKind) -> Result<bool, ComandaError> {
        self.with(|state| {
            let Some(order) = state.orders.get_mut(&id) else {
                return Ok(false);
            };
            let flag = match kind {
                NotificationKind::Confirmation => &mut order.confirmation_sent,
                NotificationKind::Dispatch => &mut order.dispatch_sent,
            };
            Ok(!std::mem::replace(flag, true))
        })
    }

    async fn record_notification_failure(
        &self,
        id: OrderId,
        kind: NotificationKind,
        reason: &str,
    ) -> Result<(), ComandaError> {
        self.with(|state| {
            if let Some(failure) = state.attempts.get_mut(&(id, kind)) {
                *failure = Some(reason.to_string());
            }
            Ok(())
        })
    }

    async fn cancel_order(&self, id: OrderId) -> Result<bool, ComandaError> {
        self.with(|state| match state.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Open => {
                order.status = OrderStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    async fn pending_notifications(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PendingNotification>, ComandaError> {
        self.with(|state| {
            let mut pending = Vec::new();
            for order in state.orders.values() {
                if order.status != OrderStatus::Open || order.created_at < since {
                    continue;
                }
                for kind in NotificationKind::ALL {
                    if !order.is_sent(kind) && !state.attempts.contains_key(&(order.id, kind)) {
                        pending.push(PendingNotification {
                            order_id: order.id,
                            kind,
                            order_created_at: order.created_at,
                        });
                    }
                }
            }
            Ok(pending)
        })
    }
}
