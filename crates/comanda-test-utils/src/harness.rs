// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full order stack (storage, mock channel,
//! readiness gate, notification scheduler and order service) so tests can
//! drive `submit_order` and observe what the channel received.

use std::sync::Arc;

use rust_decimal::Decimal;

use comanda_config::model::ComandaConfig;
use comanda_core::types::{CartItem, ChannelEvent, PaymentMethod};
use comanda_core::{ComandaError, StorageAdapter};
use comanda_orders::{NotificationScheduler, OrderRequest, OrderService, ReadinessGate, ReceiptRenderer};
use comanda_storage::SqliteStorage;

use crate::memory_storage::MemoryStorage;
use crate::mock_channel::MockChannel;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ComandaConfig,
    in_memory: bool,
    ready: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: ComandaConfig::default(),
            in_memory: false,
            ready: true,
        }
    }

    /// Adjust the configuration before the stack is built.
    pub fn with_config(mut self, f: impl FnOnce(&mut ComandaConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Use [`MemoryStorage`] instead of a temp SQLite file.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Leave the channel and gate in `Initializing`.
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(mut self) -> Result<TestHarness, ComandaError> {
        let mut temp_dir = None;
        let mut memory = None;

        let storage: Arc<dyn StorageAdapter + Send + Sync> = if self.in_memory {
            let storage = Arc::new(MemoryStorage::new());
            memory = Some(storage.clone());
            storage
        } else {
            let dir = tempfile::TempDir::new().map_err(ComandaError::storage)?;
            self.config.storage.database_path =
                dir.path().join("test.db").to_string_lossy().into_owned();
            temp_dir = Some(dir);
            Arc::new(SqliteStorage::new(self.config.storage.clone()))
        };
        storage.initialize().await?;

        let channel = Arc::new(MockChannel::new());
        let gate = Arc::new(ReadinessGate::new());
        let scheduler = NotificationScheduler::new(
            storage.clone(),
            channel.clone(),
            self.config.notifications.clone(),
        );
        let receipts = ReceiptRenderer::new(&self.config.receipt)?;
        let service = Arc::new(OrderService::new(
            storage.clone(),
            channel.clone(),
            gate.clone(),
            scheduler.clone(),
            receipts,
        ));

        let harness = TestHarness {
            config: self.config,
            storage,
            memory,
            channel,
            gate,
            scheduler,
            service,
            _temp_dir: temp_dir,
        };
        if self.ready {
            harness.open_gate();
        }
        Ok(harness)
    }
}

/// A complete test environment with a mock channel and temp storage.
pub struct TestHarness {
    pub config: ComandaConfig,
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    /// Set when built with [`TestHarnessBuilder::in_memory`].
    pub memory: Option<Arc<MemoryStorage>>,
    pub channel: Arc<MockChannel>,
    pub gate: Arc<ReadinessGate>,
    pub scheduler: NotificationScheduler,
    pub service: Arc<OrderService>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Create a builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Drive channel and gate to `Ready`.
    pub fn open_gate(&self) {
        for event in [ChannelEvent::Authenticated, ChannelEvent::Ready] {
            self.gate.apply(&event);
            self.channel.emit(event);
        }
    }

    /// Drive channel and gate to `Disconnected`.
    pub fn close_gate(&self, reason: &str) {
        let event = ChannelEvent::Disconnected(reason.to_string());
        self.gate.apply(&event);
        self.channel.emit(event);
    }

    /// A fresh scheduler over the same storage and channel, as after a restart.
    pub fn restarted_scheduler(&self) -> NotificationScheduler {
        NotificationScheduler::new(
            self.storage.clone(),
            self.channel.clone(),
            self.config.notifications.clone(),
        )
    }

    /// Two pastéis at 10.00 and a cane juice at 5.50, cash with change for 50.
    pub fn order_request(phone: &str) -> OrderRequest {
        OrderRequest {
            phone: phone.to_string(),
            name: "Test".into(),
            address: "Rua A, 1".into(),
            reference: None,
            items: vec![
                CartItem {
                    name: "Pastel".into(),
                    unit_price: Decimal::new(1000, 2),
                    quantity: 2,
                    note: None,
                },
                CartItem {
                    name: "Caldo de cana".into(),
                    unit_price: Decimal::new(550, 2),
                    quantity: 1,
                    note: None,
                },
            ],
            payment_method: Some(PaymentMethod::Cash),
            change_for: Some(Decimal::new(5000, 2)),
        }
    }
}
