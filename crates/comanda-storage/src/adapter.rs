// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use comanda_config::model::StorageConfig;
use comanda_core::phone::CanonicalPhone;
use comanda_core::{AdapterType, ComandaError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::models::{
    Customer, NewCustomer, NotificationKind, Order, OrderId, OrderSnapshot, PendingNotification,
};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ComandaError> {
        self.db
            .get()
            .ok_or_else(|| ComandaError::storage("storage not initialized -- call initialize() first"))
    }

    /// Failure reason stored for a claimed attempt.
    ///
    /// `None` when no attempt exists, `Some(None)` while the attempt has not
    /// failed.
    pub async fn attempt_failure(
        &self,
        id: OrderId,
        kind: NotificationKind,
    ) -> Result<Option<Option<String>>, ComandaError> {
        queries::notifications::attempt_failure(self.db()?, id, kind).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ComandaError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ComandaError> {
        // Shutdown delegates to a checkpoint if the DB was initialized.
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ComandaError> {
        let db = Database::open_with(
            &self.config.database_path,
            self.config.wal_mode,
            Duration::from_millis(self.config.busy_timeout_ms),
        )
        .await?;
        self.db
            .set(db)
            .map_err(|_| ComandaError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ComandaError> {
        self.db()?.checkpoint().await
    }

    // --- Customer operations ---

    async fn upsert_customer(&self, customer: &NewCustomer) -> Result<Customer, ComandaError> {
        queries::customers::upsert_customer(self.db()?, customer).await
    }

    async fn get_customer(&self, phone: &CanonicalPhone) -> Result<Option<Customer>, ComandaError> {
        queries::customers::get_customer(self.db()?, phone).await
    }

    // --- Order operations ---

    async fn create_order(
        &self,
        phone: &CanonicalPhone,
        snapshot: &OrderSnapshot,
        created_at: DateTime<Utc>,
    ) -> Result<OrderId, ComandaError> {
        queries::orders::create_order(self.db()?, phone, snapshot, created_at).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, ComandaError> {
        queries::orders::get_order(self.db()?, id).await
    }

    async fn history(
        &self,
        phone: &CanonicalPhone,
        limit: usize,
    ) -> Result<Vec<Order>, ComandaError> {
        queries::orders::history(self.db()?, phone, limit).await
    }

    async fn cancel_order(&self, id: OrderId) -> Result<bool, ComandaError> {
        queries::orders::cancel_order(self.db()?, id).await
    }

    // --- Notification operations ---

    async fn claim_notification(
        &self,
        id: OrderId,
        kind: NotificationKind,
    ) -> Result<bool, ComandaError> {
        queries::notifications::claim_notification(self.db()?, id, kind).await
    }

    async fn mark_sent(&self, id: OrderId, kind: NotificationKind) -> Result<bool, ComandaError> {
        queries::orders::mark_sent(self.db()?, id, kind).await
    }

    async fn record_notification_failure(
        &self,
        id: OrderId,
        kind: NotificationKind,
        reason: &str,
    ) -> Result<(), ComandaError> {
        queries::notifications::record_failure(self.db()?, id, kind, reason).await
    }

    async fn pending_notifications(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PendingNotification>, ComandaError> {
        queries::notifications::pending_notifications(self.db()?, since).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::queries::test_support::{new_customer, phone, snapshot};
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }

    async fn storage_with_order(path: &str) -> (SqliteStorage, OrderId) {
        let storage = SqliteStorage::new(make_config(path));
        storage.initialize().await.unwrap();
        storage
            .upsert_customer(&new_customer("11991234567", "Ana"))
            .await
            .unwrap();
        let id = storage
            .create_order(&phone("11991234567"), &snapshot(), Utc::now())
            .await
            .unwrap();
        (storage, id)
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        let result = storage.initialize().await;
        assert!(result.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_tracks_initialization() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn operations_before_initialize_are_storage_errors() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("uninit.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        let result = storage
            .create_order(&phone("11991234567"), &snapshot(), Utc::now())
            .await;
        assert!(matches!(result, Err(ComandaError::Storage { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mark_sent_has_exactly_one_winner() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("race.db");
        let (storage, id) = storage_with_order(db_path.to_str().unwrap()).await;
        let storage = Arc::new(storage);

        let a = tokio::spawn({
            let storage = Arc::clone(&storage);
            async move { storage.mark_sent(id, NotificationKind::Confirmation).await }
        });
        let b = tokio::spawn({
            let storage = Arc::clone(&storage);
            async move { storage.mark_sent(id, NotificationKind::Confirmation).await }
        });
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        assert!(a ^ b, "exactly one call must win, got {a} and {b}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_connections_race_on_claim_with_one_winner() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("two_processes.db");
        let path = db_path.to_str().unwrap();
        let (first, id) = storage_with_order(path).await;
        let second = SqliteStorage::new(make_config(path));
        second.initialize().await.unwrap();

        let mut wins = 0;
        for _ in 0..5 {
            let (a, b) = tokio::join!(
                first.claim_notification(id, NotificationKind::Dispatch),
                second.claim_notification(id, NotificationKind::Dispatch),
            );
            wins += usize::from(a.unwrap()) + usize::from(b.unwrap());
        }
        assert_eq!(wins, 1);

        let (a, b) = tokio::join!(
            first.mark_sent(id, NotificationKind::Dispatch),
            second.mark_sent(id, NotificationKind::Dispatch),
        );
        assert!(a.unwrap() ^ b.unwrap());
    }

    #[tokio::test]
    async fn full_order_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let (storage, id) = storage_with_order(db_path.to_str().unwrap()).await;

        let customer = storage
            .get_customer(&phone("+55 (11) 99123-4567"))
            .await
            .unwrap()
            .expect("customer stored");
        assert_eq!(customer.name, "Ana");

        assert!(storage.claim_notification(id, NotificationKind::Confirmation).await.unwrap());
        assert!(storage.mark_sent(id, NotificationKind::Confirmation).await.unwrap());
        assert!(storage.claim_notification(id, NotificationKind::Dispatch).await.unwrap());
        storage
            .record_notification_failure(id, NotificationKind::Dispatch, "recipient offline")
            .await
            .unwrap();
        assert_eq!(
            storage.attempt_failure(id, NotificationKind::Dispatch).await.unwrap(),
            Some(Some("recipient offline".to_string()))
        );

        let pending = storage
            .pending_notifications(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(pending.is_empty());

        let history = storage.history(&customer.phone, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].confirmation_sent);
        assert!(!history[0].dispatch_sent);

        storage.close().await.unwrap();
        storage.shutdown().await.unwrap();
    }
}
