// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `comanda serve` command implementation.
//!
//! Wires SQLite storage, the WhatsApp bridge channel, the readiness gate and
//! supervisor, the notification scheduler and the order service, then serves
//! the HTTP gateway until a shutdown signal arrives.

use std::sync::Arc;

use chrono::Utc;
use comanda_config::ComandaConfig;
use comanda_core::{ComandaError, HealthStatus, PluginAdapter, StorageAdapter};
use comanda_gateway::{GatewayState, start_server};
use comanda_orders::shutdown;
use comanda_orders::{
    Backoff, NotificationScheduler, OrderService, ReadinessGate, ReadinessSupervisor,
    ReceiptRenderer,
};
use comanda_storage::SqliteStorage;
use comanda_whatsapp::WhatsAppChannel;
use tracing::{error, info, warn};

/// Runs the `comanda serve` command.
///
/// Pending notifications of recent open orders are re-armed before the
/// gateway starts accepting orders. On SIGINT/SIGTERM, timers are dropped,
/// the channel is shut down and storage is checkpointed.
pub async fn run_serve(config: ComandaConfig) -> Result<(), ComandaError> {
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "starting comanda serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");

    let channel = Arc::new(WhatsAppChannel::new(&config.whatsapp)?);
    let gate = Arc::new(ReadinessGate::new());
    let scheduler = NotificationScheduler::new(
        storage.clone(),
        channel.clone(),
        config.notifications.clone(),
    );
    let receipts = ReceiptRenderer::new(&config.receipt)?;
    let service = Arc::new(OrderService::new(
        storage.clone(),
        channel.clone(),
        gate.clone(),
        scheduler.clone(),
        receipts,
    ));

    let cancel = shutdown::install_signal_handler();

    let supervisor = ReadinessSupervisor::new(
        channel.clone(),
        gate.clone(),
        Backoff::from_config(&config.channel),
    );
    let supervisor_task = tokio::spawn(supervisor.run(cancel.clone()));

    let rearmed = scheduler.rearm(Utc::now()).await?;
    info!(rearmed, "pending notifications re-armed");

    let adapters: [&dyn PluginAdapter; 2] = [storage.as_ref(), channel.as_ref()];
    report_health(&adapters).await;

    let served = if config.gateway.enabled {
        let state = GatewayState::new(service, config.service.name.clone());
        start_server(&config.gateway, state, cancel.clone()).await
    } else {
        info!("gateway disabled, waiting for shutdown signal");
        cancel.cancelled().await;
        Ok(())
    };
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with an error");
    }

    cancel.cancel();
    scheduler.shutdown().await;
    if let Err(e) = supervisor_task.await {
        warn!(error = %e, "readiness supervisor task failed");
    }
    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("comanda serve shutdown complete");
    served
}

/// Logs the health of each adapter once at startup.
async fn report_health(adapters: &[&dyn PluginAdapter]) {
    for adapter in adapters {
        match adapter.health_check().await {
            Ok(HealthStatus::Healthy) => {
                info!(adapter = adapter.name(), version = %adapter.version(), "adapter healthy");
            }
            Ok(HealthStatus::Degraded(reason)) => {
                warn!(adapter = adapter.name(), reason = %reason, "adapter degraded");
            }
            Ok(HealthStatus::Unhealthy(reason)) => {
                warn!(adapter = adapter.name(), reason = %reason, "adapter unhealthy");
            }
            Err(e) => {
                warn!(adapter = adapter.name(), error = %e, "adapter health check failed");
            }
        }
    }
}

fn default_filter(log_level: &str) -> String {
    format!("comanda={log_level},warn")
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
