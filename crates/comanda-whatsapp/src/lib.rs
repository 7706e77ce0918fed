// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp channel adapter for Comanda.
//!
//! Implements [`ChannelAdapter`] on top of a WhatsApp Web bridge sidecar.
//! `connect` starts the bridge session and spawns a poller that turns
//! `GET /status` changes into [`ChannelEvent`]s. A few consecutive failed
//! polls count as a dropped session. The poller stops after the session
//! drops; the readiness supervisor reconnects.

pub mod client;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use comanda_config::model::WhatsAppConfig;
use comanda_core::traits::{ChannelAdapter, PluginAdapter};
use comanda_core::types::{AdapterType, ChannelEvent, HealthStatus, MessageId};
use comanda_core::{CanonicalPhone, ComandaError};

use crate::client::BridgeClient;
use crate::types::{BridgeState, StatusResponse};

/// Capacity of the lifecycle event buffer.
const EVENT_CAPACITY: usize = 32;

struct Shared {
    client: BridgeClient,
    events: broadcast::Sender<ChannelEvent>,
    ready: AtomicBool,
}

impl Shared {
    fn publish(&self, event: ChannelEvent) {
        self.ready
            .store(event == ChannelEvent::Ready, Ordering::SeqCst);
        // Nobody listening is not an error.
        let _ = self.events.send(event);
    }
}

/// WhatsApp channel implementing [`ChannelAdapter`].
pub struct WhatsAppChannel {
    shared: Arc<Shared>,
    poll_interval: Duration,
    poller: Mutex<Option<CancellationToken>>,
}

impl WhatsAppChannel {
    /// Creates a new WhatsApp channel from the given configuration.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, ComandaError> {
        let client = BridgeClient::new(config)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!(bridge_url = %config.bridge_url, "WhatsApp channel initialized");
        Ok(Self {
            shared: Arc::new(Shared {
                client,
                events,
                ready: AtomicBool::new(false),
            }),
            poll_interval: config.poll_interval(),
            poller: Mutex::new(None),
        })
    }

    fn stop_poller(&self) {
        let previous = match self.poller.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(token) = previous {
            token.cancel();
        }
    }

    fn start_poller(&self) {
        let token = CancellationToken::new();
        match self.poller.lock() {
            Ok(mut guard) => *guard = Some(token.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(token.clone()),
        }
        let shared = self.shared.clone();
        let interval = self.poll_interval;
        tokio::spawn(poll_status(shared, interval, token));
    }
}

/// Consecutive failed status requests tolerated before the session is
/// reported as disconnected.
const MAX_POLL_FAILURES: u32 = 3;

/// Polls the bridge until the session drops or `cancel` fires, publishing an
/// event whenever the reported status changes.
async fn poll_status(shared: Arc<Shared>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<StatusResponse> = None;
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let status = match shared.client.status().await {
            Ok(status) => {
                failures = 0;
                status
            }
            Err(e) => {
                failures += 1;
                if failures < MAX_POLL_FAILURES {
                    warn!(failures, error = %e, "bridge status poll failed");
                    continue;
                }
                StatusResponse {
                    state: BridgeState::Disconnected,
                    qr: None,
                    reason: Some(e.to_string()),
                }
            }
        };
        if last.as_ref() == Some(&status) {
            continue;
        }

        let event = status.to_event();
        debug!(state = ?status.state, "bridge status changed");
        let terminal = matches!(
            status.state,
            BridgeState::Disconnected | BridgeState::AuthFailure
        );
        shared.publish(event);
        if terminal {
            break;
        }
        last = Some(status);
    }
    debug!("bridge status poller stopped");
}

#[async_trait]
impl PluginAdapter for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ComandaError> {
        match self.shared.client.status().await {
            Ok(status) if status.state == BridgeState::Ready => Ok(HealthStatus::Healthy),
            Ok(status) => Ok(HealthStatus::Degraded(format!("{:?}", status.state))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ComandaError> {
        self.stop_poller();
        self.shared.ready.store(false, Ordering::SeqCst);
        info!("WhatsApp channel shut down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppChannel {
    async fn connect(&self) -> Result<(), ComandaError> {
        self.stop_poller();
        self.shared.publish(ChannelEvent::Initializing);
        self.shared.client.start_session().await?;
        self.start_poller();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, to: &CanonicalPhone, text: &str) -> Result<MessageId, ComandaError> {
        if !self.is_ready() {
            warn!(to = %to, "send attempted while WhatsApp session not ready");
            return Err(ComandaError::Channel {
                message: "whatsapp session not ready".into(),
                source: None,
            });
        }
        let id = self.shared.client.send_text(to, text).await?;
        Ok(MessageId(id))
    }

    fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.events.subscribe()
    }
}
