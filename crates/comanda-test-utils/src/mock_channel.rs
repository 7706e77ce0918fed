// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with captured outbound messages,
//! scripted send failures and delays, and lifecycle events driven by the test.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, broadcast};

use comanda_core::traits::adapter::PluginAdapter;
use comanda_core::traits::channel::ChannelAdapter;
use comanda_core::types::{AdapterType, ChannelEvent, HealthStatus, MessageId};
use comanda_core::{CanonicalPhone, ComandaError};

/// A message captured by [`MockChannel::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: CanonicalPhone,
    pub text: String,
}

/// A mock messaging channel for testing.
///
/// - `send()` captures messages, retrievable via `sent_messages()`, unless a
///   scripted failure is queued or the channel is not ready.
/// - `connect()` replays the connect script (by default
///   `Initializing, Authenticated, Ready`) on the event stream.
/// - `emit()` pushes any lifecycle event; `Ready` opens the channel, every
///   other event except `Authenticated` closes it.
pub struct MockChannel {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    notify: Arc<Notify>,
    events: broadcast::Sender<ChannelEvent>,
    ready: AtomicBool,
    connects: AtomicUsize,
    connect_script: Mutex<Vec<ChannelEvent>>,
    connect_failures: AtomicUsize,
    failures: Mutex<VecDeque<String>>,
    fail_all: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockChannel {
    /// Create a new mock channel that is not ready until connected.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            events,
            ready: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            connect_script: Mutex::new(vec![
                ChannelEvent::Initializing,
                ChannelEvent::Authenticated,
                ChannelEvent::Ready,
            ]),
            connect_failures: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            fail_all: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }

    /// Create a mock channel that already accepts sends.
    pub fn ready() -> Self {
        let channel = Self::new();
        channel.ready.store(true, Ordering::SeqCst);
        channel
    }

    /// Replace the events replayed by `connect()`.
    pub async fn set_connect_script(&self, events: Vec<ChannelEvent>) {
        *self.connect_script.lock().await = events;
    }

    /// Make the next `n` calls to `connect()` fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Number of `connect()` calls so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Publish a lifecycle event and update readiness accordingly.
    pub fn emit(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Ready => self.ready.store(true, Ordering::SeqCst),
            ChannelEvent::Authenticated => {}
            _ => self.ready.store(false, Ordering::SeqCst),
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Make the next send fail with `reason`. Queued failures are consumed in order.
    pub async fn fail_next_send(&self, reason: impl Into<String>) {
        self.failures.lock().await.push_back(reason.into());
    }

    /// Make every send fail until turned off.
    pub fn fail_all_sends(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Delay every send by `delay` before it is captured.
    pub async fn set_send_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    /// Get all messages that were sent through `send()`.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the count of sent messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Count of sent messages whose text contains `needle`.
    pub async fn sent_containing(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.text.contains(needle))
            .count()
    }

    /// Clear all sent messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Wait until at least `count` messages were sent.
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.sent_count().await >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ComandaError> {
        if self.is_ready() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded("not ready".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), ComandaError> {
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&self) -> Result<(), ComandaError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ComandaError::Channel {
                message: "mock connect failure".into(),
                source: None,
            });
        }
        let script = self.connect_script.lock().await.clone();
        for event in script {
            self.emit(event);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, to: &CanonicalPhone, text: &str) -> Result<MessageId, ComandaError> {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.failures.lock().await.pop_front();
        let failure = scripted.or_else(|| {
            if self.fail_all.load(Ordering::SeqCst) {
                Some("mock send failure".to_string())
            } else if !self.is_ready() {
                Some("channel not ready".to_string())
            } else {
                None
            }
        });
        if let Some(message) = failure {
            return Err(ComandaError::Channel {
                message,
                source: None,
            });
        }

        self.sent.lock().await.push(SentMessage {
            to: to.clone(),
            text: text.to_string(),
        });
        self.notify.notify_waiters();
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }

    fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}
