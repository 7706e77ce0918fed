// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel readiness gate.
//!
//! Holds the last known lifecycle state of the messaging channel and admits
//! order submissions only while it is [`ChannelState::Ready`]. The state is
//! kept in a `watch` channel so every read sees the latest transition and
//! dependents can await changes.

use serde::Serialize;
use strum::{Display, EnumString};
use tokio::sync::watch;
use tracing::{info, warn};

use comanda_core::ComandaError;
use comanda_core::types::ChannelEvent;

/// Lifecycle state of the messaging channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Initializing,
    PairingPending,
    Authenticated,
    Ready,
    Disconnected,
}

impl ChannelState {
    /// The state an event moves the channel into, regardless of where it was.
    pub fn target(event: &ChannelEvent) -> ChannelState {
        match event {
            ChannelEvent::Initializing => ChannelState::Initializing,
            ChannelEvent::PairingRequired(_) => ChannelState::PairingPending,
            ChannelEvent::Authenticated => ChannelState::Authenticated,
            ChannelEvent::Ready => ChannelState::Ready,
            ChannelEvent::AuthFailure(_) | ChannelEvent::Disconnected(_) => {
                ChannelState::Disconnected
            }
        }
    }

    /// Whether `self -> to` is an edge of the normal lifecycle.
    ///
    /// Restored sessions skip pairing, and a pairing code may be refreshed
    /// while pending. Anything can drop to `Disconnected`.
    pub fn expects(self, to: ChannelState) -> bool {
        use ChannelState::*;
        matches!(
            (self, to),
            (_, Disconnected)
                | (Disconnected, Initializing)
                | (Initializing, Initializing)
                | (Initializing, PairingPending)
                | (PairingPending, PairingPending)
                | (Initializing | PairingPending, Authenticated)
                | (Authenticated, Ready)
        )
    }
}

/// Applies `event` to `from`, returning the new state.
///
/// The latest event always wins; edges outside the normal lifecycle are
/// logged but still taken, so the gate converges on whatever the client
/// reported last.
pub fn transition(from: ChannelState, event: &ChannelEvent) -> ChannelState {
    let to = ChannelState::target(event);
    if !from.expects(to) {
        warn!(from = %from, to = %to, event = ?event, "unexpected channel transition");
    }
    to
}

/// Admits or rejects work depending on channel readiness.
#[derive(Debug)]
pub struct ReadinessGate {
    state: watch::Sender<ChannelState>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(ChannelState::Initializing),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ChannelState::Ready
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Feeds one lifecycle event into the gate and returns the new state.
    pub fn apply(&self, event: &ChannelEvent) -> ChannelState {
        let mut next = ChannelState::Initializing;
        self.state.send_if_modified(|current| {
            next = transition(*current, event);
            if next == *current {
                return false;
            }
            info!(from = %current, to = %next, "channel state changed");
            *current = next;
            true
        });
        next
    }

    /// Re-derives the state from the client's own readiness flag after
    /// events were lost.
    pub fn resync(&self, client_ready: bool) -> ChannelState {
        let current = self.state();
        match (client_ready, current) {
            (true, _) => self.apply(&ChannelEvent::Ready),
            (false, ChannelState::Ready) => self.apply(&ChannelEvent::Initializing),
            (false, state) => state,
        }
    }

    /// Fails with [`ComandaError::ChannelUnavailable`] unless the channel is ready.
    pub fn ensure_ready(&self) -> Result<(), ComandaError> {
        match self.state() {
            ChannelState::Ready => Ok(()),
            state => Err(ComandaError::ChannelUnavailable {
                state: state.to_string(),
            }),
        }
    }

    /// Resolves once the channel is ready.
    pub async fn wait_ready(&self) {
        let mut rx = self.subscribe();
        // Only errors if the sender is dropped, which `self` prevents.
        let _ = rx.wait_for(|state| *state == ChannelState::Ready).await;
    }
}
