// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives the readiness gate from channel lifecycle events and reconnects
//! the channel after it drops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use comanda_config::model::ChannelConfig;
use comanda_core::ChannelAdapter;
use comanda_core::types::ChannelEvent;

use crate::gate::ReadinessGate;

/// Exponential reconnect delay: `base`, `2 * base`, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            next: base,
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.reconnect_backoff(), config.reconnect_backoff_max())
    }

    /// Returns the delay to wait now and doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = delay.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.base;
    }
}

/// Owns the connect/reconnect loop of a channel.
pub struct ReadinessSupervisor {
    channel: Arc<dyn ChannelAdapter + Send + Sync>,
    gate: Arc<ReadinessGate>,
    backoff: Backoff,
}

impl ReadinessSupervisor {
    pub fn new(
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        gate: Arc<ReadinessGate>,
        backoff: Backoff,
    ) -> Self {
        Self {
            channel,
            gate,
            backoff,
        }
    }

    /// Connects the channel and follows its events until `cancel` fires.
    ///
    /// `Disconnected` and `AuthFailure` close the gate and trigger a
    /// reconnect after the current backoff delay. `Ready` resets the backoff.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut events = self.channel.events();

        if let Err(e) = self.channel.connect().await {
            warn!(error = %e, "initial channel connect failed");
            self.gate
                .apply(&ChannelEvent::Disconnected(e.to_string()));
            if !self.reconnect(&cancel).await {
                return;
            }
        }

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(event) => {
                    self.gate.apply(&event);
                    match event {
                        ChannelEvent::Ready => self.backoff.reset(),
                        ChannelEvent::PairingRequired(Some(ref code)) => {
                            info!(code = %code, "channel needs pairing, scan the code with the phone");
                        }
                        ChannelEvent::Disconnected(ref reason)
                        | ChannelEvent::AuthFailure(ref reason) => {
                            warn!(reason = %reason, "channel lost");
                            if !self.reconnect(&cancel).await {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    let state = self.gate.resync(self.channel.is_ready());
                    warn!(skipped, state = %state, "channel events lagged, resynced gate");
                }
                Err(RecvError::Closed) => {
                    warn!("channel event stream closed");
                    break;
                }
            }
        }
        debug!("readiness supervisor stopped");
    }

    /// Waits out the backoff and calls `connect` until it is accepted.
    /// Returns `false` if cancelled first.
    async fn reconnect(&mut self, cancel: &CancellationToken) -> bool {
        loop {
            let delay = self.backoff.next_delay();
            info!(delay_secs = delay.as_secs_f64(), "reconnecting channel after backoff");
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
            match self.channel.connect().await {
                Ok(()) => return true,
                Err(e) => warn!(error = %e, "channel reconnect failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(30));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30]);
    }

    #[test]
    fn backoff_reset_returns_to_base() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn backoff_cap_below_base_is_raised() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn backoff_from_config() {
        let mut backoff = Backoff::from_config(&ChannelConfig::default());
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }
}
