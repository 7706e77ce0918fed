// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for the outbound messaging platform.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ComandaError;
use crate::phone::CanonicalPhone;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelEvent, MessageId};

/// Adapter for the external chat-automation channel.
///
/// The core only needs to push text to a canonical phone and to observe the
/// client's lifecycle. Pairing, session persistence and delivery receipts
/// stay inside the implementation.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Starts (or restarts) the client session.
    ///
    /// Returns once the attempt has been initiated; progress is reported via
    /// [`ChannelAdapter::events`].
    async fn connect(&self) -> Result<(), ComandaError>;

    /// Whether the client currently reports itself able to deliver.
    fn is_ready(&self) -> bool;

    /// Sends a text message to the given address.
    async fn send(&self, to: &CanonicalPhone, text: &str) -> Result<MessageId, ComandaError>;

    /// Subscribes to lifecycle events emitted after this call.
    fn events(&self) -> broadcast::Receiver<ChannelEvent>;
}
