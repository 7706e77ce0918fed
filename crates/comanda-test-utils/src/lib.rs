// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Comanda integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a WhatsApp bridge.
//!
//! # Components
//!
//! - [`MockChannel`] - Mock messaging channel with send capture and scripted lifecycle
//! - [`MemoryStorage`] - In-memory order store with the SQLite claim semantics
//! - [`TestHarness`] - The full order stack over temp storage

pub mod harness;
pub mod memory_storage;
pub mod mock_channel;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_storage::MemoryStorage;
pub use mock_channel::{MockChannel, SentMessage};
