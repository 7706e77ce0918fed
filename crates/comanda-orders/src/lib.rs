// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order flow for the Comanda backend.
//!
//! - [`receipt`] turns an order into the text receipt and its totals.
//! - [`gate`] tracks channel readiness and admits or rejects submissions.
//! - [`supervisor`] feeds channel events into the gate and reconnects.
//! - [`scheduler`] fires the delayed confirmation and dispatch messages at
//!   most once per order.
//! - [`service`] ties them together behind `identify_customer`,
//!   `submit_order` and `order_history`.

pub mod gate;
pub mod messages;
pub mod receipt;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod supervisor;

pub use gate::{ChannelState, ReadinessGate};
pub use receipt::{ReceiptRenderer, ReceiptTotals};
pub use scheduler::{FireOutcome, NotificationScheduler, NotificationTask};
pub use service::{CustomerLookup, OrderRequest, OrderService, OrderSummary, SubmittedOrder};
pub use supervisor::{Backoff, ReadinessSupervisor};
