// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for customers, orders, and notification bookkeeping.

pub mod customers;
pub mod notifications;
pub mod orders;
