// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wording of the deferred notifications.

use comanda_config::model::NotificationsConfig;
use comanda_core::types::{NotificationKind, OrderId};

/// Fill `{name}` and `{order_id}` in a template. Unknown braces are left as-is.
///
/// Substitution is a single pass over the template, so placeholder text
/// inside a customer's name is never expanded.
pub fn fill_template(template: &str, name: &str, order_id: OrderId) -> String {
    let mut out = String::with_capacity(template.len() + name.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{name}") {
            out.push_str(name);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{order_id}") {
            out.push_str(&order_id.to_string());
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// The configured template for `kind`.
pub fn template_for(config: &NotificationsConfig, kind: NotificationKind) -> &str {
    match kind {
        NotificationKind::Confirmation => &config.confirmation_template,
        NotificationKind::Dispatch => &config.dispatch_template,
    }
}
