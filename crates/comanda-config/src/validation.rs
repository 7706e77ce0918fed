// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind hosts, non-empty paths, and consistent delays.

use rust_decimal::Decimal;

use crate::diagnostic::ConfigError;
use crate::model::ComandaConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ComandaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let bridge_url = config.whatsapp.bridge_url.trim();
    if !(bridge_url.starts_with("http://") || bridge_url.starts_with("https://")) {
        fail(format!(
            "whatsapp.bridge_url `{bridge_url}` must start with http:// or https://"
        ));
    }
    if config.whatsapp.poll_interval_secs == 0 {
        fail("whatsapp.poll_interval_secs must be positive".to_string());
    }
    if config.whatsapp.request_timeout_secs == 0 {
        fail("whatsapp.request_timeout_secs must be positive".to_string());
    }

    if config.channel.reconnect_backoff_secs == 0 {
        fail("channel.reconnect_backoff_secs must be positive".to_string());
    }
    if config.channel.reconnect_backoff_max_secs < config.channel.reconnect_backoff_secs {
        fail(format!(
            "channel.reconnect_backoff_max_secs ({}) must not be less than reconnect_backoff_secs ({})",
            config.channel.reconnect_backoff_max_secs, config.channel.reconnect_backoff_secs
        ));
    }

    let notifications = &config.notifications;
    if notifications.send_timeout_secs == 0 {
        fail("notifications.send_timeout_secs must be positive".to_string());
    }
    if notifications.dispatch_delay_secs < notifications.confirmation_delay_secs {
        fail(format!(
            "notifications.dispatch_delay_secs ({}) must not be shorter than confirmation_delay_secs ({})",
            notifications.dispatch_delay_secs, notifications.confirmation_delay_secs
        ));
    }
    if notifications.confirmation_template.trim().is_empty() {
        fail("notifications.confirmation_template must not be empty".to_string());
    }
    if notifications.dispatch_template.trim().is_empty() {
        fail("notifications.dispatch_template must not be empty".to_string());
    }

    if config.receipt.delivery_fee < Decimal::ZERO {
        fail(format!(
            "receipt.delivery_fee must be non-negative, got {}",
            config.receipt.delivery_fee
        ));
    }
    if !(-12..=14).contains(&config.receipt.utc_offset_hours) {
        fail(format!(
            "receipt.utc_offset_hours must be within -12..=14, got {}",
            config.receipt.utc_offset_hours
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else {
        // Accept valid IPv4, IPv6, or hostname patterns
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }
    if config.gateway.port == 0 {
        fail("gateway.port must be nonzero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
