// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Comanda order backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Keys accepted in each `comanda.toml` section, in declaration order.
///
/// Drives env var mapping and unknown-key suggestions; must stay in step
/// with the section structs below.
pub const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("service", &["name", "log_level"]),
    ("storage", &["database_path", "wal_mode", "busy_timeout_ms"]),
    (
        "whatsapp",
        &["bridge_url", "api_token", "poll_interval_secs", "request_timeout_secs"],
    ),
    ("channel", &["reconnect_backoff_secs", "reconnect_backoff_max_secs"]),
    (
        "notifications",
        &[
            "confirmation_delay_secs",
            "dispatch_delay_secs",
            "send_timeout_secs",
            "rearm_max_age_secs",
            "confirmation_template",
            "dispatch_template",
        ],
    ),
    ("receipt", &["business_name", "delivery_fee", "utc_offset_hours"]),
    ("gateway", &["enabled", "host", "port", "allowed_origins"]),
];

/// Keys of `section`, or `None` if there is no such section.
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SECTION_KEYS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// Top-level Comanda configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ComandaConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// WhatsApp bridge connection settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Channel reconnect policy.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Deferred notification timing and wording.
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Receipt pricing and layout.
    #[serde(default)]
    pub receipt: ReceiptConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in logs and the health endpoint.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "comanda".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("comanda").join("comanda.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("comanda.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// WhatsApp Web bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Base URL of the bridge sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Bearer token sent to the bridge, if it requires one.
    #[serde(default)]
    pub api_token: Option<String>,

    /// How often the bridge status endpoint is polled.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Upper bound for a single bridge HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            api_token: None,
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WhatsAppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Reconnect policy applied when the channel drops.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// First reconnect delay; doubles on each consecutive failure.
    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,

    /// Ceiling for the reconnect delay.
    #[serde(default = "default_reconnect_backoff_max_secs")]
    pub reconnect_backoff_max_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
            reconnect_backoff_max_secs: default_reconnect_backoff_max_secs(),
        }
    }
}

impl ChannelConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn reconnect_backoff_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_max_secs)
    }
}

fn default_reconnect_backoff_secs() -> u64 {
    5
}

fn default_reconnect_backoff_max_secs() -> u64 {
    300
}

/// Deferred notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Delay between order submission and the "preparing" message.
    #[serde(default = "default_confirmation_delay_secs")]
    pub confirmation_delay_secs: u64,

    /// Delay between order submission and the "on its way" message.
    #[serde(default = "default_dispatch_delay_secs")]
    pub dispatch_delay_secs: u64,

    /// Upper bound for a single channel send, receipt included.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Orders older than this are not re-armed at startup.
    #[serde(default = "default_rearm_max_age_secs")]
    pub rearm_max_age_secs: u64,

    /// Message for the confirmation notification. Placeholders: `{name}`, `{order_id}`.
    #[serde(default = "default_confirmation_template")]
    pub confirmation_template: String,

    /// Message for the dispatch notification. Placeholders: `{name}`, `{order_id}`.
    #[serde(default = "default_dispatch_template")]
    pub dispatch_template: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            confirmation_delay_secs: default_confirmation_delay_secs(),
            dispatch_delay_secs: default_dispatch_delay_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            rearm_max_age_secs: default_rearm_max_age_secs(),
            confirmation_template: default_confirmation_template(),
            dispatch_template: default_dispatch_template(),
        }
    }
}

impl NotificationsConfig {
    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_secs(self.confirmation_delay_secs)
    }

    pub fn dispatch_delay(&self) -> Duration {
        Duration::from_secs(self.dispatch_delay_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn rearm_max_age(&self) -> Duration {
        Duration::from_secs(self.rearm_max_age_secs)
    }
}

fn default_confirmation_delay_secs() -> u64 {
    30
}

fn default_dispatch_delay_secs() -> u64 {
    30 * 60
}

fn default_send_timeout_secs() -> u64 {
    15
}

fn default_rearm_max_age_secs() -> u64 {
    6 * 60 * 60
}

fn default_confirmation_template() -> String {
    "Olá {name}! Seu pedido #{order_id} já está sendo preparado.".to_string()
}

fn default_dispatch_template() -> String {
    "{name}, seu pedido #{order_id} saiu para entrega!".to_string()
}

/// Receipt configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiptConfig {
    /// Header line printed at the top of every receipt.
    #[serde(default = "default_business_name")]
    pub business_name: String,

    /// Flat delivery fee added to every order.
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: Decimal,

    /// Offset from UTC used for the receipt timestamp.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            business_name: default_business_name(),
            delivery_fee: default_delivery_fee(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

fn default_business_name() -> String {
    "Comanda".to_string()
}

fn default_delivery_fee() -> Decimal {
    Decimal::new(500, 2)
}

fn default_utc_offset_hours() -> i32 {
    -3
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Whether the HTTP gateway is started by `serve`.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Address to bind the server to.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind the server to.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}
