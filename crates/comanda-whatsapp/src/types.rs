// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge HTTP API request/response types.

use serde::{Deserialize, Serialize};

use comanda_core::CanonicalPhone;
use comanda_core::types::ChannelEvent;

/// Session state as reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Initializing,
    /// Waiting for the phone to scan a pairing code.
    Qr,
    Authenticated,
    Ready,
    AuthFailure,
    Disconnected,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: BridgeState,
    /// Pairing payload while `state == qr`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    /// Why the session dropped, for `auth_failure` and `disconnected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusResponse {
    /// The lifecycle event this status corresponds to.
    pub fn to_event(&self) -> ChannelEvent {
        let reason = || self.reason.clone().unwrap_or_else(|| "unknown".to_string());
        match self.state {
            BridgeState::Initializing => ChannelEvent::Initializing,
            BridgeState::Qr => ChannelEvent::PairingRequired(self.qr.clone()),
            BridgeState::Authenticated => ChannelEvent::Authenticated,
            BridgeState::Ready => ChannelEvent::Ready,
            BridgeState::AuthFailure => ChannelEvent::AuthFailure(reason()),
            BridgeState::Disconnected => ChannelEvent::Disconnected(reason()),
        }
    }
}

/// Body of `POST /send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest<'a> {
    pub to: String,
    pub text: &'a str,
}

/// Body of a successful `POST /send`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendResponse {
    pub id: String,
}

/// WhatsApp chat id for a canonical phone: `<digits>@c.us`.
pub fn chat_id(phone: &CanonicalPhone) -> String {
    format!("{}@c.us", phone.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_uses_canonical_digits() {
        let phone = comanda_core::normalize("(11) 99123-4567").unwrap();
        assert_eq!(chat_id(&phone), "551191234567@c.us");
    }

    #[test]
    fn status_maps_to_events() {
        let status: StatusResponse =
            serde_json::from_str(r#"{"state":"qr","qr":"2@abc"}"#).unwrap();
        assert_eq!(
            status.to_event(),
            ChannelEvent::PairingRequired(Some("2@abc".into()))
        );

        let status: StatusResponse = serde_json::from_str(r#"{"state":"ready"}"#).unwrap();
        assert_eq!(status.to_event(), ChannelEvent::Ready);

        let status: StatusResponse =
            serde_json::from_str(r#"{"state":"disconnected","reason":"LOGOUT"}"#).unwrap();
        assert_eq!(status.to_event(), ChannelEvent::Disconnected("LOGOUT".into()));

        let status: StatusResponse = serde_json::from_str(r#"{"state":"auth_failure"}"#).unwrap();
        assert_eq!(status.to_event(), ChannelEvent::AuthFailure("unknown".into()));
    }

    #[test]
    fn unknown_state_is_rejected() {
        assert!(serde_json::from_str::<StatusResponse>(r#"{"state":"booting"}"#).is_err());
    }

    #[test]
    fn send_request_shape() {
        let body = SendRequest {
            to: "551191234567@c.us".into(),
            text: "oi",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"to": "551191234567@c.us", "text": "oi"})
        );
    }
}
