// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Web bridge sidecar.
//!
//! The bridge owns the browser session. Comanda only asks it to start a
//! session (`POST /connect`), reads its state (`GET /status`) and pushes
//! text (`POST /send`).

use comanda_config::model::WhatsAppConfig;
use comanda_core::{CanonicalPhone, ComandaError};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{SendRequest, SendResponse, StatusResponse, chat_id};

/// HTTP client for bridge communication.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    /// Creates a client with the configured bearer token and request timeout.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, ComandaError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                ComandaError::Config(format!("invalid whatsapp.api_token header value: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ComandaError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Asks the bridge to start (or restart) its session.
    pub async fn start_session(&self) -> Result<(), ComandaError> {
        let response = self
            .client
            .post(self.url("/connect"))
            .send()
            .await
            .map_err(request_failed)?;
        check_status(response).await.map(|_| ())
    }

    /// Current session state.
    pub async fn status(&self) -> Result<StatusResponse, ComandaError> {
        let response = self
            .client
            .get(self.url("/status"))
            .send()
            .await
            .map_err(request_failed)?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ComandaError::Channel {
                message: format!("invalid status response: {e}"),
                source: Some(Box::new(e)),
            })
    }

    /// Sends `text` to the chat of `to`. Returns the bridge's message id.
    pub async fn send_text(&self, to: &CanonicalPhone, text: &str) -> Result<String, ComandaError> {
        let body = SendRequest {
            to: chat_id(to),
            text,
        };
        let response = self
            .client
            .post(self.url("/send"))
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        let sent: SendResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ComandaError::Channel {
                message: format!("invalid send response: {e}"),
                source: Some(Box::new(e)),
            })?;
        debug!(to = %body.to, id = %sent.id, "bridge accepted message");
        Ok(sent.id)
    }
}

fn request_failed(e: reqwest::Error) -> ComandaError {
    ComandaError::Channel {
        message: format!("bridge request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ComandaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ComandaError::Channel {
        message: format!("bridge returned {status}: {body}"),
        source: None,
    })
}
