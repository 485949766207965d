// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire envelopes for the `/whatsapp/messages` endpoints.

use civica_core::{Message, Recipient, SendReceipt};
use serde::{Deserialize, Serialize};

/// Every success body wraps its payload in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Payload of `GET /whatsapp/messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    pub data: Vec<Message>,
    pub total_count: u64,
}

/// Body of `POST /whatsapp/messages/send`.
#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub personas: &'a [Recipient],
}

pub type ListResponse = Envelope<MessageList>;
pub type SendResponse = Envelope<SendReceipt>;

/// Error body returned by the backend. `message` is a string or, for
/// validation failures, a list of strings.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    /// Best human-readable description of the failure.
    pub fn describe(&self) -> Option<String> {
        let message = match &self.message {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        };
        message.filter(|m| !m.is_empty()).or_else(|| self.error.clone())
    }
}
