// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the backend client, the realtime channel, and the store.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::status::MessageStatus;

/// Server-assigned identifier of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        MessageId(value)
    }
}

/// Filters and pagination for a message list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub status: Option<MessageStatus>,
    /// Source program tag (`modulo`).
    pub program: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    /// 1-indexed page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            status: None,
            program: None,
            date_from: None,
            date_to: None,
            search: None,
            page: 1,
            page_size: 10,
        }
    }
}

impl MessageQuery {
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_status(mut self, status: Option<MessageStatus>) -> Self {
        self.status = status;
        self
    }

    /// Query-string pairs in the order the list endpoint documents them.
    ///
    /// Unset filters and blank strings are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        if let Some(program) = non_blank(&self.program) {
            pairs.push(("modulo", program.to_string()));
        }
        if let Some(from) = self.date_from {
            pairs.push(("dateFrom", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            pairs.push(("dateTo", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(search) = non_blank(&self.search) {
            pairs.push(("search", search.to_string()));
        }
        pairs
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// One page of messages plus the authoritative total across all pages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub total_count: u64,
}

/// Result of submitting a send batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub message_ids: Vec<MessageId>,
    pub count: u64,
}

/// Connection state of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}
