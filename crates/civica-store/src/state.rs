// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-operation progress and the read-only views the store hands out.

use std::collections::BTreeMap;

use civica_core::{Message, MessagePage, MessageQuery, MessageStatus, StatusTab};

/// Progress of one store operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperationState {
    #[default]
    Idle,
    Loading,
    Failed(String),
}

impl OperationState {
    pub fn is_loading(&self) -> bool {
        matches!(self, OperationState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            OperationState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// What happened to a fetch response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The response was the newest and now backs the store.
    Applied(MessagePage),
    /// A newer fetch was issued meanwhile; the response was discarded.
    Superseded,
}

/// Point-in-time copy of the store, for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub messages: Vec<Message>,
    pub total_count: u64,
    /// Query that produced `messages`.
    pub query: MessageQuery,
    pub fetch: OperationState,
    pub send: OperationState,
    pub revision: u64,
}

impl StoreSnapshot {
    pub fn total_pages(&self) -> u64 {
        let size = u64::from(self.query.page_size.max(1));
        self.total_count.div_ceil(size)
    }

    /// Loaded rows that belong to `tab`.
    pub fn in_tab(&self, tab: StatusTab) -> Vec<&Message> {
        self.messages.iter().filter(|m| tab.matches(m.status)).collect()
    }

    /// Number of loaded rows per status. Statuses with no rows are omitted.
    pub fn status_counts(&self) -> BTreeMap<MessageStatus, usize> {
        let mut counts = BTreeMap::new();
        for message in &self.messages {
            *counts.entry(message.status).or_insert(0) += 1;
        }
        counts
    }
}
