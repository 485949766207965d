// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message lifecycle statuses and the dashboard tabs that group them.
//!
//! The happy path is `pending -> sending -> sent -> delivered -> read -> replied`.
//! `failed` diverges from any pre-delivery state, and `replied` can be reached
//! from anywhere because the backend does not always emit the intermediate
//! delivery and read events.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle status of an outbound message.
///
/// The string tokens are shared by the REST API and the push channel and
/// are case-sensitive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sending,
    Sent,
    Delivered,
    Read,
    Replied,
    Failed,
}

impl MessageStatus {
    /// Every status, in happy-path order followed by `failed`.
    pub const ALL: [MessageStatus; 7] = [
        MessageStatus::Pending,
        MessageStatus::Sending,
        MessageStatus::Sent,
        MessageStatus::Delivered,
        MessageStatus::Read,
        MessageStatus::Replied,
        MessageStatus::Failed,
    ];

    /// Position on the happy path. `failed` is off the path.
    fn rank(self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sending => Some(1),
            MessageStatus::Sent => Some(2),
            MessageStatus::Delivered => Some(3),
            MessageStatus::Read => Some(4),
            MessageStatus::Replied => Some(5),
            MessageStatus::Failed => None,
        }
    }

    /// Whether a push event may move a message from `self` to `next`.
    ///
    /// Forward moves along the happy path are allowed, including skips.
    /// `failed` is only reachable before delivery. A failed message may
    /// re-enter the pipeline after an in-place retry. Nothing leaves `replied`.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;

        match (self, next) {
            (current, next) if current == next => false,
            (Replied, _) => false,
            (_, Replied) => true,
            (Failed, Pending | Sending | Sent) => true,
            (Failed, _) => false,
            (Pending | Sending | Sent, Failed) => true,
            (_, Failed) => false,
            (current, next) => match (current.rank(), next.rank()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }

    /// `replied` and `failed` end the lifecycle until a retry is requested.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Replied | MessageStatus::Failed)
    }

    /// Only failed messages can be retried.
    pub fn is_retryable(self) -> bool {
        self == MessageStatus::Failed
    }

    /// Label shown in the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            MessageStatus::Pending => "Pendiente",
            MessageStatus::Sending => "Enviando",
            MessageStatus::Sent => "Enviado",
            MessageStatus::Delivered => "Entregado",
            MessageStatus::Read => "Leído",
            MessageStatus::Replied => "Respondido",
            MessageStatus::Failed => "Fallido",
        }
    }
}

/// Tabs on the messages screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusTab {
    All,
    InProgress,
    Delivered,
    Read,
    Replied,
    Failed,
}

impl StatusTab {
    /// Statuses a row may have to belong to this tab.
    pub fn statuses(self) -> &'static [MessageStatus] {
        use MessageStatus::*;

        match self {
            StatusTab::All => &MessageStatus::ALL,
            StatusTab::InProgress => &[Pending, Sending, Sent],
            StatusTab::Delivered => &[Delivered],
            StatusTab::Read => &[Read],
            StatusTab::Replied => &[Replied],
            StatusTab::Failed => &[Failed],
        }
    }

    /// The single `status` query value sent to the backend for this tab.
    ///
    /// The list endpoint accepts one status, so `InProgress` narrows to
    /// `pending`; rows are then re-classified locally with [`StatusTab::matches`].
    pub fn query_status(self) -> Option<MessageStatus> {
        match self {
            StatusTab::All => None,
            StatusTab::InProgress => Some(MessageStatus::Pending),
            StatusTab::Delivered => Some(MessageStatus::Delivered),
            StatusTab::Read => Some(MessageStatus::Read),
            StatusTab::Replied => Some(MessageStatus::Replied),
            StatusTab::Failed => Some(MessageStatus::Failed),
        }
    }

    pub fn matches(self, status: MessageStatus) -> bool {
        self.statuses().contains(&status)
    }
}
