// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push events delivered over the realtime channel.
//!
//! Every WebSocket text frame is a JSON envelope:
//!
//! ```json
//! {"event": "message_status_update", "data": {"messageId": "...", "status": "sent", "timestamp": "..."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::CivicaError;
use crate::message::MessagePatch;
use crate::status::MessageStatus;
use crate::types::MessageId;

/// Named events the channel re-dispatches to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    MessageStatusUpdate,
    MessageReply,
    BulkStatusUpdate,
}

/// Wire envelope for one frame in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn parse(text: &str) -> Result<Self, CivicaError> {
        serde_json::from_str(text).map_err(|e| CivicaError::Decode {
            message: format!("invalid event frame: {e}"),
            source: Some(Box::new(e)),
        })
    }

    pub fn to_text(&self) -> Result<String, CivicaError> {
        serde_json::to_string(self).map_err(|e| CivicaError::Internal(format!(
            "failed to encode event frame: {e}"
        )))
    }
}

/// Payload of `message_status_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub message_id: MessageId,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload of `message_reply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyReceived {
    pub message_id: MessageId,
    #[serde(default = "replied")]
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    pub reply_content: String,
}

fn replied() -> MessageStatus {
    MessageStatus::Replied
}

/// Payload of `bulk_status_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusUpdate {
    pub message_ids: Vec<MessageId>,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StatusUpdate(StatusUpdate),
    Reply(ReplyReceived),
    BulkStatusUpdate(BulkStatusUpdate),
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChannelEvent::StatusUpdate(_) => EventKind::MessageStatusUpdate,
            ChannelEvent::Reply(_) => EventKind::MessageReply,
            ChannelEvent::BulkStatusUpdate(_) => EventKind::BulkStatusUpdate,
        }
    }

    /// Decode a frame. Frames for events this client does not know return `Ok(None)`.
    pub fn from_frame(frame: Frame) -> Result<Option<Self>, CivicaError> {
        let Ok(kind) = frame.event.parse::<EventKind>() else {
            return Ok(None);
        };

        let decode_err = |e: serde_json::Error| CivicaError::Decode {
            message: format!("invalid {kind} payload: {e}"),
            source: Some(Box::new(e)),
        };

        let event = match kind {
            EventKind::MessageStatusUpdate => {
                ChannelEvent::StatusUpdate(serde_json::from_value(frame.data).map_err(decode_err)?)
            }
            EventKind::MessageReply => {
                ChannelEvent::Reply(serde_json::from_value(frame.data).map_err(decode_err)?)
            }
            EventKind::BulkStatusUpdate => ChannelEvent::BulkStatusUpdate(
                serde_json::from_value(frame.data).map_err(decode_err)?,
            ),
        };
        Ok(Some(event))
    }

    /// Encode as a frame, as the backend would send it.
    pub fn to_frame(&self) -> Result<Frame, CivicaError> {
        let data = match self {
            ChannelEvent::StatusUpdate(p) => serde_json::to_value(p),
            ChannelEvent::Reply(p) => serde_json::to_value(p),
            ChannelEvent::BulkStatusUpdate(p) => serde_json::to_value(p),
        }
        .map_err(|e| CivicaError::Internal(format!("failed to encode event: {e}")))?;
        Ok(Frame::new(self.kind().as_ref(), data))
    }

    /// The per-message patches this event implies.
    pub fn patches(&self) -> Vec<(MessageId, MessagePatch)> {
        match self {
            ChannelEvent::StatusUpdate(update) => vec![(
                update.message_id.clone(),
                MessagePatch {
                    status: update.status,
                    timestamp: update.timestamp,
                    error: update.error.clone(),
                    reply_content: None,
                },
            )],
            ChannelEvent::Reply(reply) => vec![(
                reply.message_id.clone(),
                MessagePatch::reply(reply.timestamp, reply.reply_content.clone()),
            )],
            ChannelEvent::BulkStatusUpdate(bulk) => bulk
                .message_ids
                .iter()
                .map(|id| (id.clone(), MessagePatch::status(bulk.status, bulk.timestamp)))
                .collect(),
        }
    }
}
