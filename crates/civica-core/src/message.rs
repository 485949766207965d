// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message records and partial status patches.
//!
//! A record is replaced wholesale by a list fetch and patched in place by
//! push events. A patch only ever touches the status, the timestamp that
//! belongs to the new status, and the optional error or reply text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::MessageStatus;
use crate::types::MessageId;

/// One outbound WhatsApp message to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "_id")]
    pub id: MessageId,

    #[serde(rename = "nombre")]
    pub name: String,

    #[serde(rename = "apellido")]
    pub surname: String,

    #[serde(rename = "telefono")]
    pub phone: String,

    #[serde(rename = "edad", default)]
    pub age: Option<u32>,

    /// Source program tag.
    #[serde(rename = "modulo", default)]
    pub program: Option<String>,

    /// Name of the center, kitchen, or dining hall the recipient belongs to.
    #[serde(rename = "entidad", default)]
    pub entity: Option<String>,

    pub status: MessageStatus,

    /// Human-readable detail, mostly failure reasons.
    #[serde(default)]
    pub status_message: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replied_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub reply_content: Option<String>,
}

impl Message {
    /// Retry is offered on failed rows only.
    pub fn can_retry(&self) -> bool {
        self.status.is_retryable()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }

    /// Merge a patch into this record.
    ///
    /// Returns `false` and leaves the record untouched when the status
    /// transition is not allowed (duplicate event, late out-of-order event).
    pub fn apply_patch(&mut self, patch: &MessagePatch) -> bool {
        if !self.status.can_transition_to(patch.status) {
            return false;
        }

        if self.status == MessageStatus::Failed && patch.status != MessageStatus::Failed {
            self.status_message = None;
        }
        self.status = patch.status;
        match patch.status {
            MessageStatus::Sent => self.sent_at = Some(patch.timestamp),
            MessageStatus::Delivered => self.delivered_at = Some(patch.timestamp),
            MessageStatus::Read => self.read_at = Some(patch.timestamp),
            MessageStatus::Replied => {
                self.replied_at = Some(patch.timestamp);
                if let Some(content) = &patch.reply_content {
                    self.reply_content = Some(content.clone());
                }
            }
            MessageStatus::Pending | MessageStatus::Sending | MessageStatus::Failed => {}
        }
        if let Some(error) = &patch.error {
            self.status_message = Some(error.clone());
        }
        true
    }
}

/// Partial update carried by a push event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePatch {
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub reply_content: Option<String>,
}

impl MessagePatch {
    pub fn status(status: MessageStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            timestamp,
            error: None,
            reply_content: None,
        }
    }

    pub fn failed(timestamp: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Failed,
            timestamp,
            error: Some(error.into()),
            reply_content: None,
        }
    }

    pub fn reply(timestamp: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Replied,
            timestamp,
            error: None,
            reply_content: Some(content.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 10, minute, 0).unwrap()
    }

    fn message(status: MessageStatus) -> Message {
        Message {
            id: MessageId::from("m-1"),
            name: "Rosa".into(),
            surname: "Fuentes".into(),
            phone: "+56911111111".into(),
            age: Some(81),
            program: Some("adulto_mayor".into()),
            entity: Some("Centro Los Aromos".into()),
            status,
            status_message: None,
            created_at: Some(ts(0)),
            sent_at: None,
            delivered_at: None,
            read_at: None,
            replied_at: None,
            reply_content: None,
        }
    }

    #[test]
    fn delivered_patch_sets_only_status_and_delivered_at() {
        let mut msg = message(MessageStatus::Sent);
        msg.sent_at = Some(ts(1));
        let before = msg.clone();

        assert!(msg.apply_patch(&MessagePatch::status(MessageStatus::Delivered, ts(2))));

        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.delivered_at, Some(ts(2)));
        let mut expected = before;
        expected.status = MessageStatus::Delivered;
        expected.delivered_at = Some(ts(2));
        assert_eq!(msg, expected);
    }

    #[test]
    fn reply_patch_sets_reply_fields_from_any_state() {
        for status in [
            MessageStatus::Pending,
            MessageStatus::Sent,
            MessageStatus::Read,
            MessageStatus::Failed,
        ] {
            let mut msg = message(status);
            assert!(msg.apply_patch(&MessagePatch::reply(ts(5), "¡Gracias!")));
            assert_eq!(msg.status, MessageStatus::Replied);
            assert_eq!(msg.replied_at, Some(ts(5)));
            assert_eq!(msg.reply_content.as_deref(), Some("¡Gracias!"));
        }
    }

    #[test]
    fn second_reply_is_ignored() {
        let mut msg = message(MessageStatus::Sent);
        msg.apply_patch(&MessagePatch::reply(ts(5), "first"));
        assert!(!msg.apply_patch(&MessagePatch::reply(ts(6), "second")));
        assert_eq!(msg.reply_content.as_deref(), Some("first"));
        assert_eq!(msg.replied_at, Some(ts(5)));
    }

    #[test]
    fn failed_patch_records_reason() {
        let mut msg = message(MessageStatus::Sending);
        assert!(msg.apply_patch(&MessagePatch::failed(ts(3), "invalid number")));
        assert_eq!(msg.status, MessageStatus::Failed);
        assert_eq!(msg.status_message.as_deref(), Some("invalid number"));
        assert!(msg.can_retry());
    }

    #[test]
    fn leaving_failed_clears_the_old_reason() {
        let mut msg = message(MessageStatus::Sending);
        msg.apply_patch(&MessagePatch::failed(ts(3), "invalid number"));

        assert!(msg.apply_patch(&MessagePatch::status(MessageStatus::Sent, ts(7))));
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.status_message, None);
        assert_eq!(msg.sent_at, Some(ts(7)));
    }

    #[test]
    fn late_event_does_not_regress_status() {
        let mut msg = message(MessageStatus::Delivered);
        msg.delivered_at = Some(ts(4));
        let before = msg.clone();
        assert!(!msg.apply_patch(&MessagePatch::status(MessageStatus::Sent, ts(2))));
        assert_eq!(msg, before);
    }

    #[test]
    fn deserializes_backend_record() {
        let json = serde_json::json!({
            "_id": "665f1c",
            "nombre": "Luis",
            "apellido": "Mella",
            "telefono": "+56922222222",
            "edad": 70,
            "modulo": "comedores",
            "entidad": "Comedor Central",
            "status": "failed",
            "statusMessage": "invalid number",
            "createdAt": "2026-03-14T10:00:00Z"
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.id, MessageId::from("665f1c"));
        assert_eq!(msg.status, MessageStatus::Failed);
        assert_eq!(msg.age, Some(70));
        assert_eq!(msg.created_at, Some(ts(0)));
        assert!(msg.sent_at.is_none());
        assert_eq!(msg.full_name(), "Luis Mella");
    }

    #[test]
    fn unknown_status_token_is_rejected() {
        let json = serde_json::json!({
            "id": "x",
            "nombre": "A",
            "apellido": "B",
            "telefono": "1",
            "status": "queued"
        });
        assert!(serde_json::from_value::<Message>(json).is_err());
    }
}
