// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Civica messaging client.
//!
//! This crate provides the error type, the WhatsApp message lifecycle model,
//! push-event payloads, birthday recipients, and the adapter traits the
//! backend client and realtime channel implement.

pub mod error;
pub mod event;
pub mod message;
pub mod recipient;
pub mod status;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CivicaError;
pub use event::{ChannelEvent, EventKind, Frame};
pub use message::{Message, MessagePatch};
pub use recipient::{Person, Recipient, RecipientBatch};
pub use status::{MessageStatus, StatusTab};
pub use types::{ConnectionState, MessageId, MessagePage, MessageQuery, SendReceipt};

pub use traits::{EventConnection, EventConnector, MessageBackend};
