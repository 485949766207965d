// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST backend adapter trait.

use async_trait::async_trait;

use crate::error::CivicaError;
use crate::recipient::Recipient;
use crate::types::{MessageId, MessagePage, MessageQuery, SendReceipt};

/// The list/send/retry surface of the messaging backend.
#[async_trait]
pub trait MessageBackend: Send + Sync + 'static {
    /// Fetches one page of messages matching `query`.
    async fn list_messages(&self, query: &MessageQuery) -> Result<MessagePage, CivicaError>;

    /// Submits a batch of recipients. The backend creates one message per recipient.
    async fn send_messages(&self, recipients: &[Recipient]) -> Result<SendReceipt, CivicaError>;

    /// Asks the backend to reprocess a failed message in place.
    ///
    /// The backend rejects retries of messages that are not failed with
    /// [`CivicaError::Rejected`].
    async fn retry_message(&self, id: &MessageId) -> Result<(), CivicaError>;
}
