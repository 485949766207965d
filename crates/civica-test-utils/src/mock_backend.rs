// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory messaging backend for deterministic testing.
//!
//! `MockBackend` implements `MessageBackend` over a vector of server-side
//! records. List calls can be held and released one by one to reproduce
//! out-of-order responses, and failures can be scripted per operation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex, Notify};

use civica_core::{
    CivicaError, Message, MessageBackend, MessageId, MessagePage, MessageQuery, MessageStatus,
    Recipient, SendReceipt,
};

struct HeldList {
    query: MessageQuery,
    release: oneshot::Sender<()>,
}

/// A scripted backend holding its records in memory.
pub struct MockBackend {
    records: Mutex<Vec<Message>>,
    list_failures: Mutex<VecDeque<CivicaError>>,
    send_failures: Mutex<VecDeque<CivicaError>>,
    retry_failures: Mutex<VecDeque<CivicaError>>,
    hold_lists: AtomicBool,
    held: Mutex<Vec<HeldList>>,
    held_changed: Notify,
    list_calls: Mutex<Vec<MessageQuery>>,
    sent: Mutex<Vec<Vec<Recipient>>>,
    retried: Mutex<Vec<MessageId>>,
    next_id: AtomicU64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    /// Create a backend pre-loaded with server-side records.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            records: Mutex::new(messages),
            list_failures: Mutex::new(VecDeque::new()),
            send_failures: Mutex::new(VecDeque::new()),
            retry_failures: Mutex::new(VecDeque::new()),
            hold_lists: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
            held_changed: Notify::new(),
            list_calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            retried: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn records(&self) -> Vec<Message> {
        self.records.lock().await.clone()
    }

    /// Move a server-side record to `status`, as the provider would.
    pub async fn set_status(&self, id: &str, status: MessageStatus) {
        if let Some(record) = self
            .records
            .lock()
            .await
            .iter_mut()
            .find(|m| m.id.as_str() == id)
        {
            record.status = status;
        }
    }

    pub async fn fail_next_list(&self, err: CivicaError) {
        self.list_failures.lock().await.push_back(err);
    }

    pub async fn fail_next_send(&self, err: CivicaError) {
        self.send_failures.lock().await.push_back(err);
    }

    pub async fn fail_next_retry(&self, err: CivicaError) {
        self.retry_failures.lock().await.push_back(err);
    }

    /// While enabled, list calls wait until released with [`release_list`](Self::release_list).
    pub fn hold_lists(&self, hold: bool) {
        self.hold_lists.store(hold, Ordering::SeqCst);
    }

    /// Wait until at least `count` list calls are being held.
    pub async fn wait_for_held(&self, count: usize) {
        loop {
            let notified = self.held_changed.notified();
            if self.held.lock().await.len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Release the held list call whose query asked for `page`.
    ///
    /// Returns `false` when no held call matches.
    pub async fn release_list(&self, page: u32) -> bool {
        let mut held = self.held.lock().await;
        let Some(index) = held.iter().position(|h| h.query.page == page) else {
            return false;
        };
        let call = held.remove(index);
        call.release.send(()).is_ok()
    }

    pub async fn list_calls(&self) -> Vec<MessageQuery> {
        self.list_calls.lock().await.clone()
    }

    pub async fn sent_batches(&self) -> Vec<Vec<Recipient>> {
        self.sent.lock().await.clone()
    }

    pub async fn retried_ids(&self) -> Vec<MessageId> {
        self.retried.lock().await.clone()
    }

    async fn wait_if_held(&self, query: &MessageQuery) {
        if !self.hold_lists.load(Ordering::SeqCst) {
            return;
        }
        let (release, released) = oneshot::channel();
        self.held.lock().await.push(HeldList {
            query: query.clone(),
            release,
        });
        self.held_changed.notify_waiters();
        let _ = released.await;
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_query(message: &Message, query: &MessageQuery) -> bool {
    if query.status.is_some_and(|status| status != message.status) {
        return false;
    }
    if let Some(program) = query.program.as_deref().filter(|p| !p.is_empty())
        && message.program.as_deref() != Some(program)
    {
        return false;
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let haystack = format!("{} {} {}", message.name, message.surname, message.phone);
        if !haystack.to_lowercase().contains(&needle) {
            return false;
        }
    }
    true
}

#[async_trait]
impl MessageBackend for MockBackend {
    async fn list_messages(&self, query: &MessageQuery) -> Result<MessagePage, CivicaError> {
        self.list_calls.lock().await.push(query.clone());
        self.wait_if_held(query).await;

        if let Some(err) = self.list_failures.lock().await.pop_front() {
            return Err(err);
        }

        let records = self.records.lock().await;
        let matching: Vec<&Message> = records
            .iter()
            .filter(|m| matches_query(m, query))
            .collect();
        let page_size = query.page_size.max(1) as usize;
        let start = (query.page.max(1) as usize - 1) * page_size;
        Ok(MessagePage {
            total_count: matching.len() as u64,
            messages: matching
                .into_iter()
                .skip(start)
                .take(page_size)
                .cloned()
                .collect(),
        })
    }

    async fn send_messages(&self, recipients: &[Recipient]) -> Result<SendReceipt, CivicaError> {
        self.sent.lock().await.push(recipients.to_vec());
        if let Some(err) = self.send_failures.lock().await.pop_front() {
            return Err(err);
        }

        let mut records = self.records.lock().await;
        let mut ids = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let id = MessageId(format!("mock-msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
            records.push(Message {
                id: id.clone(),
                name: recipient.name.clone(),
                surname: recipient.surname.clone(),
                phone: recipient.phone.clone(),
                age: Some(recipient.age),
                program: Some(recipient.program.clone()),
                entity: recipient.entity.clone(),
                status: MessageStatus::Pending,
                status_message: None,
                created_at: Some(chrono::Utc::now()),
                sent_at: None,
                delivered_at: None,
                read_at: None,
                replied_at: None,
                reply_content: None,
            });
            ids.push(id);
        }
        Ok(SendReceipt {
            count: ids.len() as u64,
            message_ids: ids,
        })
    }

    async fn retry_message(&self, id: &MessageId) -> Result<(), CivicaError> {
        self.retried.lock().await.push(id.clone());
        if let Some(err) = self.retry_failures.lock().await.pop_front() {
            return Err(err);
        }

        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|m| &m.id == id) else {
            return Err(CivicaError::Rejected {
                status: 404,
                message: format!("message {id} not found"),
            });
        };
        if record.status != MessageStatus::Failed {
            return Err(CivicaError::Rejected {
                status: 400,
                message: format!("message {id} is not failed"),
            });
        }
        record.status = MessageStatus::Pending;
        record.status_message = None;
        Ok(())
    }
}
