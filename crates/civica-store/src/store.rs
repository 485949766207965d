// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message store.
//!
//! Holds one page of messages and reconciles it against two sources: full
//! list fetches from the backend (which replace the page) and push events
//! (which patch single rows by identifier). Every mutation bumps a
//! revision counter that observers can await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use civica_core::{
    ChannelEvent, CivicaError, EventKind, Message, MessageBackend, MessageId, MessagePatch,
    MessageQuery, Recipient, SendReceipt,
};
use civica_realtime::{RealtimeChannel, Subscription};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::state::{FetchOutcome, OperationState, StoreSnapshot};

#[derive(Default)]
struct StoreState {
    messages: Vec<Message>,
    total_count: u64,
    /// Query of the page currently shown.
    query: MessageQuery,
    fetch: OperationState,
    send: OperationState,
    retries: HashMap<MessageId, OperationState>,
}

pub struct MessageStore {
    backend: Arc<dyn MessageBackend>,
    state: RwLock<StoreState>,
    /// Ticket of the newest fetch issued; older responses are discarded.
    latest_fetch: AtomicU64,
    revision: watch::Sender<u64>,
}

impl MessageStore {
    pub fn new(backend: Arc<dyn MessageBackend>, page_size: u32) -> Self {
        let query = MessageQuery {
            page_size,
            ..MessageQuery::default()
        };
        let (revision, _) = watch::channel(0);
        Self {
            backend,
            state: RwLock::new(StoreState {
                query,
                ..StoreState::default()
            }),
            latest_fetch: AtomicU64::new(0),
            revision,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Loads one page. Success replaces the page and total; failure keeps them.
    ///
    /// When several fetches overlap, only the most recently issued one may
    /// change the store. Earlier responses, successful or not, come back as
    /// [`FetchOutcome::Superseded`].
    pub async fn fetch(&self, query: MessageQuery) -> Result<FetchOutcome, CivicaError> {
        let ticket = {
            let mut state = self.write();
            state.fetch = OperationState::Loading;
            self.latest_fetch.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.bump();

        let result = self.backend.list_messages(&query).await;

        let mut state = self.write();
        if self.latest_fetch.load(Ordering::SeqCst) != ticket {
            debug!(ticket, page = query.page, "discarding superseded fetch response");
            return Ok(FetchOutcome::Superseded);
        }
        let outcome = match result {
            Ok(page) => {
                debug!(
                    page = query.page,
                    rows = page.messages.len(),
                    total = page.total_count,
                    "fetched messages"
                );
                state.messages = page.messages.clone();
                state.total_count = page.total_count;
                state.query = query;
                state.fetch = OperationState::Idle;
                let StoreState { messages, retries, .. } = &mut *state;
                retries.retain(|id, op| op.is_loading() || messages.iter().any(|m| &m.id == id));
                Ok(FetchOutcome::Applied(page))
            }
            Err(e) => {
                warn!(error = %e, "message fetch failed, keeping current page");
                state.fetch = OperationState::Failed(e.to_string());
                Err(e)
            }
        };
        drop(state);
        self.bump();
        outcome
    }

    /// Reloads the page currently shown. A page change that failed to
    /// load is not retried here.
    pub async fn refresh(&self) -> Result<FetchOutcome, CivicaError> {
        let query = self.read().query.clone();
        self.fetch(query).await
    }

    /// Submits a batch, then reloads the current page.
    ///
    /// No placeholder rows are inserted; new messages appear once the
    /// reload returns them. A failed reload is reported through the fetch
    /// state and does not fail the send.
    pub async fn send(&self, recipients: &[Recipient]) -> Result<SendReceipt, CivicaError> {
        self.write().send = OperationState::Loading;
        self.bump();

        let receipt = match self.backend.send_messages(recipients).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(error = %e, recipients = recipients.len(), "send failed");
                self.write().send = OperationState::Failed(e.to_string());
                self.bump();
                return Err(e);
            }
        };

        info!(count = receipt.count, "messages queued for sending");
        self.write().send = OperationState::Idle;
        self.bump();
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "reload after send failed");
        }
        Ok(receipt)
    }

    /// Asks the backend to reprocess one failed message, then reloads.
    ///
    /// The backend decides whether the retry is allowed. A rejection leaves
    /// the loaded messages untouched and is recorded for that row only.
    pub async fn retry(&self, id: &MessageId) -> Result<(), CivicaError> {
        self.write()
            .retries
            .insert(id.clone(), OperationState::Loading);
        self.bump();

        if let Err(e) = self.backend.retry_message(id).await {
            warn!(%id, error = %e, "retry failed");
            self.write()
                .retries
                .insert(id.clone(), OperationState::Failed(e.to_string()));
            self.bump();
            return Err(e);
        }

        info!(%id, "message retry accepted");
        self.write().retries.remove(id);
        self.bump();
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "reload after retry failed");
        }
        Ok(())
    }

    /// Merges a partial update into a loaded row.
    ///
    /// Returns `false` when the id is not loaded or the transition is not
    /// allowed; neither is an error.
    pub fn apply_patch(&self, id: &MessageId, patch: &MessagePatch) -> bool {
        let applied = {
            let mut state = self.write();
            match state.messages.iter_mut().find(|m| &m.id == id) {
                Some(message) => {
                    let applied = message.apply_patch(patch);
                    if !applied {
                        debug!(%id, from = %message.status, to = %patch.status, "ignoring stale patch");
                    }
                    applied
                }
                None => {
                    debug!(%id, status = %patch.status, "dropping patch for message not loaded");
                    false
                }
            }
        };
        if applied {
            self.bump();
        }
        applied
    }

    /// Applies every patch an event implies. Returns how many rows changed.
    pub fn apply_event(&self, event: &ChannelEvent) -> usize {
        event
            .patches()
            .into_iter()
            .filter(|(id, patch)| self.apply_patch(id, patch))
            .count()
    }

    /// Subscribes the store to every status event kind on `channel`.
    ///
    /// The listeners hold only a weak reference, so dropping the store
    /// turns them into no-ops.
    pub fn attach(self: &Arc<Self>, channel: &RealtimeChannel) -> Vec<Subscription> {
        [
            EventKind::MessageStatusUpdate,
            EventKind::MessageReply,
            EventKind::BulkStatusUpdate,
        ]
        .into_iter()
        .map(|kind| {
            let store: Weak<Self> = Arc::downgrade(self);
            channel.subscribe(kind, move |event| {
                if let Some(store) = store.upgrade() {
                    store.apply_event(event);
                }
            })
        })
        .collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read();
        StoreSnapshot {
            messages: state.messages.clone(),
            total_count: state.total_count,
            query: state.query.clone(),
            fetch: state.fetch.clone(),
            send: state.send.clone(),
            revision: *self.revision.borrow(),
        }
    }

    pub fn message(&self, id: &MessageId) -> Option<Message> {
        self.read().messages.iter().find(|m| &m.id == id).cloned()
    }

    pub fn fetch_state(&self) -> OperationState {
        self.read().fetch.clone()
    }

    pub fn send_state(&self) -> OperationState {
        self.read().send.clone()
    }

    pub fn retry_state(&self, id: &MessageId) -> OperationState {
        self.read().retries.get(id).cloned().unwrap_or_default()
    }

    /// Whether a retry control should be offered for `id`: the row is
    /// loaded, failed, and no retry for it is in flight.
    pub fn can_retry(&self, id: &MessageId) -> bool {
        let state = self.read();
        let in_flight = state.retries.get(id).is_some_and(OperationState::is_loading);
        !in_flight && state.messages.iter().any(|m| &m.id == id && m.can_retry())
    }

    /// Clears a fetch error once it has been shown.
    pub fn dismiss_fetch_error(&self) {
        let dismissed = {
            let mut state = self.write();
            if matches!(state.fetch, OperationState::Failed(_)) {
                state.fetch = OperationState::Idle;
                true
            } else {
                false
            }
        };
        if dismissed {
            self.bump();
        }
    }

    /// Revision counter bumped on every change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
