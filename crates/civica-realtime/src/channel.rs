// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated push-event channel with bounded reconnection.
//!
//! One background task owns the socket for each session. It reads frames,
//! decodes them into [`ChannelEvent`]s and dispatches them to the listener
//! registry. Outbound frames reach it through an mpsc queue that only
//! exists while the channel is connected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use civica_config::model::RealtimeConfig;
use civica_core::{
    ChannelEvent, CivicaError, ConnectionState, EventConnection, EventConnector, EventKind, Frame,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::listeners::{ListenerRegistry, Subscription};

/// Capacity of the outbound frame queue.
const OUTBOUND_BUFFER: usize = 64;

/// Connection behaviour knobs, usually taken from `[realtime]`.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub url: String,
    /// Retries after a failed open or an unexpected drop before giving up.
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl From<&RealtimeConfig> for ChannelOptions {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            url: config.url.clone(),
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        }
    }
}

struct Session {
    generation: u64,
    cancel: CancellationToken,
    outbound: Option<mpsc::Sender<String>>,
}

struct Inner {
    options: ChannelOptions,
    connector: Arc<dyn EventConnector>,
    listeners: Arc<ListenerRegistry>,
    credential: Mutex<Option<String>>,
    session: Mutex<Option<Session>>,
    generations: AtomicU64,
    state: watch::Sender<ConnectionState>,
    last_error: watch::Sender<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    /// Publishes `state` if `generation` is still the live session.
    fn publish(&self, generation: u64, state: ConnectionState) -> bool {
        let session = lock(&self.session);
        if !is_current(&session, generation) {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn mark_connected(&self, generation: u64, outbound: mpsc::Sender<String>) -> bool {
        let mut session = lock(&self.session);
        match session.as_mut() {
            Some(live) if live.generation == generation => {
                live.outbound = Some(outbound);
                self.state.send_replace(ConnectionState::Connected);
                true
            }
            _ => false,
        }
    }

    fn clear_outbound(&self, generation: u64) {
        let mut session = lock(&self.session);
        if let Some(live) = session.as_mut().filter(|s| s.generation == generation) {
            live.outbound = None;
        }
    }

    /// Ends the session from inside its task after reconnection gave up.
    fn give_up(&self, generation: u64) {
        let mut session = lock(&self.session);
        if is_current(&session, generation) {
            *session = None;
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }

    fn record_error(&self, message: String) {
        self.last_error.send_replace(Some(message));
    }

    fn handle_frame(&self, text: &str) {
        let event = match Frame::parse(text).and_then(ChannelEvent::from_frame) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(frame = %text, "ignoring frame for unknown event");
                return;
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };
        let delivered = self.listeners.dispatch(&event);
        debug!(event = %event.kind(), delivered, "dispatched event");
    }
}

fn is_current(session: &Option<Session>, generation: u64) -> bool {
    session.as_ref().is_some_and(|s| s.generation == generation)
}

/// Realtime channel handle.
///
/// Dropping the handle tears the connection down. Share it behind an `Arc`
/// when several components need it.
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

impl RealtimeChannel {
    pub fn new(options: ChannelOptions, connector: Arc<dyn EventConnector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (last_error, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                options,
                connector,
                listeners: Arc::new(ListenerRegistry::new()),
                credential: Mutex::new(None),
                session: Mutex::new(None),
                generations: AtomicU64::new(0),
                state,
                last_error,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Most recent connection failure, kept after recovery for diagnostics.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.borrow().clone()
    }

    pub fn credential(&self) -> Option<String> {
        lock(&self.inner.credential).clone()
    }

    /// Opens the channel with the current credential.
    ///
    /// Idempotent: returns `false` without opening a second socket when a
    /// session is already connecting or connected, or when no credential is
    /// set. Must be called inside a Tokio runtime.
    pub fn connect(&self) -> bool {
        let Some(credential) = self.credential() else {
            warn!("realtime connect requested without a credential");
            return false;
        };

        let mut session = lock(&self.inner.session);
        if session.is_some() {
            debug!(state = %self.state(), "realtime channel already active");
            return false;
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        *session = Some(Session {
            generation,
            cancel: cancel.clone(),
            outbound: None,
        });
        self.inner.state.send_replace(ConnectionState::Connecting);
        drop(session);

        info!(url = %self.inner.options.url, "opening realtime channel");
        tokio::spawn(run_session(
            Arc::clone(&self.inner),
            generation,
            credential,
            cancel,
        ));
        true
    }

    /// Closes the channel and stops any reconnection. Safe when not connected.
    pub fn disconnect(&self) {
        let mut session = lock(&self.inner.session);
        if let Some(live) = session.take() {
            live.cancel.cancel();
            info!("realtime channel closed");
        }
        self.inner.state.send_replace(ConnectionState::Disconnected);
    }

    /// Follows the authentication state.
    ///
    /// A credential opens the channel, or reopens it when the token changed.
    /// `None` closes it.
    pub fn on_credential_changed(&self, credential: Option<String>) {
        let changed = {
            let mut current = lock(&self.inner.credential);
            let changed = *current != credential;
            current.clone_from(&credential);
            changed
        };

        if credential.is_none() {
            self.disconnect();
            return;
        }
        if changed && lock(&self.inner.session).is_some() {
            debug!("credential changed, reopening realtime channel");
            self.disconnect();
        }
        self.connect();
    }

    /// Registers `listener` for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.add(kind, Arc::new(listener));
        Subscription::new(id, kind, &self.inner.listeners)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.count(kind)
    }

    /// Sends a frame upstream.
    ///
    /// Only delivered while connected. Otherwise the frame is dropped with a
    /// warning and `false` is returned; nothing is queued for later.
    pub fn emit(&self, event: &str, payload: serde_json::Value) -> bool {
        let outbound = lock(&self.inner.session)
            .as_ref()
            .and_then(|s| s.outbound.clone());
        let Some(outbound) = outbound else {
            warn!(event, "dropping emit while realtime channel is not connected");
            return false;
        };

        let text = match Frame::new(event, payload).to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(event, error = %e, "dropping emit that failed to encode");
                return false;
            }
        };
        match outbound.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                warn!(event, error = %e, "dropping emit, outbound queue unavailable");
                false
            }
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(live) = lock(&self.inner.session).take() {
            live.cancel.cancel();
        }
    }
}

enum PumpEnd {
    Cancelled,
    Dropped(String),
}

async fn run_session(
    inner: Arc<Inner>,
    generation: u64,
    credential: String,
    cancel: CancellationToken,
) {
    let url = inner.options.url.clone();
    let mut failures: u32 = 0;

    loop {
        if !inner.publish(generation, ConnectionState::Connecting) {
            return;
        }

        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            result = inner.connector.open(&url, &credential) => result,
        };

        match opened {
            Ok(mut connection) => {
                let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
                if !inner.mark_connected(generation, tx) {
                    connection.close().await;
                    return;
                }
                failures = 0;
                info!(%url, "realtime channel connected");

                let ended = pump(&inner, connection.as_mut(), rx, &cancel).await;
                inner.clear_outbound(generation);
                match ended {
                    PumpEnd::Cancelled => {
                        connection.close().await;
                        return;
                    }
                    PumpEnd::Dropped(reason) => {
                        warn!(%reason, "realtime connection dropped");
                        inner.record_error(reason);
                    }
                }
            }
            Err(CivicaError::Rejected { status, message }) => {
                error!(status, %message, "realtime handshake rejected, not retrying");
                inner.record_error(format!("handshake rejected ({status}): {message}"));
                inner.give_up(generation);
                return;
            }
            Err(e) => {
                warn!(error = %e, attempt = failures + 1, "realtime connection failed");
                inner.record_error(e.to_string());
            }
        }

        failures += 1;
        if failures > inner.options.reconnect_attempts {
            error!(
                attempts = inner.options.reconnect_attempts,
                "realtime reconnection attempts exhausted"
            );
            inner.give_up(generation);
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(inner.options.reconnect_delay) => {}
        }
        debug!(attempt = failures, "reconnecting realtime channel");
    }
}

async fn pump(
    inner: &Inner,
    connection: &mut dyn EventConnection,
    mut outbound: mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> PumpEnd {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return PumpEnd::Cancelled,
            queued = outbound.recv() => match queued {
                Some(text) => {
                    if let Err(e) = connection.send_frame(text).await {
                        return PumpEnd::Dropped(e.to_string());
                    }
                }
                None => return PumpEnd::Cancelled,
            },
            frame = connection.next_frame() => match frame {
                Some(Ok(text)) => inner.handle_frame(&text),
                Some(Err(e)) => return PumpEnd::Dropped(e.to_string()),
                None => return PumpEnd::Dropped("connection closed by peer".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use civica_test_utils::MockConnector;
    use tracing_test::traced_test;

    use super::*;

    fn channel() -> RealtimeChannel {
        RealtimeChannel::new(
            ChannelOptions {
                url: "ws://mock/ws".into(),
                reconnect_attempts: 1,
                reconnect_delay: Duration::from_millis(10),
            },
            Arc::new(MockConnector::new()),
        )
    }

    #[tokio::test]
    #[traced_test]
    async fn emit_while_disconnected_is_dropped_with_a_warning() {
        let channel = channel();
        assert!(!channel.emit("mark_read", serde_json::json!({"messageId": "m-1"})));
        assert!(logs_contain("dropping emit while realtime channel is not connected"));
    }

    #[tokio::test]
    async fn connect_without_credential_stays_disconnected() {
        let channel = channel();
        assert!(!channel.connect());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_when_idle_is_a_no_op() {
        let channel = channel();
        channel.disconnect();
        channel.disconnect();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.last_error().is_none());
    }

    #[test]
    fn options_follow_realtime_config() {
        let config = RealtimeConfig {
            url: "wss://municipio.example/ws".into(),
            reconnect_attempts: 3,
            reconnect_delay_ms: 250,
        };
        let options = ChannelOptions::from(&config);
        assert_eq!(options.url, "wss://municipio.example/ws");
        assert_eq!(options.reconnect_attempts, 3);
        assert_eq!(options.reconnect_delay, Duration::from_millis(250));
    }
}
