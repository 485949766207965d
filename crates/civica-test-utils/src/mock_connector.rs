// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock push-event transport for deterministic testing.
//!
//! Every successful `open()` produces a [`MockConnection`] for the channel
//! and a matching [`MockPeer`] for the test. The peer injects frames,
//! captures emitted frames, and can drop the connection to simulate a
//! network failure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use civica_core::{ChannelEvent, CivicaError, EventConnection, EventConnector};

/// Scripted outcome for the next `open()` call.
enum OpenOutcome {
    Refuse,
    Reject(u16),
}

/// Test-side end of one mock connection.
pub struct MockPeer {
    pub url: String,
    pub credential: String,
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MockPeer {
    /// Inject a raw text frame. Returns `false` once the client hung up.
    pub fn push_frame(&self, text: impl Into<String>) -> bool {
        self.to_client.send(text.into()).is_ok()
    }

    /// Inject an event encoded the way the backend sends it.
    pub fn push_event(&self, event: &ChannelEvent) -> bool {
        match event.to_frame().and_then(|frame| frame.to_text()) {
            Ok(text) => self.push_frame(text),
            Err(_) => false,
        }
    }

    /// Next frame the client emitted, if one arrives within `wait`.
    pub async fn next_emitted(&mut self, wait: Duration) -> Option<String> {
        tokio::time::timeout(wait, self.from_client.recv())
            .await
            .ok()
            .flatten()
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(self) {}
}

/// Channel-side end of one mock connection.
pub struct MockConnection {
    from_server: mpsc::UnboundedReceiver<String>,
    to_server: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl EventConnection for MockConnection {
    async fn next_frame(&mut self) -> Option<Result<String, CivicaError>> {
        self.from_server.recv().await.map(Ok)
    }

    async fn send_frame(&mut self, text: String) -> Result<(), CivicaError> {
        self.to_server.send(text).map_err(|_| CivicaError::Channel {
            message: "mock peer hung up".into(),
            source: None,
        })
    }

    async fn close(&mut self) {
        self.from_server.close();
    }
}

/// A mock connector that hands out [`MockPeer`]s for each accepted open.
pub struct MockConnector {
    script: Mutex<VecDeque<OpenOutcome>>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: Mutex<mpsc::UnboundedReceiver<MockPeer>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(VecDeque::new()),
            peers_tx,
            peers_rx: Mutex::new(peers_rx),
            attempts: AtomicUsize::new(0),
        }
    }

    /// The next `count` opens fail as if the server were unreachable.
    pub async fn refuse_next(&self, count: usize) {
        let mut script = self.script.lock().await;
        script.extend(std::iter::repeat_with(|| OpenOutcome::Refuse).take(count));
    }

    /// The next open fails the handshake with `status`.
    pub async fn reject_next(&self, status: u16) {
        self.script.lock().await.push_back(OpenOutcome::Reject(status));
    }

    /// Total `open()` calls so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait up to `wait` for the next accepted connection.
    pub async fn next_peer(&self, wait: Duration) -> Option<MockPeer> {
        let mut peers = self.peers_rx.lock().await;
        tokio::time::timeout(wait, peers.recv()).await.ok().flatten()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventConnector for MockConnector {
    async fn open(
        &self,
        url: &str,
        credential: &str,
    ) -> Result<Box<dyn EventConnection>, CivicaError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().await.pop_front() {
            Some(OpenOutcome::Refuse) => {
                return Err(CivicaError::Channel {
                    message: "connection refused".into(),
                    source: None,
                });
            }
            Some(OpenOutcome::Reject(status)) => {
                return Err(CivicaError::Rejected {
                    status,
                    message: "credential refused".into(),
                });
            }
            None => {}
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        let peer = MockPeer {
            url: url.to_string(),
            credential: credential.to_string(),
            to_client,
            from_client,
        };
        self.peers_tx.send(peer).map_err(|_| CivicaError::Internal(
            "mock connector peer queue closed".into(),
        ))?;
        Ok(Box::new(MockConnection {
            from_server,
            to_server,
        }))
    }
}
