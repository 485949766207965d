// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport seam for the realtime event channel.

use async_trait::async_trait;

use crate::error::CivicaError;

/// Opens authenticated push-event connections.
#[async_trait]
pub trait EventConnector: Send + Sync + 'static {
    /// Opens a connection to `url`, presenting `credential` as a bearer token.
    async fn open(
        &self,
        url: &str,
        credential: &str,
    ) -> Result<Box<dyn EventConnection>, CivicaError>;
}

/// One open push-event connection carrying JSON text frames.
#[async_trait]
pub trait EventConnection: Send {
    /// Next text frame. `None` means the peer closed the connection.
    async fn next_frame(&mut self) -> Option<Result<String, CivicaError>>;

    /// Sends a text frame upstream.
    async fn send_frame(&mut self, text: String) -> Result<(), CivicaError>;

    /// Closes the connection. Errors while closing are ignored.
    async fn close(&mut self);
}
