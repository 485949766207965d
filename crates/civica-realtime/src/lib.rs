// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime event channel for Civica.
//!
//! Keeps one authenticated WebSocket open while a credential is present,
//! reconnects a bounded number of times after unexpected drops, and fans
//! decoded status events out to subscribers.

pub mod channel;
pub mod listeners;
pub mod ws;

use std::sync::Arc;

use civica_config::CivicaConfig;

pub use channel::{ChannelOptions, RealtimeChannel};
pub use listeners::{Listener, ListenerRegistry, Subscription};
pub use ws::WsConnector;

/// Builds a channel on the WebSocket transport from `[realtime]`.
///
/// The channel starts disconnected; hand it a credential with
/// [`RealtimeChannel::on_credential_changed`] to open it.
pub fn from_config(config: &CivicaConfig) -> RealtimeChannel {
    RealtimeChannel::new(ChannelOptions::from(&config.realtime), Arc::new(WsConnector))
}
