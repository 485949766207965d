// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `civica watch` command implementation.
//!
//! Loads a page, attaches the store to the realtime channel, and prints
//! every status event and connection change until Ctrl+C or until the
//! channel gives up reconnecting.

use std::sync::Arc;

use clap::Args;
use civica_config::CivicaConfig;
use civica_core::{ChannelEvent, CivicaError, ConnectionState, EventKind, MessageId, StatusTab};
use civica_realtime::RealtimeChannel;
use civica_store::MessageStore;
use tokio::sync::mpsc;
use tracing::debug;

use crate::list::{paint, summary_line};
use crate::shutdown;

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Status tab of the page to load before streaming.
    #[arg(long, default_value = "all")]
    pub tab: StatusTab,
}

pub async fn run_watch(
    config: &CivicaConfig,
    store: Arc<MessageStore>,
    args: &WatchArgs,
    use_color: bool,
) -> Result<(), CivicaError> {
    let token = config.auth.token.clone().ok_or_else(|| {
        CivicaError::Config("watch needs a credential: set auth.token or CIVICA_AUTH_TOKEN".into())
    })?;

    let query = civica_core::MessageQuery {
        page_size: config.store.page_size,
        ..Default::default()
    }
    .with_status(args.tab.query_status());
    store.fetch(query).await?;
    println!("  watching {} loaded messages", store.snapshot().messages.len());

    let channel = civica_realtime::from_config(config);
    let _store_subscriptions = store.attach(&channel);
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let _printers = forward_events(&channel, events_tx);

    let mut state = channel.watch_state();
    channel.on_credential_changed(Some(token));
    let shutdown = shutdown::install_signal_handler();

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            Some(event) = events.recv() => print_event(&store, &event, use_color),
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = *state.borrow_and_update();
                println!("  channel {current}");
                if current == ConnectionState::Disconnected {
                    let reason = channel
                        .last_error()
                        .unwrap_or_else(|| "connection closed".to_string());
                    break Err(CivicaError::Channel {
                        message: format!("realtime channel gave up: {reason}"),
                        source: None,
                    });
                }
            }
        }
    };

    channel.disconnect();
    println!("  {}", summary_line(&store.snapshot()));
    result
}

fn forward_events(
    channel: &RealtimeChannel,
    tx: mpsc::UnboundedSender<ChannelEvent>,
) -> Vec<civica_realtime::Subscription> {
    [
        EventKind::MessageStatusUpdate,
        EventKind::MessageReply,
        EventKind::BulkStatusUpdate,
    ]
    .into_iter()
    .map(|kind| {
        let tx = tx.clone();
        channel.subscribe(kind, move |event| {
            if tx.send(event.clone()).is_err() {
                debug!("event printer gone");
            }
        })
    })
    .collect()
}

fn print_event(store: &MessageStore, event: &ChannelEvent, use_color: bool) {
    for (id, patch) in event.patches() {
        let loaded = store.message(&id).is_some();
        println!("  {}", describe(&id, patch.status, patch.error.as_deref(), loaded, use_color));
    }
}

fn describe(
    id: &MessageId,
    status: civica_core::MessageStatus,
    error: Option<&str>,
    loaded: bool,
    use_color: bool,
) -> String {
    let mut line = format!("{id} -> {}", paint(status, use_color).trim_end());
    if let Some(reason) = error {
        line.push_str(&format!(" ({reason})"));
    }
    if !loaded {
        line.push_str(" [not on this page]");
    }
    line
}
