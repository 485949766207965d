// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the message store against the mock backend and
//! the mock push transport.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use civica_core::event::{BulkStatusUpdate, ReplyReceived, StatusUpdate};
use civica_core::{
    ChannelEvent, CivicaError, ConnectionState, MessageId, MessagePatch, MessageQuery,
    MessageStatus,
};
use civica_realtime::{ChannelOptions, RealtimeChannel};
use civica_store::{FetchOutcome, MessageStore, OperationState};
use civica_test_utils::fixtures::{message, recipient};
use civica_test_utils::{MockBackend, MockConnector};

const WAIT: Duration = Duration::from_secs(2);

fn id(value: &str) -> MessageId {
    MessageId::from(value)
}

fn store_with(backend: &Arc<MockBackend>) -> Arc<MessageStore> {
    Arc::new(MessageStore::new(backend.clone(), 10))
}

async fn loaded(statuses: &[(&str, MessageStatus)]) -> (Arc<MockBackend>, Arc<MessageStore>) {
    let backend = Arc::new(MockBackend::with_messages(
        statuses.iter().map(|(i, s)| message(i, *s)).collect(),
    ));
    let store = store_with(&backend);
    store.fetch(MessageQuery::default()).await.unwrap();
    (backend, store)
}

#[tokio::test]
async fn fetch_replaces_page_and_total() {
    let (_, store) = loaded(&[("a", MessageStatus::Sent), ("b", MessageStatus::Failed)]).await;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.total_count, 2);
    assert_eq!(snapshot.fetch, OperationState::Idle);
}

#[tokio::test]
async fn failed_fetch_keeps_the_current_page() {
    let (backend, store) = loaded(&[("a", MessageStatus::Sent)]).await;
    backend
        .fail_next_list(CivicaError::Backend {
            message: "503 Service Unavailable".into(),
            source: None,
        })
        .await;

    let err = store
        .fetch(MessageQuery::default().with_page(2))
        .await
        .unwrap_err();
    assert!(err.is_transient());

    let snapshot = store.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.query.page, 1);
    assert!(snapshot.fetch.error().unwrap().contains("503"));

    store.dismiss_fetch_error();
    assert_eq!(store.fetch_state(), OperationState::Idle);
}

#[tokio::test]
async fn delivered_patch_updates_only_status_and_delivered_at() {
    let (_, store) = loaded(&[("a", MessageStatus::Sent)]).await;
    let before = store.message(&id("a")).unwrap();
    let at = Utc::now();

    assert!(store.apply_patch(&id("a"), &MessagePatch::status(MessageStatus::Delivered, at)));

    let after = store.message(&id("a")).unwrap();
    assert_eq!(after.status, MessageStatus::Delivered);
    assert_eq!(after.delivered_at, Some(at));
    assert_eq!(after.name, before.name);
    assert_eq!(after.phone, before.phone);
    assert_eq!(after.sent_at, before.sent_at);
    assert_eq!(after.read_at, None);
    assert_eq!(after.status_message, None);
}

#[tokio::test]
async fn patch_for_unknown_id_is_a_no_op() {
    let (_, store) = loaded(&[("a", MessageStatus::Sent)]).await;
    let before = store.snapshot();

    assert!(!store.apply_patch(
        &id("ghost"),
        &MessagePatch::status(MessageStatus::Delivered, Utc::now())
    ));

    let after = store.snapshot();
    assert_eq!(after.messages, before.messages);
    assert_eq!(after.revision, before.revision);
}

#[tokio::test]
async fn late_patch_does_not_move_a_message_backwards() {
    let (_, store) = loaded(&[("a", MessageStatus::Read)]).await;
    assert!(!store.apply_patch(&id("a"), &MessagePatch::status(MessageStatus::Delivered, Utc::now())));
    assert_eq!(store.message(&id("a")).unwrap().status, MessageStatus::Read);
}

#[tokio::test]
async fn reply_sets_content_once() {
    let (_, store) = loaded(&[("a", MessageStatus::Delivered)]).await;
    let first_at = Utc::now();
    let reply = |content: &str, at| {
        ChannelEvent::Reply(ReplyReceived {
            message_id: id("a"),
            status: MessageStatus::Replied,
            timestamp: at,
            reply_content: content.into(),
        })
    };

    assert_eq!(store.apply_event(&reply("¡Muchas gracias!", first_at)), 1);
    assert_eq!(
        store.apply_event(&reply("duplicado", first_at + ChronoDuration::seconds(5))),
        0
    );

    let message = store.message(&id("a")).unwrap();
    assert_eq!(message.status, MessageStatus::Replied);
    assert_eq!(message.replied_at, Some(first_at));
    assert_eq!(message.reply_content.as_deref(), Some("¡Muchas gracias!"));
}

#[tokio::test]
async fn bulk_update_patches_loaded_rows_and_skips_the_rest() {
    let (_, store) = loaded(&[
        ("a", MessageStatus::Sending),
        ("b", MessageStatus::Sending),
        ("c", MessageStatus::Sending),
    ])
    .await;

    let changed = store.apply_event(&ChannelEvent::BulkStatusUpdate(BulkStatusUpdate {
        message_ids: vec![id("a"), id("c"), id("not-loaded")],
        status: MessageStatus::Sent,
        timestamp: Utc::now(),
    }));

    assert_eq!(changed, 2);
    assert_eq!(store.message(&id("b")).unwrap().status, MessageStatus::Sending);
    assert_eq!(store.snapshot().status_counts().get(&MessageStatus::Sent), Some(&2));
}

#[tokio::test]
async fn retry_of_a_non_failed_message_is_rejected_without_side_effects() {
    let (backend, store) = loaded(&[("a", MessageStatus::Delivered)]).await;
    let before = store.snapshot();
    let calls_before = backend.list_calls().await.len();

    let err = store.retry(&id("a")).await.unwrap_err();
    assert!(matches!(err, CivicaError::Rejected { .. }));
    assert!(!err.is_transient());

    assert_eq!(store.snapshot().messages, before.messages);
    assert!(store.retry_state(&id("a")).error().is_some());
    assert_eq!(backend.list_calls().await.len(), calls_before);
}

#[tokio::test]
async fn retry_of_a_failed_message_reloads_the_page() {
    let (backend, store) = loaded(&[("a", MessageStatus::Failed), ("b", MessageStatus::Sent)]).await;
    assert!(store.can_retry(&id("a")));

    store.retry(&id("a")).await.unwrap();

    assert_eq!(backend.retried_ids().await, vec![id("a")]);
    assert_eq!(store.message(&id("a")).unwrap().status, MessageStatus::Pending);
    assert_eq!(store.retry_state(&id("a")), OperationState::Idle);
    assert!(!store.can_retry(&id("a")));
}

#[tokio::test]
async fn transient_retry_failure_keeps_rows_and_marks_only_that_row() {
    let (backend, store) = loaded(&[("a", MessageStatus::Failed), ("b", MessageStatus::Failed)]).await;
    let before = store.snapshot();
    let calls_before = backend.list_calls().await.len();
    backend
        .fail_next_retry(CivicaError::Backend {
            message: "502 Bad Gateway".into(),
            source: None,
        })
        .await;

    let err = store.retry(&id("a")).await.unwrap_err();
    assert!(err.is_transient());

    assert_eq!(store.snapshot().messages, before.messages);
    assert!(store.retry_state(&id("a")).error().unwrap().contains("502"));
    assert_eq!(store.retry_state(&id("b")), OperationState::Idle);
    assert!(store.can_retry(&id("a")));
    assert!(store.can_retry(&id("b")));
    assert_eq!(backend.list_calls().await.len(), calls_before);
}

fn two_per_page() -> MessageQuery {
    MessageQuery {
        page_size: 2,
        ..MessageQuery::default()
    }
}

#[tokio::test]
async fn reload_after_retry_stays_on_the_page_shown() {
    let backend = Arc::new(MockBackend::with_messages(vec![
        message("a", MessageStatus::Failed),
        message("b", MessageStatus::Sent),
        message("c", MessageStatus::Sent),
    ]));
    let store = store_with(&backend);
    store.fetch(two_per_page()).await.unwrap();
    backend
        .fail_next_list(CivicaError::Backend {
            message: "503 Service Unavailable".into(),
            source: None,
        })
        .await;
    store.fetch(two_per_page().with_page(2)).await.unwrap_err();

    store.retry(&id("a")).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.query.page, 1);
    let ids: Vec<&str> = snapshot.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(store.message(&id("a")).unwrap().status, MessageStatus::Pending);
    assert_eq!(backend.list_calls().await.last().unwrap().page, 1);
}

#[tokio::test]
async fn retry_errors_for_rows_no_longer_loaded_are_dropped() {
    let backend = Arc::new(MockBackend::with_messages(vec![
        message("a", MessageStatus::Failed),
        message("b", MessageStatus::Failed),
        message("c", MessageStatus::Sent),
    ]));
    let store = store_with(&backend);
    store.fetch(two_per_page()).await.unwrap();
    for _ in 0..2 {
        backend
            .fail_next_retry(CivicaError::Backend {
                message: "502 Bad Gateway".into(),
                source: None,
            })
            .await;
    }
    store.retry(&id("a")).await.unwrap_err();
    store.retry(&id("b")).await.unwrap_err();

    store.refresh().await.unwrap();
    assert!(store.retry_state(&id("a")).error().is_some());

    store.fetch(two_per_page().with_page(2)).await.unwrap();
    assert_eq!(store.retry_state(&id("a")), OperationState::Idle);
    assert_eq!(store.retry_state(&id("b")), OperationState::Idle);
}

#[tokio::test]
async fn failed_send_leaves_messages_untouched() {
    let (backend, store) = loaded(&[("a", MessageStatus::Sent)]).await;
    backend
        .fail_next_send(CivicaError::Rejected {
            status: 400,
            message: "telefono must be a string".into(),
        })
        .await;

    let err = store.send(&[recipient("p1", "")]).await.unwrap_err();
    assert!(matches!(err, CivicaError::Rejected { status: 400, .. }));
    assert_eq!(store.snapshot().messages.len(), 1);
    assert!(store.send_state().error().unwrap().contains("telefono"));
}

#[tokio::test]
async fn newest_fetch_wins_when_responses_arrive_out_of_order() {
    let backend = Arc::new(MockBackend::with_messages(
        (0..4).map(|i| message(&format!("m-{i}"), MessageStatus::Sent)).collect(),
    ));
    let store = store_with(&backend);
    backend.hold_lists(true);

    let page = |n| MessageQuery {
        page: n,
        page_size: 2,
        ..MessageQuery::default()
    };
    let a = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(page(1)).await }
    });
    backend.wait_for_held(1).await;
    let b = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(page(2)).await }
    });
    backend.wait_for_held(2).await;

    backend.release_list(2).await;
    assert!(matches!(b.await.unwrap().unwrap(), FetchOutcome::Applied(_)));
    backend.release_list(1).await;
    assert_eq!(a.await.unwrap().unwrap(), FetchOutcome::Superseded);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.query.page, 2);
    let ids: Vec<_> = snapshot.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m-2", "m-3"]);
}

#[tokio::test]
async fn newest_fetch_wins_when_responses_arrive_in_order() {
    let backend = Arc::new(MockBackend::with_messages(
        (0..4).map(|i| message(&format!("m-{i}"), MessageStatus::Sent)).collect(),
    ));
    let store = store_with(&backend);
    backend.hold_lists(true);

    let page = |n| MessageQuery {
        page: n,
        page_size: 2,
        ..MessageQuery::default()
    };
    let a = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(page(1)).await }
    });
    backend.wait_for_held(1).await;
    let b = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(page(2)).await }
    });
    backend.wait_for_held(2).await;

    backend.release_list(1).await;
    assert_eq!(a.await.unwrap().unwrap(), FetchOutcome::Superseded);
    assert!(store.fetch_state().is_loading());
    backend.release_list(2).await;
    b.await.unwrap().unwrap();

    assert_eq!(store.snapshot().query.page, 2);
    assert_eq!(store.fetch_state(), OperationState::Idle);
}

#[tokio::test]
async fn patch_before_fetch_is_dropped_and_fetch_brings_the_server_state() {
    let backend = Arc::new(MockBackend::with_messages(vec![message("a", MessageStatus::Sending)]));
    let store = store_with(&backend);

    assert!(!store.apply_patch(&id("a"), &MessagePatch::status(MessageStatus::Sent, Utc::now())));
    backend.set_status("a", MessageStatus::Sent).await;
    store.fetch(MessageQuery::default()).await.unwrap();

    assert_eq!(store.message(&id("a")).unwrap().status, MessageStatus::Sent);
}

#[tokio::test]
async fn every_change_bumps_the_revision() {
    let (_, store) = loaded(&[("a", MessageStatus::Sent)]).await;
    let mut changes = store.changes();
    let _ = changes.borrow_and_update();

    store.apply_patch(&id("a"), &MessagePatch::status(MessageStatus::Delivered, Utc::now()));
    tokio::time::timeout(WAIT, changes.changed())
        .await
        .expect("no change notification")
        .unwrap();
    assert_eq!(*changes.borrow_and_update(), store.snapshot().revision);
}

async fn live_store(
    backend: &Arc<MockBackend>,
) -> (Arc<MessageStore>, RealtimeChannel, civica_test_utils::MockPeer) {
    let store = store_with(backend);
    let connector = Arc::new(MockConnector::new());
    let channel = RealtimeChannel::new(
        ChannelOptions {
            url: "ws://mock/ws".into(),
            reconnect_attempts: 1,
            reconnect_delay: Duration::from_millis(10),
        },
        connector.clone(),
    );
    let _subscriptions = store.attach(&channel);
    channel.on_credential_changed(Some("token".into()));
    let peer = connector.next_peer(WAIT).await.expect("channel did not connect");
    let mut state = channel.watch_state();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();
    (store, channel, peer)
}

async fn wait_until(store: &MessageStore, check: impl Fn(&MessageStore) -> bool) {
    let mut changes = store.changes();
    tokio::time::timeout(WAIT, async {
        while !check(store) {
            changes.changed().await.unwrap();
        }
    })
    .await
    .expect("store never reached the expected state");
}

#[tokio::test]
async fn send_three_then_one_status_event_changes_only_that_row() {
    let backend = Arc::new(MockBackend::new());
    let (store, _channel, peer) = live_store(&backend).await;

    let receipt = store
        .send(&[
            recipient("p1", "+5491111111111"),
            recipient("p2", "+5491122222222"),
            recipient("p3", "+5491133333333"),
        ])
        .await
        .unwrap();
    assert_eq!(receipt.count, 3);
    let batches = backend.sent_batches().await;
    assert_eq!(batches.len(), 1);
    let people: Vec<&str> = batches[0].iter().map(|r| r.person_id.as_str()).collect();
    assert_eq!(people, vec!["p1", "p2", "p3"]);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.messages.len(), 3);
    assert!(snapshot.messages.iter().all(|m| m.status == MessageStatus::Pending));

    let second = receipt.message_ids[1].clone();
    peer.push_event(&ChannelEvent::StatusUpdate(StatusUpdate {
        message_id: second.clone(),
        status: MessageStatus::Sent,
        timestamp: Utc::now(),
        error: None,
    }));
    wait_until(&store, |s| {
        s.message(&second).is_some_and(|m| m.status == MessageStatus::Sent)
    })
    .await;

    let after = store.snapshot();
    for (before, now) in snapshot.messages.iter().zip(&after.messages) {
        if now.id == second {
            assert!(now.sent_at.is_some());
        } else {
            assert_eq!(before, now);
        }
    }
}

#[tokio::test]
async fn failure_event_sets_reason_and_offers_retry_for_that_row_only() {
    let backend = Arc::new(MockBackend::with_messages(vec![
        message("a", MessageStatus::Sending),
        message("b", MessageStatus::Sending),
    ]));
    let (store, _channel, peer) = live_store(&backend).await;
    store.fetch(MessageQuery::default()).await.unwrap();

    peer.push_event(&ChannelEvent::StatusUpdate(StatusUpdate {
        message_id: id("a"),
        status: MessageStatus::Failed,
        timestamp: Utc::now(),
        error: Some("invalid number".into()),
    }));
    wait_until(&store, |s| {
        s.message(&id("a")).is_some_and(|m| m.status == MessageStatus::Failed)
    })
    .await;

    let failed = store.message(&id("a")).unwrap();
    assert_eq!(failed.status_message.as_deref(), Some("invalid number"));
    assert!(store.can_retry(&id("a")));
    assert!(!store.can_retry(&id("b")));
}

#[tokio::test]
async fn dropped_store_leaves_harmless_listeners() {
    let backend = Arc::new(MockBackend::new());
    let (store, channel, peer) = live_store(&backend).await;
    drop(store);

    assert!(peer.push_event(&ChannelEvent::StatusUpdate(StatusUpdate {
        message_id: id("a"),
        status: MessageStatus::Sent,
        timestamp: Utc::now(),
        error: None,
    })));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(channel.state(), ConnectionState::Connected);
}
