mod common;

use async_trait::async_trait;
use common::{forwarder, wait_until, RecordingSink};
use console_relay::relay::{
    ChannelLayout, ChannelProvisioner, ChannelResolver, CommunityId, DestinationId,
    FailoverCoordinator, ProvisionError, PullTailer, StatusBoard, TailingMode,
};
use console_relay::store::MemoryLogStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn coordinator(
    store: Arc<MemoryLogStore>,
    sink: Arc<RecordingSink>,
    status: StatusBoard,
) -> FailoverCoordinator {
    let pull = PullTailer::new(store.clone()).with_interval(Duration::from_secs(1));
    FailoverCoordinator::new(store, pull, forwarder(sink, status))
}

#[tokio::test(start_paused = true)]
async fn should_process_each_entry_once_across_mid_stream_failover() {
    // Arrange
    let store = Arc::new(MemoryLogStore::new());
    let sink = Arc::new(RecordingSink::default());
    let status = StatusBoard::new();
    let cancel = CancellationToken::new();
    let relay = tokio::spawn(coordinator(store.clone(), sink.clone(), status.clone()).run(cancel.clone()));
    assert!(wait_until(Duration::from_secs(5), || store.subscriber_count() == 1).await);

    // Act
    store.insert("ERROR", "e1");
    store.insert("WARN", "w2");
    assert!(wait_until(Duration::from_secs(5), || sink.calls().len() == 2).await);
    let cursor_at_failure = status.snapshot().cursor;

    store.insert("ERROR", "e3");
    store.fail_feeds("change stream closed");
    store.insert("WARN", "w4");
    let last = store.insert("ERROR", "e5");

    let mut progress = status.subscribe();
    progress
        .wait_for(|s| s.mode == TailingMode::Pull)
        .await
        .expect("relay falls back to pull");
    assert!(wait_until(Duration::from_secs(5), || sink.calls().len() >= 5).await);
    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();
    let cursor = relay.await.expect("relay task finished");

    // Assert
    assert!(cursor_at_failure.is_some());
    assert_eq!(sink.messages(), vec!["e1", "w2", "e3", "w4", "e5"]);
    assert_eq!(
        sink.destinations(),
        vec!["errors", "warnings", "errors", "warnings", "errors"]
    );
    assert_eq!(cursor.position(), Some(last.position()));
    assert_eq!(status.snapshot().stats.duplicates, 0);
}

#[tokio::test(start_paused = true)]
async fn should_go_straight_to_pull_when_feed_is_unsupported() {
    // Arrange
    let store = Arc::new(MemoryLogStore::without_feed());
    let sink = Arc::new(RecordingSink::default());
    let status = StatusBoard::new();
    let mut progress = status.subscribe();
    let cancel = CancellationToken::new();

    // Act
    let relay = tokio::spawn(coordinator(store.clone(), sink, status.clone()).run(cancel.clone()));
    progress
        .wait_for(|s| s.mode == TailingMode::Pull)
        .await
        .expect("relay falls back to pull");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();
    relay.await.expect("relay task finished");

    // Assert
    let snapshot = status.snapshot();
    assert!(snapshot
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("not supported")));
    assert!(store.query_count() >= 2);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn should_keep_polling_after_query_failures_without_losing_entries() {
    // Arrange
    let store = Arc::new(MemoryLogStore::without_feed());
    let sink = Arc::new(RecordingSink::default());
    let status = StatusBoard::new();
    let mut progress = status.subscribe();
    let cancel = CancellationToken::new();
    let relay = tokio::spawn(coordinator(store.clone(), sink.clone(), status.clone()).run(cancel.clone()));
    progress
        .wait_for(|s| s.mode == TailingMode::Pull)
        .await
        .expect("relay falls back to pull");

    // Act
    store.fail_next_queries(2);
    store.insert("ERROR", "during outage");
    tokio::time::sleep(Duration::from_millis(3500)).await;
    cancel.cancel();
    relay.await.expect("relay task finished");

    // Assert
    assert_eq!(sink.messages(), vec!["during outage"]);
    assert_eq!(status.snapshot().stats.query_failures, 2);
}

#[tokio::test(start_paused = true)]
async fn should_advance_cursor_past_failed_sends() {
    let store = Arc::new(MemoryLogStore::without_feed());
    let sink = Arc::new(RecordingSink::default());
    sink.fail_destination("errors");
    let status = StatusBoard::new();
    let mut progress = status.subscribe();
    let cancel = CancellationToken::new();
    let relay = tokio::spawn(coordinator(store.clone(), sink.clone(), status.clone()).run(cancel.clone()));
    progress
        .wait_for(|s| s.mode == TailingMode::Pull)
        .await
        .expect("relay falls back to pull");

    store.insert("ERROR", "lost");
    let last = store.insert("WARN", "kept");
    tokio::time::sleep(Duration::from_millis(3500)).await;
    cancel.cancel();
    let cursor = relay.await.expect("relay task finished");

    assert_eq!(sink.messages(), vec!["lost", "kept"]);
    assert_eq!(cursor.position(), Some(last.position()));
    assert_eq!(status.snapshot().stats.send_failures, 1);
}

/// Provisioner whose API is never reachable
#[derive(Default)]
struct UnreachableProvisioner {
    attempts: AtomicUsize,
}

#[async_trait]
impl ChannelProvisioner for UnreachableProvisioner {
    async fn ensure_destination(
        &self,
        _community: &CommunityId,
        _group: &str,
        _name: &str,
        _topic: &str,
    ) -> Result<DestinationId, ProvisionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProvisionError::Transport("connection refused".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn should_start_tailing_while_channel_provisioning_keeps_failing() {
    // Arrange
    let store = Arc::new(MemoryLogStore::new());
    let sink = Arc::new(RecordingSink::default());
    let status = StatusBoard::new();
    let provisioner = Arc::new(UnreachableProvisioner::default());
    let resolver = Arc::new(ChannelResolver::new(
        provisioner.clone(),
        ChannelLayout::default(),
    ));
    let forwarder = forwarder(sink.clone(), status.clone())
        .with_resolver(resolver, CommunityId::new("guild-1"));
    let pull = PullTailer::new(store.clone());
    let cancel = CancellationToken::new();

    // Act
    let relay = tokio::spawn(FailoverCoordinator::new(store.clone(), pull, forwarder).run(cancel.clone()));
    assert!(wait_until(Duration::from_secs(1), || store.subscriber_count() == 1).await);
    assert!(
        wait_until(Duration::from_secs(1), || provisioner.attempts.load(Ordering::SeqCst) > 0)
            .await
    );
    let mode = status.snapshot().mode;

    store.insert("ERROR", "boom");
    assert!(wait_until(Duration::from_secs(1), || sink.calls().len() == 1).await);

    cancel.cancel();
    let stopped = tokio::time::timeout(Duration::from_secs(1), relay).await;

    // Assert
    assert_eq!(mode, TailingMode::Push);
    assert_eq!(sink.destinations(), vec!["errors"]);
    assert!(stopped.is_ok(), "relay ignored cancellation during channel resolution");
}
