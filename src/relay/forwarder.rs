//! Per-entry processing shared by both tailing modes
//!
//! classify -> send (when routed) -> advance cursor. A failed send is logged
//! and counted; it never holds the cursor back.
//!
//! Channel resolution runs on a background task; its result is picked up
//! before the next entry is processed, so tailing never waits on it.

use super::channels::{ChannelResolver, ChannelSet, CommunityId, ProvisionError};
use super::classifier::{classify, ForwardingPolicy};
use super::cursor::Cursor;
use super::entry::LogEntry;
use super::sink::{DestinationId, NotificationSink, SinkError};
use super::status::StatusBoard;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    /// Level not in the forwarding policy
    Suppressed,
    /// Forwardable but its destination is unset
    Unrouted,
    SendFailed,
    /// Already behind the cursor; skipped without a send
    Duplicate,
}

type Resolution = Result<ChannelSet, ProvisionError>;

struct ChannelRefresh {
    resolver: Arc<ChannelResolver>,
    community: CommunityId,
    last_attempt: Option<Instant>,
    pending: Option<oneshot::Receiver<Resolution>>,
    cancel: CancellationToken,
}

pub struct Forwarder {
    sink: Arc<dyn NotificationSink>,
    policy: ForwardingPolicy,
    channels: ChannelSet,
    refresh: Option<ChannelRefresh>,
    send_timeout: Duration,
    shutdown_grace: Duration,
    status: StatusBoard,
}

impl Forwarder {
    pub fn new(sink: Arc<dyn NotificationSink>, policy: ForwardingPolicy, status: StatusBoard) -> Self {
        Self {
            sink,
            policy,
            channels: ChannelSet::default(),
            refresh: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            status,
        }
    }

    /// Fixed destinations, used as-is
    pub fn with_channels(mut self, channels: ChannelSet) -> Self {
        self.status.set_channels(&channels);
        self.channels = channels;
        self
    }

    /// Resolve destinations through `resolver` at start and after a send
    /// reports an unknown destination
    pub fn with_resolver(mut self, resolver: Arc<ChannelResolver>, community: CommunityId) -> Self {
        self.refresh = Some(ChannelRefresh {
            resolver,
            community,
            last_attempt: None,
            pending: None,
            cancel: CancellationToken::new(),
        });
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Resolve the channel set inline; failures keep the current set
    pub async fn resolve_channels(&mut self) {
        let Some(refresh) = self.refresh.as_mut() else {
            debug!("No channel resolver configured, using fixed destinations");
            return;
        };
        refresh.last_attempt = Some(Instant::now());
        refresh.pending = None;

        let result = refresh.resolver.resolve(&refresh.community).await;
        publish_resolution(&self.status, &refresh.community, &result);
        if let Ok(channels) = result {
            self.channels = channels;
        }
    }

    /// Start resolving the channel set on a background task
    ///
    /// The current set stays in use until the result arrives. The task is
    /// abandoned once `cancel` fires. No-op while a resolution is pending.
    pub fn start_channel_resolution(&mut self, cancel: &CancellationToken) {
        let Some(refresh) = self.refresh.as_mut() else {
            debug!("No channel resolver configured, using fixed destinations");
            return;
        };
        refresh.cancel = cancel.child_token();
        spawn_resolution(refresh, &self.status);
    }

    /// Adopt the result of a finished background resolution, if any
    pub fn apply_resolved_channels(&mut self) {
        let Some(refresh) = self.refresh.as_mut() else {
            return;
        };
        let Some(pending) = refresh.pending.as_mut() else {
            return;
        };

        match pending.try_recv() {
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Closed) => refresh.pending = None,
            Ok(result) => {
                refresh.pending = None;
                if let Ok(channels) = result {
                    self.channels = channels;
                }
            }
        }
    }

    /// Whether a background resolution is still running
    pub fn resolution_pending(&self) -> bool {
        self.refresh.as_ref().is_some_and(|r| r.pending.is_some())
    }

    /// Process one entry and advance `cursor` past it
    pub async fn process(&mut self, entry: &LogEntry, cursor: &mut Cursor) -> Outcome {
        self.apply_resolved_channels();

        if !cursor.admits(entry) {
            debug!(id = entry.id, received_at = %entry.received_at, "Skipping entry behind cursor");
            self.status.update_stats(|s| s.duplicates += 1);
            return Outcome::Duplicate;
        }

        let classification = classify(entry, &self.policy);

        let outcome = if !classification.is_forwarded() {
            Outcome::Suppressed
        } else {
            match self.channels.get(classification.destination).cloned() {
                None => {
                    debug!(
                        id = entry.id,
                        destination = ?classification.destination,
                        "No destination resolved, dropping entry"
                    );
                    Outcome::Unrouted
                }
                Some(destination) => match self.deliver(&destination, &classification.text).await {
                    Ok(()) => Outcome::Forwarded,
                    Err(e) => {
                        warn!(
                            id = entry.id,
                            destination = %destination,
                            error = %e,
                            "Failed to forward console entry"
                        );
                        self.status.set_error(e.to_string());
                        if matches!(e, SinkError::UnknownDestination(_)) {
                            self.refresh_channels();
                        }
                        Outcome::SendFailed
                    }
                },
            }
        };

        cursor.advance(entry.position());
        self.status.set_cursor(cursor);
        self.status.update_stats(|s| {
            s.processed += 1;
            match outcome {
                Outcome::Forwarded => s.forwarded += 1,
                Outcome::Suppressed => s.suppressed += 1,
                Outcome::Unrouted => s.unrouted += 1,
                Outcome::SendFailed => s.send_failures += 1,
                Outcome::Duplicate => s.duplicates += 1,
            }
        });

        outcome
    }

    /// Like [`process`](Self::process), but once `cancel` fires the entry
    /// gets the shutdown grace to finish before it is abandoned
    ///
    /// Returns `None` when abandoned; the cursor is then left untouched.
    pub async fn process_until(
        &mut self,
        entry: &LogEntry,
        cursor: &mut Cursor,
        cancel: &CancellationToken,
    ) -> Option<Outcome> {
        let grace = self.shutdown_grace;
        let deadline = async {
            cancel.cancelled().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            outcome = self.process(entry, cursor) => Some(outcome),
            _ = deadline => {
                warn!(id = entry.id, ?grace, "Abandoning in-flight entry after shutdown grace");
                None
            }
        }
    }

    async fn deliver(&self, destination: &DestinationId, text: &str) -> Result<(), SinkError> {
        match tokio::time::timeout(self.send_timeout, self.sink.send(destination, text)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(self.send_timeout)),
        }
    }

    fn refresh_channels(&mut self) {
        let Some(refresh) = self.refresh.as_mut() else {
            return;
        };
        let due = refresh.pending.is_none()
            && refresh
                .last_attempt
                .map_or(true, |at| at.elapsed() >= REFRESH_COOLDOWN);
        if !due {
            debug!("Channel refresh skipped, cooling down");
            return;
        }

        info!("Destination vanished, re-resolving console channels");
        self.status.update_stats(|s| s.channel_refreshes += 1);
        spawn_resolution(refresh, &self.status);
    }
}

fn spawn_resolution(refresh: &mut ChannelRefresh, status: &StatusBoard) {
    if refresh.pending.is_some() {
        return;
    }
    refresh.last_attempt = Some(Instant::now());

    let (tx, rx) = oneshot::channel();
    refresh.pending = Some(rx);

    let resolver = refresh.resolver.clone();
    let community = refresh.community.clone();
    let cancel = refresh.cancel.clone();
    let status = status.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(community = %community, "Channel resolution abandoned");
            }
            result = resolver.resolve(&community) => {
                publish_resolution(&status, &community, &result);
                let _ = tx.send(result);
            }
        }
    });
}

fn publish_resolution(status: &StatusBoard, community: &CommunityId, result: &Resolution) {
    match result {
        Ok(channels) => status.set_channels(channels),
        Err(e) => {
            warn!(error = %e, community = %community, "Channel resolution failed, keeping current destinations");
            status.set_error(e.to_string());
        }
    }
}
