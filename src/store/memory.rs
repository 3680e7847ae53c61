//! In-process log store with a broadcast insert feed
//!
//! Assigns ids and monotonic `received_at` timestamps the way a real store
//! does, and exposes fault injection hooks (feed termination, missing feed
//! capability, failing queries) for exercising the relay's failure paths.

use super::{EntryFeed, LogStore, StoreError};
use crate::relay::{LogEntry, LogLevel, Position};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::debug;

const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Entry to be inserted; the store fills in `id` and `received_at`
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub level: LogLevel,
    pub message: String,
    pub source: String,
    pub server_tag: String,
    pub origin_timestamp: Option<DateTime<Utc>>,
    /// Requested receipt time; clamped so receipt times never decrease
    pub received_at: Option<DateTime<Utc>>,
}

impl NewLogEntry {
    pub fn new(level: impl Into<LogLevel>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
            source: "Server".to_string(),
            server_tag: "main".to_string(),
            origin_timestamp: None,
            received_at: None,
        }
    }

    pub fn server(mut self, server_tag: impl Into<String>) -> Self {
        self.server_tag = server_tag.into();
        self
    }

    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = Some(at);
        self
    }
}

#[derive(Default)]
struct Entries {
    rows: Vec<LogEntry>,
    next_id: i64,
}

pub struct MemoryLogStore {
    entries: Mutex<Entries>,
    feed: broadcast::Sender<LogEntry>,
    terminate: watch::Sender<Option<String>>,
    feed_supported: AtomicBool,
    failing_queries: AtomicUsize,
    queries: AtomicUsize,
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        let (terminate, _) = watch::channel(None);
        Self {
            entries: Mutex::new(Entries::default()),
            feed,
            terminate,
            feed_supported: AtomicBool::new(true),
            failing_queries: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    /// Store without a live feed capability
    pub fn without_feed() -> Self {
        let store = Self::new();
        store.set_feed_supported(false);
        store
    }

    pub fn insert(&self, level: impl Into<LogLevel>, message: impl Into<String>) -> LogEntry {
        self.insert_entry(NewLogEntry::new(level, message))
    }

    pub fn insert_entry(&self, new: NewLogEntry) -> LogEntry {
        let mut entries = self.lock_entries();

        let requested = new.received_at.unwrap_or_else(Utc::now);
        let received_at = match entries.rows.last() {
            Some(last) if last.received_at > requested => last.received_at,
            _ => requested,
        };

        entries.next_id += 1;
        let entry = LogEntry {
            id: entries.next_id,
            level: new.level,
            message: new.message,
            source: new.source,
            server_tag: new.server_tag,
            origin_timestamp: new.origin_timestamp,
            received_at,
        };
        entries.rows.push(entry.clone());

        // Published under the lock so feed order matches id order
        if self.feed.send(entry.clone()).is_err() {
            debug!(id = entry.id, "No live subscribers for inserted entry");
        }

        entry
    }

    /// Terminate every open feed with a disconnect error
    pub fn fail_feeds(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.terminate.send_modify(|r| *r = Some(reason));
    }

    pub fn set_feed_supported(&self, supported: bool) {
        self.feed_supported.store(supported, Ordering::SeqCst);
    }

    /// Make the next `count` range queries fail
    pub fn fail_next_queries(&self, count: usize) {
        self.failing_queries.store(count, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.receiver_count()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct FeedState {
    entries: broadcast::Receiver<LogEntry>,
    terminate: watch::Receiver<Option<String>>,
    done: bool,
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn subscribe(&self) -> Result<EntryFeed, StoreError> {
        if !self.feed_supported.load(Ordering::SeqCst) {
            return Err(StoreError::Unsupported(
                "memory store feed disabled".to_string(),
            ));
        }

        let mut terminate = self.terminate.subscribe();
        terminate.borrow_and_update();

        let state = FeedState {
            entries: self.feed.subscribe(),
            terminate,
            done: false,
        };

        let feed = futures::stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }
            tokio::select! {
                biased;
                changed = st.terminate.changed() => {
                    st.done = true;
                    let reason = match changed {
                        Ok(()) => st
                            .terminate
                            .borrow()
                            .clone()
                            .unwrap_or_else(|| "feed terminated".to_string()),
                        Err(_) => "store dropped".to_string(),
                    };
                    Some((Err(StoreError::Disconnected(reason)), st))
                }
                received = st.entries.recv() => match received {
                    Ok(entry) => Some((Ok(entry), st)),
                    Err(RecvError::Lagged(skipped)) => {
                        st.done = true;
                        Some((Err(StoreError::Lagged(skipped)), st))
                    }
                    Err(RecvError::Closed) => None,
                },
            }
        });

        Ok(feed.boxed())
    }

    async fn query_after(
        &self,
        after: Option<Position>,
        limit: usize,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Query("injected query failure".to_string()));
        }

        let entries = self.lock_entries();
        Ok(entries
            .rows
            .iter()
            .filter(|e| after.map_or(true, |p| p.precedes(e)))
            .take(limit)
            .cloned()
            .collect())
    }
}
