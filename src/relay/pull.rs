//! Timer-driven fallback tailer
//!
//! Each tick queries one page after the cursor and processes it in order.
//! A full page is drained by an immediate follow-up tick; ticks never overlap.

use super::cursor::Cursor;
use super::forwarder::Forwarder;
use crate::store::{LogStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Entries returned by the query
    pub fetched: usize,
    /// Entries that completed processing
    pub processed: usize,
    /// Fewer than a page was returned
    pub caught_up: bool,
}

pub struct PullTailer {
    store: Arc<dyn LogStore>,
    interval: Duration,
    page_size: usize,
}

impl PullTailer {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_POLL_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Query and process one page after `cursor`
    ///
    /// A query error leaves the cursor untouched.
    pub async fn tick(
        &self,
        forwarder: &mut Forwarder,
        cursor: &mut Cursor,
        cancel: &CancellationToken,
    ) -> Result<TickReport, StoreError> {
        let page = self
            .store
            .query_after(cursor.position(), self.page_size)
            .await?;

        let fetched = page.len();
        let mut processed = 0;
        for entry in &page {
            if forwarder.process_until(entry, cursor, cancel).await.is_none() {
                break;
            }
            processed += 1;
        }

        if fetched > 0 {
            debug!(fetched, processed, cursor = ?cursor.position(), "Pull tick processed page");
        }

        Ok(TickReport {
            fetched,
            processed,
            caught_up: fetched < self.page_size,
        })
    }

    /// Tick until cancelled
    ///
    /// An unset cursor is first seeded with `seed` so history older than
    /// that instant is not replayed.
    #[instrument(skip_all, name = "pull_tailer", fields(interval = ?self.interval, page_size = self.page_size))]
    pub async fn run(
        &self,
        forwarder: &mut Forwarder,
        cursor: &mut Cursor,
        seed: DateTime<Utc>,
        cancel: &CancellationToken,
    ) {
        if cursor.seed_if_unset(seed) {
            info!(seed = %seed, "Seeded cursor for pull mode");
            forwarder.status().set_cursor(cursor);
        }

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Drain: a full page means more is waiting
            loop {
                match self.tick(forwarder, cursor, cancel).await {
                    Ok(report) if !report.caught_up && !cancel.is_cancelled() => continue,
                    Ok(_) => break,
                    Err(e) => {
                        warn!(error = %e, cursor = ?cursor.position(), "Pull query failed, retrying next tick");
                        forwarder.status().update_stats(|s| s.query_failures += 1);
                        forwarder.status().set_error(e.to_string());
                        break;
                    }
                }
            }
        }

        info!(cursor = ?cursor.position(), "Pull tailer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::classifier::ForwardingPolicy;
    use crate::relay::entry::Position;
    use crate::relay::sink::MockNotificationSink;
    use crate::relay::status::StatusBoard;
    use crate::store::memory::NewLogEntry;
    use crate::store::MemoryLogStore;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn forwarder() -> Forwarder {
        let mut sink = MockNotificationSink::new();
        sink.expect_send().never();
        Forwarder::new(Arc::new(sink), ForwardingPolicy::default(), StatusBoard::new())
    }

    #[tokio::test]
    async fn should_leave_cursor_unchanged_on_idle_tick() {
        // Arrange
        let tailer = PullTailer::new(Arc::new(MemoryLogStore::new()));
        let mut cursor = Cursor::starting_at(Position::instant(ts(0)));
        let before = cursor;

        // Act
        let report = tailer
            .tick(&mut forwarder(), &mut cursor, &CancellationToken::new())
            .await
            .expect("idle tick is not an error");

        // Assert
        assert_eq!(report.fetched, 0);
        assert!(report.caught_up);
        assert_eq!(cursor, before);
    }

    #[tokio::test]
    async fn should_process_one_page_and_report_backlog() {
        // Arrange
        let store = Arc::new(MemoryLogStore::new());
        for i in 0..5 {
            store.insert_entry(NewLogEntry::new("INFO", format!("m{i}")).received_at(ts(i)));
        }
        let tailer = PullTailer::new(store).with_page_size(3);
        let mut cursor = Cursor::new();
        let mut forwarder = forwarder();
        let cancel = CancellationToken::new();

        // Act
        let first = tailer.tick(&mut forwarder, &mut cursor, &cancel).await.unwrap();
        let second = tailer.tick(&mut forwarder, &mut cursor, &cancel).await.unwrap();

        // Assert
        assert_eq!((first.fetched, first.caught_up), (3, false));
        assert_eq!((second.fetched, second.caught_up), (2, true));
        assert_eq!(cursor.last_received_at(), Some(ts(4)));
    }

    #[tokio::test]
    async fn should_keep_cursor_when_query_fails() {
        let store = Arc::new(MemoryLogStore::new());
        store.insert_entry(NewLogEntry::new("INFO", "ready").received_at(ts(1)));
        store.fail_next_queries(1);
        let tailer = PullTailer::new(store);
        let mut cursor = Cursor::starting_at(Position::instant(ts(0)));

        let result = tailer
            .tick(&mut forwarder(), &mut cursor, &CancellationToken::new())
            .await;

        assert!(result.is_err());
        assert_eq!(cursor.last_received_at(), Some(ts(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_seed_unset_cursor_and_skip_older_history() {
        // Arrange
        let store = Arc::new(MemoryLogStore::new());
        store.insert_entry(NewLogEntry::new("ERROR", "before start").received_at(ts(1)));
        let tailer = PullTailer::new(store.clone()).with_interval(Duration::from_secs(1));
        let mut forwarder = forwarder();
        let mut cursor = Cursor::new();
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            stopper.cancel();
        });

        // Act
        tailer.run(&mut forwarder, &mut cursor, ts(5), &cancel).await;

        // Assert
        assert_eq!(cursor.position(), Some(Position::instant(ts(5))));
        assert_eq!(forwarder.status().snapshot().stats.processed, 0);
        assert!(store.query_count() >= 2);
    }
}
