//! Live insert-feed tailer
//!
//! Entries are handled strictly in delivery order, one at a time. Any feed
//! error, or the feed ending, is terminal and handed back to the caller.

use super::cursor::Cursor;
use super::forwarder::Forwarder;
use crate::store::{LogStore, StoreError};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Why push mode ended
#[derive(Debug)]
pub enum PushExit {
    Cancelled,
    Failed(StoreError),
}

pub struct PushTailer {
    store: Arc<dyn LogStore>,
}

impl PushTailer {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, name = "push_tailer")]
    pub async fn run(
        &self,
        forwarder: &mut Forwarder,
        cursor: &mut Cursor,
        cancel: &CancellationToken,
    ) -> PushExit {
        let subscribed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PushExit::Cancelled,
            subscribed = self.store.subscribe() => subscribed,
        };

        let mut feed = match subscribed {
            Ok(feed) => feed,
            Err(e) => return PushExit::Failed(e),
        };
        info!("Subscribed to live insert feed");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PushExit::Cancelled,
                next = feed.next() => next,
            };

            match next {
                Some(Ok(entry)) => {
                    if forwarder.process_until(&entry, cursor, cancel).await.is_none() {
                        return PushExit::Cancelled;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, cursor = ?cursor.position(), "Live insert feed failed");
                    return PushExit::Failed(e);
                }
                None => {
                    warn!(cursor = ?cursor.position(), "Live insert feed ended");
                    return PushExit::Failed(StoreError::FeedClosed);
                }
            }
        }
    }
}
