#![allow(dead_code)]

use async_trait::async_trait;
use console_relay::relay::{
    ChannelSet, DestinationId, ForwardingPolicy, Forwarder, NotificationSink, SinkError,
    StatusBoard,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sink that records every call in order
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(DestinationId, String)>>,
    failing: Mutex<HashSet<DestinationId>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<(DestinationId, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn destinations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(d, _)| d.as_str().to_string())
            .collect()
    }

    /// Messages without the `[timestamp] [server] ` prefix
    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(_, text)| text.rsplit("] ").next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn fail_destination(&self, destination: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(DestinationId::new(destination));
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, destination: &DestinationId, text: &str) -> Result<(), SinkError> {
        self.calls
            .lock()
            .unwrap()
            .push((destination.clone(), text.to_string()));
        if self.failing.lock().unwrap().contains(destination) {
            return Err(SinkError::Transport("injected failure".to_string()));
        }
        Ok(())
    }
}

pub fn channels() -> ChannelSet {
    ChannelSet {
        general: Some(DestinationId::new("general")),
        warnings: Some(DestinationId::new("warnings")),
        errors: Some(DestinationId::new("errors")),
    }
}

/// Forwarder with fixed destinations and the default `{ERROR, WARN}` policy
pub fn forwarder(sink: Arc<RecordingSink>, status: StatusBoard) -> Forwarder {
    Forwarder::new(sink, ForwardingPolicy::default(), status).with_channels(channels())
}

/// Poll `condition` every 10ms until it holds or `limit` passes
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
