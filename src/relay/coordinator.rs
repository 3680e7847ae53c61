//! Failover between push and pull tailing
//!
//! `Stopped -> Push -> Pull`, one direction per process lifetime. The
//! coordinator owns the cursor and runs one tailer at a time, so only one
//! path ever writes it. Channel resolution runs alongside and never delays
//! the start of tailing.

use super::cursor::Cursor;
use super::forwarder::Forwarder;
use super::pull::PullTailer;
use super::push::{PushExit, PushTailer};
use super::status::StatusBoard;
use crate::store::LogStore;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TailingMode {
    Stopped,
    Push,
    Pull,
}

impl fmt::Display for TailingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TailingMode::Stopped => "stopped",
            TailingMode::Push => "push",
            TailingMode::Pull => "pull",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    Started,
    /// Push feed unsupported or terminated
    FeedFailed,
    ShutdownRequested,
}

impl TailingMode {
    /// Transition function; events that do not apply leave the mode as is
    pub fn next(self, event: ModeEvent) -> TailingMode {
        match (self, event) {
            (_, ModeEvent::ShutdownRequested) => TailingMode::Stopped,
            (TailingMode::Stopped, ModeEvent::Started) => TailingMode::Push,
            (TailingMode::Push, ModeEvent::FeedFailed) => TailingMode::Pull,
            (mode, _) => mode,
        }
    }
}

pub struct FailoverCoordinator {
    push: PushTailer,
    pull: PullTailer,
    forwarder: Forwarder,
    status: StatusBoard,
    mode: TailingMode,
}

impl FailoverCoordinator {
    pub fn new(store: Arc<dyn LogStore>, pull: PullTailer, forwarder: Forwarder) -> Self {
        let status = forwarder.status().clone();
        Self {
            push: PushTailer::new(store),
            pull,
            forwarder,
            status,
            mode: TailingMode::Stopped,
        }
    }

    pub fn mode(&self) -> TailingMode {
        self.mode
    }

    fn transition(&mut self, event: ModeEvent) {
        let next = self.mode.next(event);
        if next != self.mode {
            info!(from = %self.mode, to = %next, ?event, "Tailing mode changed");
            self.mode = next;
            self.status.set_mode(next);
        }
    }

    /// Run until `cancel` fires; returns the final cursor
    #[instrument(skip_all, name = "failover_coordinator")]
    pub async fn run(mut self, cancel: CancellationToken) -> Cursor {
        let mut cursor = Cursor::new();

        self.forwarder.start_channel_resolution(&cancel);

        let push_started_at = Utc::now();
        self.transition(ModeEvent::Started);

        match self.push.run(&mut self.forwarder, &mut cursor, &cancel).await {
            PushExit::Cancelled => {}
            PushExit::Failed(e) => {
                warn!(error = %e, cursor = ?cursor.position(), "Push tailing ended, falling back to polling");
                self.status.set_error(e.to_string());
                self.transition(ModeEvent::FeedFailed);

                self.pull
                    .run(&mut self.forwarder, &mut cursor, push_started_at, &cancel)
                    .await;
            }
        }

        self.transition(ModeEvent::ShutdownRequested);
        info!(cursor = ?cursor.position(), "Console relay stopped");
        cursor
    }
}
