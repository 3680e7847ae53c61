use crate::relay::RelaySnapshot;
use std::time::Instant;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    /// Latest relay snapshot
    pub status: watch::Receiver<RelaySnapshot>,
    pub relay_enabled: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(status: watch::Receiver<RelaySnapshot>, relay_enabled: bool) -> Self {
        Self {
            status,
            relay_enabled,
            started_at: Instant::now(),
        }
    }
}
