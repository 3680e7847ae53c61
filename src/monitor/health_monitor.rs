//! Plugin API health monitor
//!
//! Every cycle probes the fixed endpoint list on each base URL, logs a
//! one-line summary per URL, and checks `/console/recent` for an entry inside
//! the freshness window. Stale URLs are reported in at most one alert per
//! cycle.

use super::probe::{EndpointCheck, HttpProbe};
use crate::relay::{DestinationId, NotificationSink};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const ENDPOINTS: [&str; 5] = [
    "/health",
    "/player/online",
    "/whitelist",
    "/whitelist/pending",
    "/console/recent",
];

const RECENT_ENDPOINT: &str = "/console/recent";

pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(30);
pub const MIN_MONITOR_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_FRESHNESS_MINUTES: i64 = 10;

/// Probe results for one base URL
#[derive(Debug, Clone, PartialEq)]
pub struct BaseUrlReport {
    pub base_url: String,
    pub checks: Vec<EndpointCheck>,
    pub recent_entry: bool,
}

impl BaseUrlReport {
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    /// `/health:OK,/whitelist:ERR,...`
    pub fn summary(&self) -> String {
        self.checks
            .iter()
            .map(|c| format!("{}:{}", c.endpoint, if c.ok { "OK" } else { "ERR" }))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub reports: Vec<BaseUrlReport>,
    /// Base URLs without a fresh console entry
    pub stale: Vec<String>,
    pub alerted: bool,
}

struct AlertTarget {
    sink: Arc<dyn NotificationSink>,
    destination: DestinationId,
}

pub struct HealthMonitor {
    probe: Arc<dyn HttpProbe>,
    alerts: Option<AlertTarget>,
    base_urls: Vec<String>,
    interval: Duration,
    freshness: chrono::Duration,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HttpProbe>, base_urls: Vec<String>) -> Self {
        Self {
            probe,
            alerts: None,
            base_urls: base_urls
                .into_iter()
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            interval: DEFAULT_MONITOR_INTERVAL,
            freshness: chrono::Duration::minutes(DEFAULT_FRESHNESS_MINUTES),
        }
    }

    /// Post stale-log alerts to `destination`; without this they are only logged
    pub fn with_alerts(mut self, sink: Arc<dyn NotificationSink>, destination: DestinationId) -> Self {
        self.alerts = Some(AlertTarget { sink, destination });
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_MONITOR_INTERVAL);
        self
    }

    pub fn with_freshness_minutes(mut self, minutes: i64) -> Self {
        self.freshness = chrono::Duration::minutes(minutes.max(1));
        self
    }

    pub fn base_urls(&self) -> &[String] {
        &self.base_urls
    }

    async fn check_base_url(&self, base_url: &str, now: DateTime<Utc>) -> BaseUrlReport {
        let mut checks = Vec::with_capacity(ENDPOINTS.len());
        let mut recent_entry = false;

        for endpoint in ENDPOINTS {
            let url = format!("{}{}", base_url, endpoint);
            let started = Instant::now();
            let result = self.probe.get(&url).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let check = match result {
                Ok(response) if response.is_success() => {
                    if endpoint == RECENT_ENDPOINT {
                        recent_entry = response
                            .body
                            .as_ref()
                            .is_some_and(|body| has_recent_entry(body, self.freshness, now));
                    }
                    EndpointCheck::success(endpoint, response.status, latency_ms)
                }
                Ok(response) => EndpointCheck::failure(
                    endpoint,
                    Some(response.status),
                    latency_ms,
                    "non-success status".to_string(),
                ),
                Err(e) => EndpointCheck::failure(endpoint, None, latency_ms, e.to_string()),
            };
            checks.push(check);
        }

        BaseUrlReport {
            base_url: base_url.to_string(),
            checks,
            recent_entry,
        }
    }

    /// One probe cycle over every base URL
    #[instrument(skip(self), name = "health_monitor_cycle")]
    pub async fn run_checks(&self, now: DateTime<Utc>) -> CycleReport {
        let mut reports = Vec::with_capacity(self.base_urls.len());

        for base_url in &self.base_urls {
            let report = self.check_base_url(base_url, now).await;
            if report.all_ok() {
                info!(base_url = %report.base_url, summary = %report.summary(), "Plugin API probe");
            } else {
                warn!(base_url = %report.base_url, summary = %report.summary(), "Plugin API probe");
            }
            reports.push(report);
        }

        let stale: Vec<String> = reports
            .iter()
            .filter(|r| !r.recent_entry)
            .map(|r| r.base_url.clone())
            .collect();

        let alerted = if stale.is_empty() {
            false
        } else {
            self.alert(&stale).await
        };

        CycleReport {
            reports,
            stale,
            alerted,
        }
    }

    async fn alert(&self, stale: &[String]) -> bool {
        let message = format!(
            "Monitor: no recent console logs (last {}m) from {}",
            self.freshness.num_minutes(),
            stale.join(", ")
        );
        warn!(stale = ?stale, "{}", message);

        let Some(target) = self.alerts.as_ref() else {
            debug!("No monitor alert destination configured");
            return false;
        };

        match target.sink.send(&target.destination, &message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, destination = %target.destination, "Failed to send monitor alert");
                false
            }
        }
    }

    /// Check immediately, then every interval until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            base_urls = ?self.base_urls,
            interval = ?self.interval,
            "Health monitor started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.run_checks(Utc::now()) => {}
            }
        }

        info!("Health monitor stopped");
    }
}

/// Whether `{ logs: [...] }` holds an entry stamped within `window` of `now`
///
/// Each entry's time is taken from `receivedAt`, then `minecraftTimestamp`,
/// then `timestamp`; RFC 3339 strings and epoch milliseconds are accepted.
pub fn has_recent_entry(body: &Value, window: chrono::Duration, now: DateTime<Utc>) -> bool {
    let Some(logs) = body.get("logs").and_then(Value::as_array) else {
        return false;
    };
    let cutoff = now - window;

    logs.iter()
        .filter_map(entry_timestamp)
        .any(|at| at >= cutoff)
}

fn entry_timestamp(log: &Value) -> Option<DateTime<Utc>> {
    let raw = ["receivedAt", "minecraftTimestamp", "timestamp"]
        .iter()
        .filter_map(|key| log.get(*key))
        .find(|v| !v.is_null())?;

    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
