//! Periodic external probe of the plugin API surfaces
//!
//! Independent of the relay: it only reads over HTTP and posts alerts.

pub mod health_monitor;
pub mod probe;

pub use health_monitor::{has_recent_entry, BaseUrlReport, CycleReport, HealthMonitor};
pub use probe::{EndpointCheck, HttpProbe, ProbeError, ProbeResponse, ReqwestProbe};
