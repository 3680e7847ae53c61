use crate::relay::{RelaySnapshot, TailingMode};
use serde::Serialize;
use utoipa::ToSchema;

/// Service health response
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// healthy / degraded / unhealthy
    pub status: HealthState,
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    #[schema(example = 3600)]
    pub uptime_secs: u64,
    /// Whether the relay was started at all
    pub relay_enabled: bool,
    pub relay: RelaySnapshot,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Tailing the live feed
    Healthy,
    /// Polling fallback
    Degraded,
    /// Not tailing
    Unhealthy,
}

impl From<TailingMode> for HealthState {
    fn from(mode: TailingMode) -> Self {
        match mode {
            TailingMode::Push => HealthState::Healthy,
            TailingMode::Pull => HealthState::Degraded,
            TailingMode::Stopped => HealthState::Unhealthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_state_should_follow_tailing_mode() {
        assert_eq!(HealthState::from(TailingMode::Push), HealthState::Healthy);
        assert_eq!(HealthState::from(TailingMode::Pull), HealthState::Degraded);
        assert_eq!(HealthState::from(TailingMode::Stopped), HealthState::Unhealthy);
    }

    #[test]
    fn health_state_should_serialize_lowercase() {
        let degraded = serde_json::to_string(&HealthState::Degraded).unwrap();

        assert_eq!(degraded, "\"degraded\"");
    }

    #[test]
    fn health_status_should_serialize_with_camel_case() {
        let status = HealthStatus {
            status: HealthState::Healthy,
            version: "0.1.0",
            uptime_secs: 3600,
            relay_enabled: true,
            relay: RelaySnapshot::default(),
        };

        let json = serde_json::to_string(&status).unwrap();

        assert!(json.contains("\"uptimeSecs\""));
        assert!(json.contains("\"relayEnabled\""));
        assert!(json.contains("\"sendFailures\""));
        assert!(json.contains("\"mode\":\"stopped\""));
    }
}
