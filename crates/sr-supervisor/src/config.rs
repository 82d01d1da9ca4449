//! Supervisor configuration: health port and shutdown grace period (§4.6).

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub health_port: u16,
    pub shutdown_grace_secs: u64,
    pub log_level: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_port: 8081,
            shutdown_grace_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl SupervisorConfig {
    pub fn from_env() -> Self {
        Self {
            health_port: std::env::var("SUPERVISOR_HEALTH_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| Self::default().health_port),
            shutdown_grace_secs: std::env::var("SUPERVISOR_SHUTDOWN_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| Self::default().shutdown_grace_secs),
            log_level: std::env::var("SUPERVISOR_LOG_LEVEL")
                .unwrap_or_else(|_| Self::default().log_level),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
