use crate::round::clamp_round_seconds;
use shared::{DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_ROUND_SECONDS};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATA_PATH: &str = "data.json";
pub const DEFAULT_MAX_CLIENTS: usize = 200;
/// Idle timeouts shorter than this would drop players mid-deliberation
pub const MIN_IDLE_TIMEOUT_SECS: u64 = 10;
/// Ticks between health reports in the server log
pub const HEALTH_REPORT_INTERVAL: u64 = 60;

/// Runtime settings for the game server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_path: PathBuf,
    pub max_clients: usize,
    /// Countdown length used when the controller starts a round
    pub round_seconds: u32,
    pub idle_timeout: Duration,
    /// Fixed RNG seed for reproducible sessions; entropy when None
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            max_clients: DEFAULT_MAX_CLIENTS,
            round_seconds: DEFAULT_ROUND_SECONDS,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pulls every setting back into its supported range
    pub fn clamped(mut self) -> Self {
        self.max_clients = self.max_clients.max(1);
        self.round_seconds = clamp_round_seconds(self.round_seconds);
        if self.idle_timeout < Duration::from_secs(MIN_IDLE_TIMEOUT_SECS) {
            self.idle_timeout = Duration::from_secs(MIN_IDLE_TIMEOUT_SECS);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MAX_ROUND_SECONDS;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.round_seconds, 90);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.clone().clamped(), config);
    }

    #[test]
    fn test_clamped_values() {
        let config = ServerConfig {
            max_clients: 0,
            round_seconds: 5000,
            idle_timeout: Duration::from_secs(1),
            ..ServerConfig::default()
        }
        .clamped();

        assert_eq!(config.max_clients, 1);
        assert_eq!(config.round_seconds, MAX_ROUND_SECONDS);
        assert_eq!(config.idle_timeout, Duration::from_secs(MIN_IDLE_TIMEOUT_SECS));
    }
}
