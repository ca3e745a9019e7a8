//! API configuration

use serde::Deserialize;

/// API configuration, loaded from `API_`-prefixed environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Log level
    pub log_level: String,
    /// Seed the demo catalog on startup
    pub seed_demo: bool,
    /// Seconds between compensation sweeps
    pub compensate_interval_secs: u64,
    /// Seconds between notifier sweeps
    pub notify_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            seed_demo: true,
            compensate_interval_secs: 10,
            notify_interval_secs: 5,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_job_cadence() {
        let cfg = ApiConfig::default();
        assert_eq!(cfg.server_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.compensate_interval_secs, 10);
        assert_eq!(cfg.notify_interval_secs, 5);
    }
}
